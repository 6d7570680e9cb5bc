//! Kneemark - knee MRI landmark annotation
//!
//! Core of a landmark annotation tool for DICOM knee sequences: per-sequence
//! landmark storage, persistence to JSON records and per-dataset tables, a
//! global completion index, and discovery of the next sequence to annotate.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod format;
pub mod locator;
pub mod model;
pub mod render;
pub mod status;

pub use config::AppConfig;
pub use controller::{ClearReport, ControllerState, SessionController, SessionError};
pub use format::{FormatError, PersistenceAdapter};
pub use locator::{FsWalker, SequenceLocator};
pub use model::{LandmarkSession, LandmarkStore, SequenceIdentity};
pub use render::{HeadlessSurface, RenderSurface};
pub use status::StatusIndex;
