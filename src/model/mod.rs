//! Data models for kneemark.

mod identity;
mod landmark;
mod session;
mod store;

pub use identity::{DatasetType, IdentityError, Knee, SequenceIdentity};
pub use landmark::{Landmark, LandmarkKey, SliceIndex, SliceLandmarks};
pub use session::LandmarkSession;
pub use store::{LandmarkStore, StoreError};
