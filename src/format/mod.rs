//! Landmark persistence.
//!
//! Every sequence's landmarks live in two places:
//!
//! - **Record**: `<sequence>.json` inside the sequence directory, grouped by slice
//! - **Dataset table**: one CSV per dataset type, one row per
//!   individual/knee/sequence, landmarks flattened in placement order
//!
//! [`PersistenceAdapter`] keeps both in step with the in-memory session.

mod adapter;
mod error;
mod record;
mod table;

#[cfg(test)]
mod tests;

pub use adapter::{PersistenceAdapter, SaveReport};
pub use error::FormatError;
pub use record::{LandmarkEntry, SequenceRecord, SliceRecord};
pub use table::{DatasetTable, TABLE_COLUMNS, TableLandmark, TableRow};
