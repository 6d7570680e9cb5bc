//! Reconciles a [`LandmarkSession`] with its two persisted forms.
//!
//! Saving writes the per-sequence record first and the dataset table row
//! second. When the table step fails the record is rewritten empty so the
//! two never disagree about a completed sequence. A crash between the two
//! writes leaves the record as the source of truth and the table stale.

use std::path::{Path, PathBuf};

use crate::config::TablePaths;
use crate::format::error::FormatError;
use crate::format::record::SequenceRecord;
use crate::format::table::{DatasetTable, TableRow};
use crate::model::{DatasetType, LandmarkSession, LandmarkStore, SequenceIdentity};

/// What a successful save touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    /// Per-sequence record that was written.
    pub record_path: PathBuf,
    /// Dataset table that was updated.
    pub table_path: PathBuf,
    /// Number of landmarks persisted.
    pub landmarks: usize,
    /// Whether an existing table row was replaced (rather than appended).
    pub row_replaced: bool,
}

/// Reads and writes landmark records and dataset tables.
#[derive(Debug, Clone)]
pub struct PersistenceAdapter {
    tables: TablePaths,
}

impl PersistenceAdapter {
    /// Create an adapter writing to the given dataset tables.
    pub fn new(tables: TablePaths) -> Self {
        Self { tables }
    }

    /// Table file for a dataset type.
    pub fn table_path(&self, dataset: DatasetType) -> &Path {
        self.tables.get(dataset)
    }

    /// Load the dataset table for a dataset type.
    pub fn load_table(&self, dataset: DatasetType) -> Result<DatasetTable, FormatError> {
        DatasetTable::load(self.table_path(dataset))
    }

    /// Build a session for `sequence_path` from its record, if any.
    ///
    /// A missing or empty record yields an empty session. A record that
    /// cannot be used yields [`FormatError::MalformedRecord`].
    pub fn load(&self, sequence_path: &Path) -> Result<LandmarkSession, FormatError> {
        let identity = SequenceIdentity::from_path(sequence_path)?;
        let mut session = LandmarkSession::new(sequence_path, identity);
        let record_path = session.record_path();

        match SequenceRecord::read(&record_path)? {
            None => log::debug!("No record at {:?}", record_path),
            Some(record) if record.is_empty() => log::debug!("Empty record at {:?}", record_path),
            Some(record) => {
                session.store = record.to_store(&record_path, session.identity())?;
                session.set_completion_flag(true);
                log::info!(
                    "Loaded {} landmarks for {}",
                    session.total_count(),
                    session.identity()
                );
            }
        }

        Ok(session)
    }

    /// Persist the session's landmarks to the record and the dataset table.
    pub fn save(&self, session: &LandmarkSession) -> Result<SaveReport, FormatError> {
        let identity = session.identity();
        let record_path = session.record_path();

        SequenceRecord::from_store(identity, &session.store).write(&record_path)?;

        let table_path = self.table_path(identity.dataset_type).to_path_buf();
        let row_replaced = match self.write_row(&table_path, identity, &session.store) {
            Ok(replaced) => replaced,
            Err(e) => {
                log::error!(
                    "Table update for {} failed, rolling back {:?}: {}",
                    identity,
                    record_path,
                    e
                );
                if let Err(rollback) = SequenceRecord::write_empty(&record_path) {
                    log::error!("Rollback of {:?} failed: {}", record_path, rollback);
                }
                return Err(FormatError::TableWrite {
                    table: table_path,
                    source: Box::new(e),
                });
            }
        };

        log::info!(
            "Saved {} landmarks for {} ({:?}, {:?})",
            session.total_count(),
            identity,
            record_path,
            table_path
        );

        Ok(SaveReport {
            record_path,
            table_path,
            landmarks: session.total_count(),
            row_replaced,
        })
    }

    /// Wipe persisted landmarks of a completed session.
    ///
    /// Returns `Ok(false)` without touching disk when nothing was persisted.
    /// The record is emptied, never deleted.
    pub fn clear(&self, session: &LandmarkSession) -> Result<bool, FormatError> {
        if !session.completion_flag() {
            return Ok(false);
        }

        let identity = session.identity();
        SequenceRecord::write_empty(&session.record_path())?;

        let mut table = self.load_table(identity.dataset_type)?;
        let removed = table.remove(identity);
        if removed > 0 {
            table.save()?;
        }

        log::info!(
            "Cleared persisted landmarks for {} ({} table rows removed)",
            identity,
            removed
        );
        Ok(true)
    }

    /// Overwrite the record of `sequence_path` with an empty one.
    pub fn reset_record(&self, sequence_path: &Path) -> Result<PathBuf, FormatError> {
        let identity = SequenceIdentity::from_path(sequence_path)?;
        let record_path = sequence_path.join(identity.record_file_name());
        SequenceRecord::write_empty(&record_path)?;
        Ok(record_path)
    }

    fn write_row(
        &self,
        table_path: &Path,
        identity: &SequenceIdentity,
        store: &LandmarkStore,
    ) -> Result<bool, FormatError> {
        let mut table = DatasetTable::load(table_path)?;
        let replaced = table.upsert(identity, TableRow::from_store(identity, store)?);
        table.save()?;
        Ok(replaced)
    }
}
