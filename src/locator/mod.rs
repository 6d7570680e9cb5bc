//! Finding sequences to annotate.
//!
//! [`SequenceLocator`] combines a [`DatasetWalker`] (what exists on disk)
//! with the [`StatusIndex`] (what has been annotated) to pick the next
//! sequence, enumerate the dataset hierarchy, and bootstrap the index and
//! per-sequence records for a fresh dataset.

mod walker;

use std::path::PathBuf;

use crate::constants::STATUS_INCOMPLETE;
use crate::format::{FormatError, PersistenceAdapter};
use crate::model::{DatasetType, Knee};
use crate::status::{StatusError, StatusIndex};

pub use walker::{DatasetWalker, DiscoveredSequence, FsWalker, slice_count, slice_files};

/// Errors raised while walking or bootstrapping a dataset.
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    /// Dataset tree could not be read
    #[error("Failed to walk dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Status index could not be updated
    #[error(transparent)]
    Status(#[from] StatusError),

    /// A record could not be written
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Sequences of one knee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KneeNode {
    /// Which knee
    pub knee: Knee,
    /// Sequence directories
    pub sequences: Vec<PathBuf>,
}

/// Knees of one individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualNode {
    /// Individual directory name
    pub id: String,
    /// Knees with at least one sequence
    pub knees: Vec<KneeNode>,
}

/// Individuals of one dataset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetNode {
    /// Dataset type
    pub dataset_type: DatasetType,
    /// Individuals with at least one sequence
    pub individuals: Vec<IndividualNode>,
}

/// Locates sequences in the dataset tree.
#[derive(Debug, Clone)]
pub struct SequenceLocator<W: DatasetWalker = FsWalker> {
    walker: W,
}

impl<W: DatasetWalker> SequenceLocator<W> {
    /// Create a locator over a walker.
    pub fn new(walker: W) -> Self {
        Self { walker }
    }

    /// Every sequence in walk order.
    pub fn sequences(&self) -> Result<Vec<DiscoveredSequence>, LocatorError> {
        Ok(self.walker.walk()?)
    }

    /// Dataset → individual → knee → sequence tree, in walk order.
    pub fn hierarchy(&self) -> Result<Vec<DatasetNode>, LocatorError> {
        let mut datasets: Vec<DatasetNode> = Vec::new();

        for sequence in self.sequences()? {
            if datasets.last().map(|d| d.dataset_type) != Some(sequence.dataset_type) {
                datasets.push(DatasetNode {
                    dataset_type: sequence.dataset_type,
                    individuals: Vec::new(),
                });
            }
            let Some(dataset) = datasets.last_mut() else {
                continue;
            };

            if dataset.individuals.last().map(|i| i.id.as_str()) != Some(sequence.individual_id.as_str()) {
                dataset.individuals.push(IndividualNode {
                    id: sequence.individual_id.clone(),
                    knees: Vec::new(),
                });
            }
            let Some(individual) = dataset.individuals.last_mut() else {
                continue;
            };

            if individual.knees.last().map(|k| k.knee) != Some(sequence.knee) {
                individual.knees.push(KneeNode {
                    knee: sequence.knee,
                    sequences: Vec::new(),
                });
            }
            if let Some(knee) = individual.knees.last_mut() {
                knee.sequences.push(sequence.path);
            }
        }

        Ok(datasets)
    }

    /// First sequence still to annotate, in status index order.
    pub fn next_incomplete(&self, status: &StatusIndex) -> Option<PathBuf> {
        status.find_first(STATUS_INCOMPLETE).map(PathBuf::from)
    }

    /// Add every discovered sequence missing from the index with flag 0 and
    /// write the index. Existing flags are kept. Returns how many were added.
    pub fn populate_status(&self, status: &mut StatusIndex) -> Result<usize, LocatorError> {
        let sequences = self.sequences()?;
        let added = status.populate(sequences.iter().map(|s| s.path.as_path()));
        if added > 0 || !status.path().exists() {
            status.save()?;
        }
        log::info!(
            "Status index {:?}: {} sequences added, {} total",
            status.path(),
            added,
            status.len()
        );
        Ok(added)
    }

    /// Overwrite every sequence's record with `{}` and flag it 0.
    ///
    /// Returns how many records were reset. Destroys saved landmarks; the
    /// dataset tables are left alone.
    pub fn reset_records(
        &self,
        adapter: &PersistenceAdapter,
        status: &mut StatusIndex,
    ) -> Result<usize, LocatorError> {
        let sequences = self.sequences()?;
        for sequence in &sequences {
            let record = adapter.reset_record(&sequence.path)?;
            log::debug!("Reset record {:?}", record);
        }
        status.assign(sequences.iter().map(|s| s.path.as_path()), STATUS_INCOMPLETE);
        status.save()?;
        log::info!("Reset {} sequence records", sequences.len());
        Ok(sequences.len())
    }
}
