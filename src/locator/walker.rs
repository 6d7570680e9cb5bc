//! Dataset directory walking.

use std::path::{Path, PathBuf};

use crate::constants::SLICE_EXTENSION;
use crate::model::{DatasetType, Knee, SequenceIdentity};

/// A sequence directory found in the dataset tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSequence {
    /// Dataset the sequence belongs to
    pub dataset_type: DatasetType,
    /// Individual directory name
    pub individual_id: String,
    /// Knee directory
    pub knee: Knee,
    /// Sequence directory
    pub path: PathBuf,
}

/// Source of the sequences making up a dataset.
pub trait DatasetWalker {
    /// Every sequence, in a stable order.
    fn walk(&self) -> std::io::Result<Vec<DiscoveredSequence>>;
}

/// Walks `<base>/DATASET_<TYPE>/<individual>/<LEFT|RIGHT>/<sequence>/` on disk.
///
/// Dataset types are visited axial, sagittal, dynamic; individuals in
/// numeric order; knees left then right; sequences by name. Entries that do
/// not fit the layout, or whose sequence name cannot identify a sequence, are
/// skipped.
#[derive(Debug, Clone)]
pub struct FsWalker {
    base_dir: PathBuf,
}

impl FsWalker {
    /// Walk the dataset rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl DatasetWalker for FsWalker {
    fn walk(&self) -> std::io::Result<Vec<DiscoveredSequence>> {
        let mut found = Vec::new();

        for &dataset_type in DatasetType::all() {
            let dataset_dir = self.base_dir.join(dataset_type.dir_name());
            if !dataset_dir.is_dir() {
                log::debug!("Dataset directory {:?} not found, skipping", dataset_dir);
                continue;
            }

            let mut individuals: Vec<(u64, String)> = subdirectories(&dataset_dir)?
                .into_iter()
                .filter_map(|name| match name.parse::<u64>() {
                    Ok(number) => Some((number, name)),
                    Err(_) => {
                        log::debug!("Skipping non-numeric individual {:?} in {:?}", name, dataset_dir);
                        None
                    }
                })
                .collect();
            individuals.sort();

            for (_, individual_id) in individuals {
                let individual_dir = dataset_dir.join(&individual_id);
                let mut knees: Vec<Knee> = subdirectories(&individual_dir)?
                    .iter()
                    .filter_map(|name| Knee::from_name(name))
                    .collect();
                knees.sort();

                for knee in knees {
                    let knee_dir = individual_dir.join(knee.name());
                    for sequence in subdirectories(&knee_dir)? {
                        let path = knee_dir.join(sequence);
                        if let Err(e) = SequenceIdentity::from_path(&path) {
                            log::warn!("Skipping {:?}: {}", path, e);
                            continue;
                        }
                        found.push(DiscoveredSequence {
                            dataset_type,
                            individual_id: individual_id.clone(),
                            knee,
                            path,
                        });
                    }
                }
            }
        }

        log::debug!("Discovered {} sequences under {:?}", found.len(), self.base_dir);
        Ok(found)
    }
}

/// Slice files (`*.dcm`) of a sequence directory, sorted by file name.
pub fn slice_files(sequence_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut slices: Vec<PathBuf> = std::fs::read_dir(sequence_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case(SLICE_EXTENSION))
                    .unwrap_or(false)
        })
        .collect();
    slices.sort();
    Ok(slices)
}

/// Number of slices in a sequence directory (at least one).
pub fn slice_count(sequence_dir: &Path) -> u32 {
    match slice_files(sequence_dir) {
        Ok(slices) => (slices.len() as u32).max(1),
        Err(e) => {
            log::warn!("Cannot list slices in {:?}: {}", sequence_dir, e);
            1
        }
    }
}

/// Names of the directories directly inside `dir`, sorted.
fn subdirectories(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}
