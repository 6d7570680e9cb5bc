//! Per-sequence landmark record (`<sequence>.json`).
//!
//! The record is a JSON object keyed by slice index:
//!
//! ```json
//! {
//!     "3": {
//!         "Dataset": "DATASET_AXIAL",
//!         "Individual": "94",
//!         "Knee": "RIGHT",
//!         "Sequence": "pd_tse_fs_tra_12",
//!         "Slice": 3,
//!         "#Landmarks": 2,
//!         "Landmarks": [
//!             { "Index": 1, "Position": [10.0, 20.0] },
//!             { "Index": 4, "Position": [30.0, 40.0] }
//!         ]
//!     }
//! }
//! ```
//!
//! An absent file or an empty object means no landmarks have been saved.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::format::error::FormatError;
use crate::model::{DatasetType, Knee, LandmarkStore, SequenceIdentity, SliceIndex};

/// One landmark as stored in the record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LandmarkEntry {
    /// Placement order across the sequence (1-based).
    pub index: u32,
    /// `[x, y]` in image coordinates.
    pub position: [f32; 2],
}

/// All landmarks of one slice, with the sequence identity repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SliceRecord {
    /// Dataset directory name
    pub dataset: DatasetType,
    /// Individual identifier
    pub individual: String,
    /// Imaged knee
    pub knee: Knee,
    /// Sequence name
    pub sequence: String,
    /// Slice index, repeated from the object key
    pub slice: SliceIndex,
    /// Number of entries in `landmarks`
    #[serde(rename = "#Landmarks")]
    pub landmark_count: usize,
    /// Landmarks in placement order
    pub landmarks: Vec<LandmarkEntry>,
}

/// The whole per-sequence record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceRecord {
    slices: BTreeMap<SliceIndex, SliceRecord>,
}

impl SequenceRecord {
    /// An empty record (`{}`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the record for a store, one entry per non-empty slice.
    pub fn from_store(identity: &SequenceIdentity, store: &LandmarkStore) -> Self {
        let slices = store
            .groups()
            .filter(|group| !group.is_empty())
            .map(|group| {
                let landmarks: Vec<LandmarkEntry> = group
                    .iter()
                    .map(|l| LandmarkEntry {
                        index: l.order_index,
                        position: [l.x, l.y],
                    })
                    .collect();
                let record = SliceRecord {
                    dataset: identity.dataset_type,
                    individual: identity.individual_id.clone(),
                    knee: identity.knee,
                    sequence: identity.sequence_name.clone(),
                    slice: group.slice_index(),
                    landmark_count: landmarks.len(),
                    landmarks,
                };
                (group.slice_index(), record)
            })
            .collect();
        Self { slices }
    }

    /// Whether the record holds no slices.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Slice entries in ascending slice order.
    pub fn slices(&self) -> impl Iterator<Item = &SliceRecord> {
        self.slices.values()
    }

    /// Total number of landmarks across slices.
    pub fn total_landmarks(&self) -> usize {
        self.slices.values().map(|s| s.landmarks.len()).sum()
    }

    /// Read a record. `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, FormatError> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        if json.trim().is_empty() {
            return Err(FormatError::malformed(path, "file is empty"));
        }
        let record: Self =
            serde_json::from_str(&json).map_err(|e| FormatError::malformed(path, e.to_string()))?;
        Ok(Some(record))
    }

    /// Write the record as pretty-printed JSON, replacing the file.
    pub fn write(&self, path: &Path) -> Result<(), FormatError> {
        let mut bytes = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        self.serialize(&mut serializer)?;
        std::fs::write(path, &bytes)?;
        log::debug!(
            "Wrote record {:?} ({} slices, {} landmarks)",
            path,
            self.slices.len(),
            self.total_landmarks()
        );
        Ok(())
    }

    /// Replace the file with an empty record.
    pub fn write_empty(path: &Path) -> Result<(), FormatError> {
        Self::empty().write(path)
    }

    /// Validate the record against `identity` and rebuild the landmark store.
    ///
    /// Landmarks are replayed in stored `Index` order, so placement order
    /// survives even though the file groups them by slice.
    pub fn to_store(
        &self,
        path: &Path,
        identity: &SequenceIdentity,
    ) -> Result<LandmarkStore, FormatError> {
        let mut placed: Vec<(u32, SliceIndex, [f32; 2])> = Vec::new();

        for (&key, slice) in &self.slices {
            if slice.slice != key {
                return Err(FormatError::malformed(
                    path,
                    format!("slice key {} disagrees with Slice field {}", key, slice.slice),
                ));
            }
            if slice.dataset != identity.dataset_type
                || !identity.matches(&slice.individual, slice.knee.name(), &slice.sequence)
            {
                return Err(FormatError::malformed(
                    path,
                    format!(
                        "slice {} belongs to {}/{}/{}/{}, expected {}",
                        key, slice.dataset, slice.individual, slice.knee, slice.sequence, identity
                    ),
                ));
            }
            if slice.landmark_count != slice.landmarks.len() {
                return Err(FormatError::malformed(
                    path,
                    format!(
                        "slice {} declares {} landmarks but lists {}",
                        key,
                        slice.landmark_count,
                        slice.landmarks.len()
                    ),
                ));
            }
            placed.extend(slice.landmarks.iter().map(|e| (e.index, key, e.position)));
        }

        let max = identity.max_landmarks();
        if placed.len() > max {
            return Err(FormatError::malformed(
                path,
                format!("{} landmarks exceed the maximum of {}", placed.len(), max),
            ));
        }

        let mut seen = HashSet::new();
        if let Some((index, _, _)) = placed.iter().find(|(index, _, _)| !seen.insert(*index)) {
            return Err(FormatError::malformed(
                path,
                format!("landmark index {} appears more than once", index),
            ));
        }

        placed.sort_by_key(|(index, _, _)| *index);

        let mut store = LandmarkStore::new(max);
        for (_, slice, [x, y]) in placed {
            store
                .add(x, y, slice)
                .map_err(|e| FormatError::malformed(path, e.to_string()))?;
        }
        Ok(store)
    }
}
