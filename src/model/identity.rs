//! Sequence identity derived from dataset paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DATASET_DIR_PREFIX, MAX_LANDMARKS_AXIAL, MAX_LANDMARKS_DYNAMIC, MAX_LANDMARKS_SAGITTAL,
    RECORD_EXTENSION,
};

/// `.../DATASET_<TYPE>/<individual>/<LEFT|RIGHT>/<sequence>[/]`, either separator.
static SEQUENCE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"DATASET_(?P<dataset>\w+)[\\/]+(?P<individual>\d+)[\\/]+(?P<knee>LEFT|RIGHT)[\\/]+(?P<sequence>[\w-]+)[\\/]*$",
    )
    .expect("valid regex")
});

/// Errors raised while deriving a [`SequenceIdentity`].
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The path does not follow the dataset directory layout
    #[error("Sequence path does not match DATASET_<TYPE>/<individual>/<LEFT|RIGHT>/<sequence>: {path:?}")]
    PathPatternMismatch {
        /// The offending path
        path: PathBuf,
    },
}

/// Kind of acquisition a dataset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetType {
    /// Axial plane sequences
    #[serde(rename = "DATASET_AXIAL")]
    Axial,
    /// Sagittal plane sequences
    #[serde(rename = "DATASET_SAGITTAL")]
    Sagittal,
    /// Dynamic sequences
    #[serde(rename = "DATASET_DYNAMIC")]
    Dynamic,
}

impl DatasetType {
    /// All dataset types, in the order the dataset tree is walked.
    pub fn all() -> &'static [DatasetType] {
        &[DatasetType::Axial, DatasetType::Sagittal, DatasetType::Dynamic]
    }

    /// Short upper-case name (`AXIAL`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            DatasetType::Axial => "AXIAL",
            DatasetType::Sagittal => "SAGITTAL",
            DatasetType::Dynamic => "DYNAMIC",
        }
    }

    /// Directory name under the dataset root (`DATASET_AXIAL`, ...).
    pub fn dir_name(&self) -> String {
        format!("{}{}", DATASET_DIR_PREFIX, self.name())
    }

    /// Number of landmarks a complete sequence of this type carries.
    pub fn max_landmarks(&self) -> usize {
        match self {
            DatasetType::Axial => MAX_LANDMARKS_AXIAL,
            DatasetType::Sagittal => MAX_LANDMARKS_SAGITTAL,
            DatasetType::Dynamic => MAX_LANDMARKS_DYNAMIC,
        }
    }

    /// Parse the short name (`AXIAL`) or the directory name (`DATASET_AXIAL`).
    pub fn from_name(name: &str) -> Option<Self> {
        let short = name.strip_prefix(DATASET_DIR_PREFIX).unwrap_or(name);
        DatasetType::all()
            .iter()
            .copied()
            .find(|t| t.name() == short)
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// Which knee a sequence images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Knee {
    /// Left knee
    Left,
    /// Right knee
    Right,
}

impl Knee {
    /// Directory name of this knee.
    pub fn name(&self) -> &'static str {
        match self {
            Knee::Left => "LEFT",
            Knee::Right => "RIGHT",
        }
    }

    /// Parse a knee directory name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LEFT" => Some(Knee::Left),
            "RIGHT" => Some(Knee::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Knee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who and what a sequence directory belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceIdentity {
    /// Dataset the sequence belongs to
    pub dataset_type: DatasetType,
    /// Numeric individual identifier, kept as written in the path
    pub individual_id: String,
    /// Imaged knee
    pub knee: Knee,
    /// Sequence directory name
    pub sequence_name: String,
}

impl SequenceIdentity {
    /// Derive the identity from a sequence directory path.
    pub fn from_path(path: &Path) -> Result<Self, IdentityError> {
        let text = path.to_string_lossy();
        let mismatch = || IdentityError::PathPatternMismatch {
            path: path.to_path_buf(),
        };

        let caps = SEQUENCE_PATH_RE.captures(&text).ok_or_else(mismatch)?;
        let dataset_type = DatasetType::from_name(&caps["dataset"]).ok_or_else(mismatch)?;
        let knee = Knee::from_name(&caps["knee"]).ok_or_else(mismatch)?;

        Ok(Self {
            dataset_type,
            individual_id: caps["individual"].to_string(),
            knee,
            sequence_name: caps["sequence"].to_string(),
        })
    }

    /// Landmark capacity for this sequence.
    pub fn max_landmarks(&self) -> usize {
        self.dataset_type.max_landmarks()
    }

    /// File name of the per-sequence record (`<sequence>.json`).
    pub fn record_file_name(&self) -> String {
        format!("{}.{}", self.sequence_name, RECORD_EXTENSION)
    }

    /// Whether a table row identity matches this sequence.
    pub fn matches(&self, individual_id: &str, knee: &str, sequence_name: &str) -> bool {
        self.individual_id == individual_id
            && self.knee.name() == knee
            && self.sequence_name == sequence_name
    }
}

impl fmt::Display for SequenceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.dataset_type, self.individual_id, self.knee, self.sequence_name
        )
    }
}
