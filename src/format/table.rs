//! Per-dataset landmark table (one CSV file per dataset type).
//!
//! Columns: `Dataset,Individual,Knee,Sequence,#Landmarks,Landmarks`.
//! The `Landmarks` cell is a JSON array of `[x, y, order_index, slice_index]`
//! tuples sorted by order index. `#Landmarks` may be left empty by other tools.

use std::fs::File;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::error::FormatError;
use crate::model::{LandmarkStore, SequenceIdentity};

/// Header written at the top of every table.
pub const TABLE_COLUMNS: [&str; 6] = [
    "Dataset",
    "Individual",
    "Knee",
    "Sequence",
    "#Landmarks",
    "Landmarks",
];

/// One flattened landmark: `(x, y, order_index, slice_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableLandmark(pub f32, pub f32, pub u32, pub u32);

/// One row of the dataset table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "Dataset", default)]
    pub dataset: String,
    #[serde(rename = "Individual")]
    pub individual: String,
    #[serde(rename = "Knee")]
    pub knee: String,
    #[serde(rename = "Sequence")]
    pub sequence: String,
    #[serde(rename = "#Landmarks", default)]
    pub landmark_count: Option<usize>,
    /// Serialized landmark list.
    #[serde(rename = "Landmarks")]
    pub landmarks: String,
}

impl TableRow {
    /// Build the row for a sequence's landmarks.
    pub fn from_store(
        identity: &SequenceIdentity,
        store: &LandmarkStore,
    ) -> Result<Self, FormatError> {
        let landmarks: Vec<TableLandmark> = store
            .ordered()
            .iter()
            .map(|l| TableLandmark(l.x, l.y, l.order_index, l.slice_index))
            .collect();

        Ok(Self {
            dataset: identity.dataset_type.dir_name(),
            individual: identity.individual_id.clone(),
            knee: identity.knee.name().to_string(),
            sequence: identity.sequence_name.clone(),
            landmark_count: Some(landmarks.len()),
            landmarks: serde_json::to_string(&landmarks)?,
        })
    }

    /// Whether this row belongs to `identity`.
    pub fn matches(&self, identity: &SequenceIdentity) -> bool {
        identity.matches(&self.individual, &self.knee, &self.sequence)
    }

    /// Decode the `Landmarks` cell.
    pub fn decode_landmarks(&self) -> Result<Vec<TableLandmark>, serde_json::Error> {
        if self.landmarks.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.landmarks)
    }
}

/// A dataset table loaded fully into memory.
///
/// Writes replace the whole file; there is no row-level locking.
#[derive(Debug, Clone)]
pub struct DatasetTable {
    path: PathBuf,
    rows: Vec<TableRow>,
}

impl DatasetTable {
    /// Load a table. A missing file is an empty table.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, FormatError> {
        let path = path.into();
        if !path.exists() {
            log::debug!("Dataset table {:?} does not exist yet, starting empty", path);
            return Ok(Self {
                path,
                rows: Vec::new(),
            });
        }

        let file = File::open(&path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        for required in ["Individual", "Knee", "Sequence", "Landmarks"] {
            if !headers.iter().any(|h| h == required) {
                return Err(FormatError::malformed_table(
                    &path,
                    format!("missing column '{}'", required),
                ));
            }
        }

        let rows = reader
            .deserialize()
            .collect::<Result<Vec<TableRow>, csv::Error>>()?;
        log::debug!("Loaded {} rows from {:?}", rows.len(), path);
        Ok(Self { path, rows })
    }

    /// All rows in file order.
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Row belonging to `identity`, if any.
    pub fn find(&self, identity: &SequenceIdentity) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.matches(identity))
    }

    /// Number of rows belonging to `identity`.
    pub fn count_matching(&self, identity: &SequenceIdentity) -> usize {
        self.rows.iter().filter(|row| row.matches(identity)).count()
    }

    /// Replace the row for `identity` in place, or append it.
    ///
    /// Any further rows with the same identity are dropped. Returns whether
    /// an existing row was replaced.
    pub fn upsert(&mut self, identity: &SequenceIdentity, row: TableRow) -> bool {
        match self.rows.iter().position(|r| r.matches(identity)) {
            Some(first) => {
                self.rows[first] = row;
                let mut index = 0;
                self.rows.retain(|r| {
                    let keep = index <= first || !r.matches(identity);
                    index += 1;
                    keep
                });
                true
            }
            None => {
                self.rows.push(row);
                false
            }
        }
    }

    /// Remove every row for `identity`, returning how many were removed.
    pub fn remove(&mut self, identity: &SequenceIdentity) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !r.matches(identity));
        before - self.rows.len()
    }

    /// Write the whole table, replacing the file.
    pub fn save(&self) -> Result<(), FormatError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        writer.write_record(TABLE_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        log::debug!("Wrote {} rows to {:?}", self.rows.len(), self.path);
        Ok(())
    }
}
