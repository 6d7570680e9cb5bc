//! Global completion index: sequence path → 0 (to annotate) or 1 (complete).
//!
//! Persisted as a single pretty-printed JSON object. Key order is kept
//! exactly as stored so that [`StatusIndex::find_first`] resumes at the same
//! sequence on every run. Every update re-reads and rewrites the whole file;
//! only one writer is supported.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::constants::{STATUS_COMPLETE, STATUS_INCOMPLETE};

/// Errors raised by the status index.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// I/O error reading or writing the index
    #[error("I/O error on status index: {0}")]
    Io(#[from] std::io::Error),

    /// Index file is not a JSON object of flags
    #[error("Failed to parse status index: {0}")]
    Json(#[from] serde_json::Error),

    /// A flag is neither 0 nor 1
    #[error("Invalid status flag {value} for {path}")]
    InvalidFlag {
        /// Sequence key
        path: String,
        /// Stored value
        value: Value,
    },

    /// Sequence is not in the index. The index is populated up front, so
    /// this points at a sequence that discovery never saw.
    #[error("Sequence not in status index: {path}")]
    MissingEntry {
        /// Sequence key
        path: String,
    },
}

/// Normalize a sequence path into an index key (`/` separators, no trailing separator).
pub fn path_key(path: &Path) -> String {
    let mut key = path.to_string_lossy().replace('\\', "/");
    let len = key.trim_end_matches('/').len();
    if len > 0 {
        key.truncate(len);
    }
    key
}

/// Totals over the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Sequences flagged 1
    pub complete: usize,
    /// Sequences flagged 0
    pub incomplete: usize,
}

impl StatusCounts {
    /// Number of sequences in the index.
    pub fn total(&self) -> usize {
        self.complete + self.incomplete
    }
}

/// The status index loaded in memory.
#[derive(Debug, Clone)]
pub struct StatusIndex {
    path: PathBuf,
    entries: Vec<(String, u8)>,
    positions: HashMap<String, usize>,
}

impl StatusIndex {
    /// An empty index that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Load the index. A missing file is an empty index.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StatusError> {
        let mut index = Self::empty(path);
        index.reload()?;
        log::debug!(
            "Loaded status index {:?} ({} sequences)",
            index.path,
            index.len()
        );
        Ok(index)
    }

    /// File backing this index.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored flag for a sequence.
    pub fn get(&self, sequence: &Path) -> Result<u8, StatusError> {
        let key = path_key(sequence);
        match self.positions.get(&key) {
            Some(&i) => Ok(self.entries[i].1),
            None => Err(StatusError::MissingEntry { path: key }),
        }
    }

    /// Set the flag for a sequence, re-reading and rewriting the whole file.
    ///
    /// A sequence not yet in the index is appended.
    pub fn set(&mut self, sequence: &Path, flag: u8) -> Result<(), StatusError> {
        let key = path_key(sequence);
        if flag != STATUS_COMPLETE && flag != STATUS_INCOMPLETE {
            return Err(StatusError::InvalidFlag {
                path: key,
                value: Value::from(flag),
            });
        }

        self.reload()?;
        let previous = self.insert(key.clone(), flag);
        self.save()?;

        match previous {
            Some(old) if old != flag => {
                log::info!("Status of {} changed from {} to {}", key, old, flag)
            }
            Some(_) => log::debug!("Status of {} unchanged ({})", key, flag),
            None => log::info!("Status of {} set to {} (new entry)", key, flag),
        }
        Ok(())
    }

    /// First sequence, in stored order, whose flag equals `flag`.
    pub fn find_first(&self, flag: u8) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, f)| *f == flag)
            .map(|(key, _)| key.as_str())
    }

    /// Add every sequence not yet present with flag 0, keeping existing flags.
    /// Returns how many were added. Does not write the file.
    pub fn populate<'a>(&mut self, sequences: impl IntoIterator<Item = &'a Path>) -> usize {
        let mut added = 0;
        for sequence in sequences {
            let key = path_key(sequence);
            if !self.positions.contains_key(&key) {
                self.insert(key, STATUS_INCOMPLETE);
                added += 1;
            }
        }
        added
    }

    /// Force the flag of every given sequence, adding missing ones.
    /// Returns how many flags changed or were added. Does not write the file.
    pub fn assign<'a>(&mut self, sequences: impl IntoIterator<Item = &'a Path>, flag: u8) -> usize {
        sequences
            .into_iter()
            .filter(|sequence| self.insert(path_key(sequence), flag) != Some(flag))
            .count()
    }

    /// Keys and flags in stored order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u8)> {
        self.entries.iter().map(|(key, flag)| (key.as_str(), *flag))
    }

    /// Number of sequences in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no sequences.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Complete and incomplete totals.
    pub fn counts(&self) -> StatusCounts {
        self.counts_where(|_| true)
    }

    /// Complete and incomplete totals over keys accepted by `filter`.
    pub fn counts_where(&self, filter: impl Fn(&str) -> bool) -> StatusCounts {
        self.entries
            .iter()
            .filter(|(key, _)| filter(key))
            .fold(StatusCounts::default(), |mut counts, (_, flag)| {
                if *flag == STATUS_COMPLETE {
                    counts.complete += 1;
                } else {
                    counts.incomplete += 1;
                }
                counts
            })
    }

    /// Write the whole index.
    pub fn save(&self) -> Result<(), StatusError> {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, flag)| (key.clone(), Value::from(*flag)))
            .collect();

        let mut bytes = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        serde::Serialize::serialize(&map, &mut serializer)?;
        std::fs::write(&self.path, bytes)?;
        log::trace!("Wrote status index {:?}", self.path);
        Ok(())
    }

    /// Replace the entries with the file's. On error the entries are kept.
    fn reload(&mut self) -> Result<(), StatusError> {
        let mut fresh = Self::empty(self.path.clone());
        if self.path.exists() {
            let json = std::fs::read_to_string(&self.path)?;
            let map: Map<String, Value> = serde_json::from_str(&json)?;
            for (key, value) in map {
                let flag = match value.as_u64() {
                    Some(0) => STATUS_INCOMPLETE,
                    Some(1) => STATUS_COMPLETE,
                    _ => return Err(StatusError::InvalidFlag { path: key, value }),
                };
                fresh.insert(path_key(Path::new(&key)), flag);
            }
        }

        self.entries = fresh.entries;
        self.positions = fresh.positions;
        Ok(())
    }

    fn insert(&mut self, key: String, flag: u8) -> Option<u8> {
        match self.positions.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, flag)),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, flag));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_index(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("status.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = StatusIndex::load(dir.path().join("status.json")).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.find_first(0), None);
    }

    #[test]
    fn test_find_first_follows_stored_order() {
        let dir = TempDir::new().unwrap();
        let path = write_index(
            &dir,
            r#"{ "/d/DATASET_AXIAL/2/LEFT/b": 1, "/d/DATASET_AXIAL/10/LEFT/a": 0, "/d/DATASET_AXIAL/1/LEFT/c": 0 }"#,
        );
        let index = StatusIndex::load(&path).unwrap();
        assert_eq!(index.find_first(0), Some("/d/DATASET_AXIAL/10/LEFT/a"));
        assert_eq!(index.find_first(1), Some("/d/DATASET_AXIAL/2/LEFT/b"));
        assert_eq!(index.counts(), StatusCounts { complete: 1, incomplete: 2 });
    }

    #[test]
    fn test_get_missing_entry_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "/d/DATASET_AXIAL/1/LEFT/a": 0 }"#);
        let index = StatusIndex::load(&path).unwrap();
        assert_eq!(index.get(Path::new("/d/DATASET_AXIAL/1/LEFT/a")).unwrap(), 0);
        assert!(matches!(
            index.get(Path::new("/d/DATASET_AXIAL/1/LEFT/zzz")),
            Err(StatusError::MissingEntry { .. })
        ));
    }

    #[test]
    fn test_keys_are_separator_agnostic() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "D:\\Data\\DATASET_AXIAL\\94\\RIGHT\\seq": 1 }"#);
        let index = StatusIndex::load(&path).unwrap();
        assert_eq!(index.get(Path::new("D:/Data/DATASET_AXIAL/94/RIGHT/seq/")).unwrap(), 1);
    }

    #[test]
    fn test_set_rewrites_file_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "/a": 0, "/b": 0, "/c": 0 }"#);
        let mut index = StatusIndex::load(&path).unwrap();

        index.set(Path::new("/b"), 1).unwrap();
        index.set(Path::new("/new"), 1).unwrap();

        let reloaded = StatusIndex::load(&path).unwrap();
        let entries: Vec<(&str, u8)> = reloaded.entries().collect();
        assert_eq!(entries, vec![("/a", 0), ("/b", 1), ("/c", 0), ("/new", 1)]);
    }

    #[test]
    fn test_set_merges_changes_made_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "/a": 0 }"#);
        let mut index = StatusIndex::load(&path).unwrap();

        std::fs::write(&path, r#"{ "/a": 0, "/b": 1 }"#).unwrap();
        index.set(Path::new("/a"), 1).unwrap();

        assert_eq!(index.get(Path::new("/b")).unwrap(), 1);
        assert_eq!(index.get(Path::new("/a")).unwrap(), 1);
    }

    #[test]
    fn test_failed_set_keeps_loaded_entries() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "/a": 0, "/b": 0 }"#);
        let mut index = StatusIndex::load(&path).unwrap();

        std::fs::write(&path, "{ truncated").unwrap();
        assert!(matches!(
            index.set(Path::new("/a"), 1),
            Err(StatusError::Json(_))
        ));

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(Path::new("/a")).unwrap(), 0);
        assert_eq!(index.find_first(0), Some("/a"));
    }

    #[test]
    fn test_invalid_flags_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "/a": 2 }"#);
        assert!(matches!(
            StatusIndex::load(&path),
            Err(StatusError::InvalidFlag { .. })
        ));

        let mut index = StatusIndex::empty(dir.path().join("other.json"));
        assert!(index.set(Path::new("/a"), 7).is_err());
    }

    #[test]
    fn test_populate_keeps_existing_flags() {
        let dir = TempDir::new().unwrap();
        let path = write_index(&dir, r#"{ "/a": 1 }"#);
        let mut index = StatusIndex::load(&path).unwrap();

        let added = index.populate([Path::new("/a"), Path::new("/b"), Path::new("/b")]);
        assert_eq!(added, 1);
        assert_eq!(index.get(Path::new("/a")).unwrap(), 1);
        assert_eq!(index.get(Path::new("/b")).unwrap(), 0);
    }

    #[test]
    fn test_path_key() {
        assert_eq!(path_key(Path::new(r"C:\x\y\")), "C:/x/y");
        assert_eq!(path_key(Path::new("/")), "/");
    }
}
