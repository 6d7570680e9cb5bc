//! State of the sequence currently open for annotation.

use std::path::{Path, PathBuf};

use super::identity::SequenceIdentity;
use super::landmark::SliceIndex;
use super::store::LandmarkStore;

/// Everything known about one open sequence.
#[derive(Debug, Clone)]
pub struct LandmarkSession {
    path: PathBuf,
    identity: SequenceIdentity,
    /// Landmarks placed on this sequence.
    pub store: LandmarkStore,
    completion_flag: bool,
    active_slice: SliceIndex,
    slice_count: u32,
}

impl LandmarkSession {
    /// Create an empty, not-yet-persisted session.
    pub fn new(path: impl Into<PathBuf>, identity: SequenceIdentity) -> Self {
        let max = identity.max_landmarks();
        Self {
            path: path.into(),
            identity,
            store: LandmarkStore::new(max),
            completion_flag: false,
            active_slice: 0,
            slice_count: 1,
        }
    }

    /// Sequence directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity parsed from the sequence directory.
    pub fn identity(&self) -> &SequenceIdentity {
        &self.identity
    }

    /// Path of the per-sequence record inside the sequence directory.
    pub fn record_path(&self) -> PathBuf {
        self.path.join(self.identity.record_file_name())
    }

    /// Landmark capacity of this sequence.
    pub fn max_landmarks(&self) -> usize {
        self.store.max_landmarks()
    }

    /// Number of landmarks placed.
    pub fn total_count(&self) -> usize {
        self.store.total_count()
    }

    /// Whether a well-formed record is persisted for this sequence.
    pub fn completion_flag(&self) -> bool {
        self.completion_flag
    }

    pub(crate) fn set_completion_flag(&mut self, flag: bool) {
        self.completion_flag = flag;
    }

    /// Slice currently displayed.
    pub fn active_slice(&self) -> SliceIndex {
        self.active_slice
    }

    /// Number of slices in the sequence (at least one).
    pub fn slice_count(&self) -> u32 {
        self.slice_count
    }

    /// Set the number of slices, clamping the active slice into range.
    pub fn set_slice_count(&mut self, count: u32) {
        self.slice_count = count.max(1);
        self.active_slice = self.active_slice.min(self.slice_count - 1);
    }

    /// Move to `slice`, clamped to the sequence. Returns the new active slice.
    pub fn set_active_slice(&mut self, slice: SliceIndex) -> SliceIndex {
        self.active_slice = slice.min(self.slice_count - 1);
        self.active_slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> LandmarkSession {
        let path = PathBuf::from("/d/DATASET_SAGITTAL/12/LEFT/t2_sag");
        let identity = SequenceIdentity::from_path(&path).unwrap();
        LandmarkSession::new(path, identity)
    }

    #[test]
    fn test_new_session_is_empty() {
        let s = session();
        assert_eq!(s.max_landmarks(), 7);
        assert_eq!(s.total_count(), 0);
        assert!(!s.completion_flag());
        assert_eq!(s.active_slice(), 0);
        assert_eq!(
            s.record_path(),
            PathBuf::from("/d/DATASET_SAGITTAL/12/LEFT/t2_sag/t2_sag.json")
        );
    }

    #[test]
    fn test_active_slice_is_clamped() {
        let mut s = session();
        s.set_slice_count(4);
        assert_eq!(s.set_active_slice(2), 2);
        assert_eq!(s.set_active_slice(10), 3);

        s.set_slice_count(2);
        assert_eq!(s.active_slice(), 1);

        s.set_slice_count(0);
        assert_eq!(s.slice_count(), 1);
        assert_eq!(s.active_slice(), 0);
    }
}
