//! Unit tests for landmark persistence.
//!
//! Records, dataset tables, and the adapter that keeps them in step.


use std::path::{Path, PathBuf};

use crate::model::{LandmarkStore, SequenceIdentity};

/// Create a sequence directory under `base` and return its path and identity.
fn make_sequence(base: &Path, rel: &str) -> (PathBuf, SequenceIdentity) {
    let dir = base.join(rel);
    std::fs::create_dir_all(&dir).unwrap();
    let identity = SequenceIdentity::from_path(&dir).unwrap();
    (dir, identity)
}

/// Store with three landmarks: two on slice 0, one on slice 1.
fn three_landmarks(max: usize) -> LandmarkStore {
    let mut store = LandmarkStore::new(max);
    store.add(10.0, 20.0, 0).unwrap();
    store.add(30.0, 40.0, 0).unwrap();
    store.add(50.0, 60.0, 1).unwrap();
    store
}
