//! Annotation session orchestration.
//!
//! [`SessionController`] owns the open [`LandmarkSession`] and drives the
//! persistence adapter, the status index and the render surface in a fixed
//! order, so that a sequence is only flagged complete once its landmarks are
//! on disk.

use std::path::{Path, PathBuf};

use crate::constants::{STATUS_COMPLETE, STATUS_INCOMPLETE};
use crate::format::{FormatError, PersistenceAdapter, SaveReport};
use crate::locator::slice_count;
use crate::model::{
    IdentityError, Landmark, LandmarkKey, LandmarkSession, SequenceIdentity, SliceIndex, StoreError,
};
use crate::render::{MarkerRegistry, RenderSurface};
use crate::status::{StatusError, StatusIndex};

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No sequence has been opened yet
    #[error("No sequence loaded")]
    NoSequenceLoaded,

    /// Save attempted before every landmark was placed
    #[error("{count} of {max} landmarks placed, place the rest before saving")]
    IncompleteLandmarks {
        /// Landmarks placed
        count: usize,
        /// Landmarks required
        max: usize,
    },

    /// Point lies outside the displayed slice
    #[error("Point ({x}, {y}) is outside the {width}x{height} slice")]
    OutOfBounds {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
        /// Slice width
        width: u32,
        /// Slice height
        height: u32,
    },

    /// Landmark store rejected the change
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Record or table could not be read or written
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Status index could not be read or written
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Path is not a sequence directory
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Whether a sequence is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Nothing open
    Empty,
    /// A sequence is open
    Loaded,
}

/// Outcome of [`SessionController::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearReport {
    /// Landmarks removed from memory
    pub removed: usize,
    /// Whether a persisted record and table row were wiped
    pub persisted_cleared: bool,
}

/// Drives one annotation session at a time.
pub struct SessionController<S: RenderSurface> {
    adapter: PersistenceAdapter,
    status: StatusIndex,
    surface: S,
    markers: MarkerRegistry,
    session: Option<LandmarkSession>,
}

impl<S: RenderSurface> SessionController<S> {
    /// Create a controller with nothing open.
    pub fn new(adapter: PersistenceAdapter, status: StatusIndex, surface: S) -> Self {
        Self {
            adapter,
            status,
            surface,
            markers: MarkerRegistry::new(),
            session: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        match self.session {
            Some(_) => ControllerState::Loaded,
            None => ControllerState::Empty,
        }
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&LandmarkSession> {
        self.session.as_ref()
    }

    /// Status index used for completion flags.
    pub fn status(&self) -> &StatusIndex {
        &self.status
    }

    /// Persistence adapter.
    pub fn adapter(&self) -> &PersistenceAdapter {
        &self.adapter
    }

    /// Render surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Markers currently drawn.
    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    /// Open a sequence, replacing the current session without saving it.
    ///
    /// A path that does not identify a sequence is rejected and the current
    /// session stays open. A record that cannot be used is ignored and the
    /// sequence opens empty. Landmarks recorded past the last slice file
    /// widen the slice count so they stay reachable.
    pub fn open(&mut self, path: &Path) -> Result<&LandmarkSession, SessionError> {
        let identity = SequenceIdentity::from_path(path)?;

        let mut session = match self.adapter.load(path) {
            Ok(session) => session,
            Err(e) if e.is_malformed_record() => {
                log::warn!("Ignoring unusable record for {}: {}", identity, e);
                LandmarkSession::new(path, identity)
            }
            Err(e) => return Err(e.into()),
        };

        match self.status.get(path) {
            Ok(flag) if (flag == STATUS_COMPLETE) != session.completion_flag() => log::warn!(
                "Status index flags {} as {} but its record says otherwise",
                session.identity(),
                flag
            ),
            Ok(_) => {}
            Err(e) => log::debug!("{}", e),
        }

        if let Some(previous) = &self.session {
            log::debug!("Closing {} without saving", previous.identity());
        }
        self.markers.clear(&mut self.surface);

        let files = slice_count(path);
        let recorded = session.store.groups().last().map_or(0, |group| group.slice_index() + 1);
        if recorded > files {
            log::warn!(
                "{} has landmarks on slice {} but only {} slice files",
                session.identity(),
                recorded,
                files
            );
        }
        session.set_slice_count(files.max(recorded));
        session.set_active_slice(0);
        self.markers.rebuild(&mut self.surface, &session.store, 0);
        self.surface.render_slice(0);

        log::info!(
            "Opened {} ({} slices, {})",
            session.identity(),
            session.slice_count(),
            session.store
        );
        Ok(&*self.session.insert(session))
    }

    /// Open the first sequence the status index still marks as incomplete.
    ///
    /// Returns `Ok(None)` when every sequence is complete.
    pub fn open_next(&mut self) -> Result<Option<PathBuf>, SessionError> {
        let Some(path) = self.status.find_first(STATUS_INCOMPLETE).map(PathBuf::from) else {
            log::info!("No incomplete sequences left");
            return Ok(None);
        };
        self.open(&path)?;
        Ok(Some(path))
    }

    /// Place a landmark on the active slice.
    pub fn add_landmark(&mut self, x: f32, y: f32) -> Result<Landmark, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSequenceLoaded)?;

        if let Some((width, height)) = self.surface.slice_dimensions() {
            let inside = x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32;
            if !inside {
                return Err(SessionError::OutOfBounds {
                    x,
                    y,
                    width,
                    height,
                });
            }
        }

        let slice = session.active_slice();
        let landmark = session.store.add(x, y, slice)?;
        let key = LandmarkKey {
            slice_index: slice,
            position: session.store.visible_on(slice).len() - 1,
        };
        self.markers.attach(&mut self.surface, key, &landmark, slice);

        log::debug!("{} ({} remaining)", session.store, session.store.remaining());
        Ok(landmark)
    }

    /// Remove the most recent landmark on the active slice.
    ///
    /// `Ok(None)` when the active slice has none.
    pub fn undo_landmark(&mut self) -> Result<Option<Landmark>, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSequenceLoaded)?;
        let slice = session.active_slice();
        let position = session.store.visible_on(slice).len();

        let Some(removed) = session.store.remove_last_on_slice(slice) else {
            log::debug!("Nothing to undo on slice {}", slice);
            return Ok(None);
        };
        self.markers.detach(
            &mut self.surface,
            &LandmarkKey {
                slice_index: slice,
                position: position - 1,
            },
        );

        log::debug!("{} after undo on slice {}", session.store, slice);
        Ok(Some(removed))
    }

    /// Persist a complete session and flag it complete.
    ///
    /// Nothing is written unless every landmark has been placed.
    pub fn save(&mut self) -> Result<SaveReport, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSequenceLoaded)?;

        let (count, max) = (session.total_count(), session.max_landmarks());
        if count != max {
            return Err(SessionError::IncompleteLandmarks { count, max });
        }

        let was_complete = session.completion_flag();
        let report = match self.adapter.save(session) {
            Ok(report) => report,
            Err(e @ FormatError::TableWrite { .. }) if was_complete => {
                // The record was rolled back, so the sequence is no longer complete
                session.set_completion_flag(false);
                if let Err(status) = self.status.set(session.path(), STATUS_INCOMPLETE) {
                    log::error!("Failed to unflag {}: {}", session.identity(), status);
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        session.set_completion_flag(true);
        self.status.set(session.path(), STATUS_COMPLETE)?;
        Ok(report)
    }

    /// Remove every landmark, wiping persisted ones if the sequence was saved.
    pub fn clear(&mut self) -> Result<ClearReport, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSequenceLoaded)?;

        let persisted_cleared = self.adapter.clear(session)?;
        let removed = session.store.clear();
        self.markers.clear(&mut self.surface);

        if persisted_cleared {
            session.set_completion_flag(false);
            self.status.set(session.path(), STATUS_INCOMPLETE)?;
        }

        log::info!(
            "Cleared {} landmarks from {}{}",
            removed,
            session.identity(),
            if persisted_cleared { " (persisted state wiped)" } else { "" }
        );
        Ok(ClearReport {
            removed,
            persisted_cleared,
        })
    }

    /// Show `slice`, clamped to the sequence. Returns the slice shown.
    pub fn goto_slice(&mut self, slice: SliceIndex) -> Result<SliceIndex, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSequenceLoaded)?;
        let active = session.set_active_slice(slice);
        self.surface.render_slice(active);
        self.markers.refresh_visibility(&mut self.surface, active);
        Ok(active)
    }

    /// Show the following slice, staying on the last one.
    pub fn next_slice(&mut self) -> Result<SliceIndex, SessionError> {
        let current = self.active_slice()?;
        self.goto_slice(current.saturating_add(1))
    }

    /// Show the preceding slice, staying on the first one.
    pub fn prev_slice(&mut self) -> Result<SliceIndex, SessionError> {
        let current = self.active_slice()?;
        self.goto_slice(current.saturating_sub(1))
    }

    fn active_slice(&self) -> Result<SliceIndex, SessionError> {
        self.session
            .as_ref()
            .map(LandmarkSession::active_slice)
            .ok_or(SessionError::NoSequenceLoaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TablePaths;
    use crate::format::{DatasetTable, SequenceRecord};
    use crate::model::DatasetType;
    use crate::render::HeadlessSurface;
    use tempfile::TempDir;

    const SAGITTAL_SEQ: &str = "DATASET_SAGITTAL/1/LEFT/t2_sag";
    const AXIAL_SEQ: &str = "DATASET_AXIAL/2/RIGHT/pd_tra";

    struct Fixture {
        dir: TempDir,
        controller: SessionController<HeadlessSurface>,
    }

    impl Fixture {
        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }
    }

    fn fixture_with(surface: HeadlessSurface) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut status = StatusIndex::empty(dir.path().join("status.json"));
        let mut sequences = Vec::new();
        for rel in [SAGITTAL_SEQ, AXIAL_SEQ] {
            let seq = dir.path().join(rel);
            std::fs::create_dir_all(&seq).unwrap();
            for i in 0..3 {
                std::fs::write(seq.join(format!("IM-{:04}.dcm", i)), b"").unwrap();
            }
            sequences.push(seq);
        }
        status.populate(sequences.iter().map(PathBuf::as_path));
        status.save().unwrap();

        let adapter = PersistenceAdapter::new(TablePaths::under(dir.path()));
        let controller = SessionController::new(adapter, status, surface);
        Fixture { dir, controller }
    }

    fn fixture() -> Fixture {
        fixture_with(HeadlessSurface::new())
    }

    /// Fill every landmark of the open sequence, spread over two slices.
    fn fill(controller: &mut SessionController<HeadlessSurface>) {
        let max = controller.session().unwrap().max_landmarks();
        for i in 0..max {
            controller.goto_slice((i % 2) as SliceIndex).unwrap();
            controller.add_landmark(i as f32, i as f32 * 2.0).unwrap();
        }
    }

    #[test]
    fn test_operations_need_an_open_sequence() {
        let mut f = fixture();
        let c = &mut f.controller;
        assert_eq!(c.state(), ControllerState::Empty);
        assert!(matches!(c.add_landmark(1.0, 1.0), Err(SessionError::NoSequenceLoaded)));
        assert!(matches!(c.undo_landmark(), Err(SessionError::NoSequenceLoaded)));
        assert!(matches!(c.save(), Err(SessionError::NoSequenceLoaded)));
        assert!(matches!(c.clear(), Err(SessionError::NoSequenceLoaded)));
        assert!(matches!(c.next_slice(), Err(SessionError::NoSequenceLoaded)));
    }

    #[test]
    fn test_open_sets_up_session() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        let session = f.controller.open(&seq).unwrap();
        assert_eq!(session.max_landmarks(), 7);
        assert_eq!(session.slice_count(), 3);
        assert_eq!(session.active_slice(), 0);
        assert_eq!(f.controller.state(), ControllerState::Loaded);
        assert_eq!(f.controller.surface().current_slice(), Some(0));
    }

    #[test]
    fn test_open_bad_path_keeps_current_session() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        f.controller.open(&seq).unwrap();
        f.controller.add_landmark(1.0, 1.0).unwrap();

        let err = f.controller.open(&f.path("DATASET_SAGITTAL/1/LEFT")).unwrap_err();
        assert!(matches!(err, SessionError::Identity(_)));
        let session = f.controller.session().unwrap();
        assert_eq!(session.path(), seq);
        assert_eq!(session.total_count(), 1);
    }

    #[test]
    fn test_open_ignores_malformed_record() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        std::fs::write(seq.join("t2_sag.json"), "{\"0\": 42}").unwrap();

        let session = f.controller.open(&seq).unwrap();
        assert_eq!(session.total_count(), 0);
        assert!(!session.completion_flag());
    }

    #[test]
    fn test_markers_follow_active_slice() {
        // Scenario A
        let mut f = fixture();
        let c = &mut f.controller;
        c.open(&f.dir.path().join(SAGITTAL_SEQ)).unwrap();
        c.add_landmark(10.0, 20.0).unwrap();
        c.add_landmark(30.0, 40.0).unwrap();
        assert_eq!(c.next_slice().unwrap(), 1);
        c.add_landmark(50.0, 60.0).unwrap();

        assert_eq!(c.markers().len(), 3);
        let shown: Vec<(f32, f32)> = c.surface().visible_markers().iter().map(|m| (m.x, m.y)).collect();
        assert_eq!(shown, vec![(50.0, 60.0)]);

        assert_eq!(c.prev_slice().unwrap(), 0);
        assert_eq!(c.surface().visible_markers().len(), 2);
        assert_eq!(c.surface().current_slice(), Some(0));
    }

    #[test]
    fn test_slice_navigation_is_clamped() {
        let mut f = fixture();
        let c = &mut f.controller;
        c.open(&f.dir.path().join(SAGITTAL_SEQ)).unwrap();

        assert_eq!(c.prev_slice().unwrap(), 0);
        assert_eq!(c.goto_slice(99).unwrap(), 2);
        assert_eq!(c.next_slice().unwrap(), 2);
    }

    #[test]
    fn test_undo_is_slice_scoped() {
        // Scenario B
        let mut f = fixture();
        let c = &mut f.controller;
        c.open(&f.dir.path().join(SAGITTAL_SEQ)).unwrap();
        c.add_landmark(10.0, 20.0).unwrap();
        c.add_landmark(30.0, 40.0).unwrap();
        c.goto_slice(1).unwrap();
        c.add_landmark(50.0, 60.0).unwrap();

        let removed = c.undo_landmark().unwrap().unwrap();
        assert_eq!(removed.position(), (50.0, 60.0));
        assert_eq!(c.undo_landmark().unwrap(), None);
        assert_eq!(c.session().unwrap().total_count(), 2);
        assert_eq!(c.markers().len(), 2);

        c.goto_slice(0).unwrap();
        let removed = c.undo_landmark().unwrap().unwrap();
        assert_eq!(removed.position(), (30.0, 40.0));
        assert_eq!(c.surface().visible_markers().len(), 1);
    }

    #[test]
    fn test_capacity_exceeded_keeps_state() {
        let mut f = fixture();
        let c = &mut f.controller;
        c.open(&f.dir.path().join(SAGITTAL_SEQ)).unwrap();
        fill(c);

        let err = c.add_landmark(1.0, 1.0).unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::CapacityExceeded { max: 7 })));
        assert_eq!(c.session().unwrap().total_count(), 7);
        assert_eq!(c.markers().len(), 7);
    }

    #[test]
    fn test_out_of_bounds_point_is_rejected() {
        let mut f = fixture_with(HeadlessSurface::with_dimensions(100, 50));
        let c = &mut f.controller;
        c.open(&f.dir.path().join(SAGITTAL_SEQ)).unwrap();

        assert!(c.add_landmark(99.0, 49.0).is_ok());
        for (x, y) in [(100.0, 10.0), (10.0, 50.0), (-1.0, 10.0)] {
            let err = c.add_landmark(x, y).unwrap_err();
            assert!(matches!(err, SessionError::OutOfBounds { width: 100, height: 50, .. }));
        }
        assert_eq!(c.session().unwrap().total_count(), 1);
    }

    #[test]
    fn test_incomplete_save_writes_nothing() {
        // Scenario C
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        let table = f.path("DATASET_SAGITTAL/dataset_sagittal.csv");
        let status_before = std::fs::read_to_string(f.path("status.json")).unwrap();

        f.controller.open(&seq).unwrap();
        f.controller.add_landmark(1.0, 1.0).unwrap();
        let err = f.controller.save().unwrap_err();
        assert!(matches!(err, SessionError::IncompleteLandmarks { count: 1, max: 7 }));

        assert!(!seq.join("t2_sag.json").exists());
        assert!(!table.exists());
        assert_eq!(std::fs::read_to_string(f.path("status.json")).unwrap(), status_before);
        assert!(!f.controller.session().unwrap().completion_flag());
    }

    #[test]
    fn test_complete_save_flags_sequence() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        f.controller.open(&seq).unwrap();
        fill(&mut f.controller);

        let report = f.controller.save().unwrap();
        assert_eq!(report.landmarks, 7);
        assert!(f.controller.session().unwrap().completion_flag());
        assert_eq!(f.controller.status().get(&seq).unwrap(), STATUS_COMPLETE);

        // Status survives a reload from disk
        let status = StatusIndex::load(f.path("status.json")).unwrap();
        assert_eq!(status.get(&seq).unwrap(), STATUS_COMPLETE);

        // Reopening restores every landmark on its slice
        let saved = f.controller.session().unwrap().store.clone();
        let reopened = f.controller.open(&seq).unwrap();
        assert_eq!(reopened.store, saved);
        assert!(reopened.completion_flag());
    }

    #[test]
    fn test_failed_resave_unflags_sequence() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        f.controller.open(&seq).unwrap();
        fill(&mut f.controller);
        f.controller.save().unwrap();

        // A directory in place of the table makes the next table write fail
        let table = f.controller.adapter().table_path(DatasetType::Sagittal).to_path_buf();
        std::fs::remove_file(&table).unwrap();
        std::fs::create_dir_all(&table).unwrap();

        let result = f.controller.save();
        assert!(matches!(
            result,
            Err(SessionError::Format(FormatError::TableWrite { .. }))
        ));
        assert!(!f.controller.session().unwrap().completion_flag());
        assert_eq!(f.controller.status().get(&seq).unwrap(), STATUS_INCOMPLETE);

        let status = StatusIndex::load(f.path("status.json")).unwrap();
        assert_eq!(status.get(&seq).unwrap(), STATUS_INCOMPLETE);
        let record = SequenceRecord::read(&seq.join("t2_sag.json")).unwrap();
        assert_eq!(record, Some(SequenceRecord::empty()));

        let next = f.controller.open_next().unwrap().unwrap();
        assert_eq!(crate::status::path_key(&next), crate::status::path_key(&seq));
    }

    #[test]
    fn test_open_widens_slices_to_recorded_landmarks() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        let identity = SequenceIdentity::from_path(&seq).unwrap();
        let mut store = crate::model::LandmarkStore::new(identity.max_landmarks());
        store.add(4.0, 5.0, 5).unwrap();
        SequenceRecord::from_store(&identity, &store)
            .write(&seq.join("t2_sag.json"))
            .unwrap();

        let session = f.controller.open(&seq).unwrap();
        assert_eq!(session.slice_count(), 6);
        assert_eq!(session.store.total_count(), 1);

        assert_eq!(f.controller.goto_slice(5).unwrap(), 5);
        assert_eq!(f.controller.markers().len(), 1);
        let removed = f.controller.undo_landmark().unwrap().unwrap();
        assert_eq!((removed.x, removed.y, removed.slice_index), (4.0, 5.0, 5));
        assert!(f.controller.session().unwrap().store.is_empty());
    }

    #[test]
    fn test_clear_after_save_wipes_everything() {
        // Scenario D
        let mut f = fixture();
        let seq = f.path(AXIAL_SEQ);
        f.controller.open(&seq).unwrap();
        fill(&mut f.controller);
        f.controller.save().unwrap();

        let report = f.controller.clear().unwrap();
        assert_eq!(
            report,
            ClearReport {
                removed: 11,
                persisted_cleared: true
            }
        );

        let session = f.controller.session().unwrap();
        assert_eq!(session.total_count(), 0);
        assert!(!session.completion_flag());
        assert!(f.controller.markers().is_empty());
        assert_eq!(f.controller.status().get(&seq).unwrap(), STATUS_INCOMPLETE);

        let record = SequenceRecord::read(&seq.join("pd_tra.json")).unwrap();
        assert_eq!(record, Some(SequenceRecord::empty()));
        let table = DatasetTable::load(f.controller.adapter().table_path(DatasetType::Axial)).unwrap();
        assert!(table.rows().is_empty());
    }

    #[test]
    fn test_clear_unsaved_session_is_memory_only() {
        let mut f = fixture();
        let seq = f.path(AXIAL_SEQ);
        f.controller.open(&seq).unwrap();
        f.controller.add_landmark(1.0, 1.0).unwrap();

        let report = f.controller.clear().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!report.persisted_cleared);
        assert!(!seq.join("pd_tra.json").exists());
    }

    #[test]
    fn test_open_next_walks_status_order() {
        let mut f = fixture();
        let first = f.path(SAGITTAL_SEQ);
        let second = f.path(AXIAL_SEQ);

        let opened = f.controller.open_next().unwrap().unwrap();
        assert_eq!(crate::status::path_key(&opened), crate::status::path_key(&first));
        fill(&mut f.controller);
        f.controller.save().unwrap();

        let opened = f.controller.open_next().unwrap().unwrap();
        assert_eq!(crate::status::path_key(&opened), crate::status::path_key(&second));
        fill(&mut f.controller);
        f.controller.save().unwrap();

        assert_eq!(f.controller.open_next().unwrap(), None);
    }

    #[test]
    fn test_open_discards_unsaved_changes() {
        let mut f = fixture();
        let seq = f.path(SAGITTAL_SEQ);
        f.controller.open(&seq).unwrap();
        f.controller.add_landmark(1.0, 1.0).unwrap();

        let other = f.path(AXIAL_SEQ);
        f.controller.open(&other).unwrap();
        assert_eq!(f.controller.markers().len(), 0);
        assert_eq!(f.controller.surface().marker_count(), 0);

        let reopened = f.controller.open(&seq).unwrap();
        assert_eq!(reopened.total_count(), 0);
    }
}
