//! Presentation seam between landmarks and whatever draws them.
//!
//! Landmarks never hold display handles. A [`MarkerRegistry`] owned by the
//! presentation side maps each [`LandmarkKey`] to the handle returned by the
//! [`RenderSurface`], and keeps marker visibility in step with the active slice.

use std::collections::HashMap;

use crate::model::{Landmark, LandmarkKey, LandmarkStore, SliceIndex};

/// Handle to a marker drawn by a surface.
pub type MarkerHandle = u64;

/// Something that can show a slice and overlay markers on it.
pub trait RenderSurface {
    /// Display slice `index` of the open sequence.
    fn render_slice(&mut self, index: SliceIndex);

    /// Draw a marker, initially hidden, and return its handle.
    fn add_marker(&mut self, x: f32, y: f32, slice_index: SliceIndex) -> MarkerHandle;

    /// Show or hide a marker.
    fn set_marker_visible(&mut self, handle: MarkerHandle, visible: bool);

    /// Remove a marker.
    fn remove_marker(&mut self, handle: MarkerHandle);

    /// Width and height of the displayed slice, when known.
    fn slice_dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Landmark → marker handle mapping.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    markers: HashMap<LandmarkKey, MarkerHandle>,
}

impl MarkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of markers currently drawn.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether no markers are drawn.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Handle drawn for a landmark.
    pub fn handle(&self, key: &LandmarkKey) -> Option<MarkerHandle> {
        self.markers.get(key).copied()
    }

    /// Draw a marker for a newly placed landmark.
    pub fn attach(
        &mut self,
        surface: &mut dyn RenderSurface,
        key: LandmarkKey,
        landmark: &Landmark,
        active_slice: SliceIndex,
    ) {
        let handle = surface.add_marker(landmark.x, landmark.y, landmark.slice_index);
        surface.set_marker_visible(handle, landmark.slice_index == active_slice);
        if let Some(stale) = self.markers.insert(key, handle) {
            surface.remove_marker(stale);
        }
    }

    /// Remove the marker of a removed landmark.
    pub fn detach(&mut self, surface: &mut dyn RenderSurface, key: &LandmarkKey) {
        if let Some(handle) = self.markers.remove(key) {
            surface.remove_marker(handle);
        }
    }

    /// Remove every marker.
    pub fn clear(&mut self, surface: &mut dyn RenderSurface) {
        for (_, handle) in self.markers.drain() {
            surface.remove_marker(handle);
        }
    }

    /// Redraw every landmark of a store from scratch.
    pub fn rebuild(
        &mut self,
        surface: &mut dyn RenderSurface,
        store: &LandmarkStore,
        active_slice: SliceIndex,
    ) {
        self.clear(surface);
        for (key, landmark) in store.keyed() {
            self.attach(surface, key, landmark, active_slice);
        }
    }

    /// Show markers of the active slice only.
    pub fn refresh_visibility(&self, surface: &mut dyn RenderSurface, active_slice: SliceIndex) {
        for (key, &handle) in &self.markers {
            surface.set_marker_visible(handle, key.slice_index == active_slice);
        }
    }
}

/// A marker as tracked by [`HeadlessSurface`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessMarker {
    /// Horizontal position
    pub x: f32,
    /// Vertical position
    pub y: f32,
    /// Slice the marker belongs to
    pub slice_index: SliceIndex,
    /// Whether the marker is shown
    pub visible: bool,
}

/// Surface without a display: remembers markers and logs what it would draw.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    current_slice: Option<SliceIndex>,
    dimensions: Option<(u32, u32)>,
    markers: HashMap<MarkerHandle, HeadlessMarker>,
    next_handle: MarkerHandle,
}

impl HeadlessSurface {
    /// Create a surface with unknown slice dimensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a surface reporting fixed slice dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            dimensions: Some((width, height)),
            ..Self::default()
        }
    }

    /// Last slice rendered.
    pub fn current_slice(&self) -> Option<SliceIndex> {
        self.current_slice
    }

    /// Markers currently shown.
    pub fn visible_markers(&self) -> Vec<HeadlessMarker> {
        let mut visible: Vec<HeadlessMarker> =
            self.markers.values().filter(|m| m.visible).copied().collect();
        visible.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        visible
    }

    /// Number of markers drawn, shown or not.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

impl RenderSurface for HeadlessSurface {
    fn render_slice(&mut self, index: SliceIndex) {
        log::trace!("Render slice {}", index);
        self.current_slice = Some(index);
    }

    fn add_marker(&mut self, x: f32, y: f32, slice_index: SliceIndex) -> MarkerHandle {
        self.next_handle += 1;
        self.markers.insert(
            self.next_handle,
            HeadlessMarker {
                x,
                y,
                slice_index,
                visible: false,
            },
        );
        self.next_handle
    }

    fn set_marker_visible(&mut self, handle: MarkerHandle, visible: bool) {
        if let Some(marker) = self.markers.get_mut(&handle) {
            marker.visible = visible;
        }
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.markers.remove(&handle);
    }

    fn slice_dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LandmarkStore {
        let mut store = LandmarkStore::new(5);
        store.add(10.0, 20.0, 0).unwrap();
        store.add(30.0, 40.0, 0).unwrap();
        store.add(50.0, 60.0, 1).unwrap();
        store
    }

    #[test]
    fn test_rebuild_shows_active_slice_only() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        registry.rebuild(&mut surface, &store(), 0);

        assert_eq!(registry.len(), 3);
        assert_eq!(surface.marker_count(), 3);
        let visible: Vec<(f32, f32)> = surface.visible_markers().iter().map(|m| (m.x, m.y)).collect();
        assert_eq!(visible, vec![(10.0, 20.0), (30.0, 40.0)]);

        registry.refresh_visibility(&mut surface, 1);
        let visible: Vec<(f32, f32)> = surface.visible_markers().iter().map(|m| (m.x, m.y)).collect();
        assert_eq!(visible, vec![(50.0, 60.0)]);
    }

    #[test]
    fn test_detach_and_clear() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        registry.rebuild(&mut surface, &store(), 0);

        let key = LandmarkKey {
            slice_index: 0,
            position: 1,
        };
        assert!(registry.handle(&key).is_some());
        registry.detach(&mut surface, &key);
        assert_eq!(registry.handle(&key), None);
        assert_eq!(surface.marker_count(), 2);

        registry.clear(&mut surface);
        assert!(registry.is_empty());
        assert_eq!(surface.marker_count(), 0);
    }
}
