//! Landmark data types.

/// Index of a slice within a sequence's stack.
pub type SliceIndex = u32;

/// A user-placed point on one slice (in image coordinates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// Horizontal image coordinate.
    pub x: f32,
    /// Vertical image coordinate.
    pub y: f32,
    /// Slice the landmark was placed on.
    pub slice_index: SliceIndex,
    /// 1-based placement order across the whole sequence.
    pub order_index: u32,
}

impl Landmark {
    /// Create a new landmark.
    pub fn new(x: f32, y: f32, slice_index: SliceIndex, order_index: u32) -> Self {
        Self {
            x,
            y,
            slice_index,
            order_index,
        }
    }

    /// Position as an `(x, y)` pair.
    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Stable identity of a landmark for presentation purposes.
///
/// Landmarks within a slice are only ever appended or popped from the end,
/// so `(slice_index, position)` stays valid for as long as the landmark exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LandmarkKey {
    /// Slice the landmark lives on.
    pub slice_index: SliceIndex,
    /// Position within the slice group.
    pub position: usize,
}

/// Landmarks of one slice, in placement order.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceLandmarks {
    slice_index: SliceIndex,
    landmarks: Vec<Landmark>,
}

impl SliceLandmarks {
    /// Create an empty group for a slice.
    pub fn new(slice_index: SliceIndex) -> Self {
        Self {
            slice_index,
            landmarks: Vec::new(),
        }
    }

    /// Slice this group belongs to.
    pub fn slice_index(&self) -> SliceIndex {
        self.slice_index
    }

    /// Landmarks in placement order.
    pub fn as_slice(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Iterate landmarks in placement order.
    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    /// Number of landmarks on this slice.
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Whether the group has no landmarks.
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub(crate) fn push(&mut self, landmark: Landmark) {
        debug_assert_eq!(landmark.slice_index, self.slice_index);
        self.landmarks.push(landmark);
    }

    pub(crate) fn pop(&mut self) -> Option<Landmark> {
        self.landmarks.pop()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Landmark> {
        self.landmarks.iter_mut()
    }
}

impl<'a> IntoIterator for &'a SliceLandmarks {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.landmarks.iter()
    }
}
