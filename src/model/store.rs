//! Per-sequence landmark storage with a global capacity and slice-scoped undo.

use std::collections::BTreeMap;
use std::fmt;

use super::landmark::{Landmark, LandmarkKey, SliceIndex, SliceLandmarks};

/// Errors raised by [`LandmarkStore`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The sequence already holds its maximum number of landmarks
    #[error("All {max} landmarks are already placed")]
    CapacityExceeded {
        /// Landmark capacity of the sequence
        max: usize,
    },
}

/// Landmarks of one sequence, grouped by slice.
///
/// Order indices are always exactly `1..=total_count`: removing a landmark
/// shifts every later landmark down by one, so the next landmark placed gets
/// `total_count + 1` and the last landmark of a slice is also the one with
/// the highest order index on that slice.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkStore {
    max_landmarks: usize,
    groups: BTreeMap<SliceIndex, SliceLandmarks>,
    total_count: usize,
}

impl LandmarkStore {
    /// Create an empty store bounded by `max_landmarks`.
    pub fn new(max_landmarks: usize) -> Self {
        Self {
            max_landmarks,
            groups: BTreeMap::new(),
            total_count: 0,
        }
    }

    /// Place a landmark on a slice.
    pub fn add(&mut self, x: f32, y: f32, slice_index: SliceIndex) -> Result<Landmark, StoreError> {
        if self.total_count >= self.max_landmarks {
            return Err(StoreError::CapacityExceeded {
                max: self.max_landmarks,
            });
        }

        let landmark = Landmark::new(x, y, slice_index, self.total_count as u32 + 1);
        self.groups
            .entry(slice_index)
            .or_insert_with(|| SliceLandmarks::new(slice_index))
            .push(landmark);
        self.total_count += 1;

        log::trace!(
            "Landmark {} placed on slice {} at ({}, {})",
            landmark.order_index,
            slice_index,
            x,
            y
        );
        Ok(landmark)
    }

    /// Remove the most recently placed landmark on `slice_index`.
    ///
    /// Landmarks on other slices are never touched (apart from renumbering).
    pub fn remove_last_on_slice(&mut self, slice_index: SliceIndex) -> Option<Landmark> {
        let group = self.groups.get_mut(&slice_index)?;
        let removed = group.pop()?;
        if group.is_empty() {
            self.groups.remove(&slice_index);
        }
        self.total_count -= 1;

        for landmark in self.groups.values_mut().flat_map(SliceLandmarks::iter_mut) {
            if landmark.order_index > removed.order_index {
                landmark.order_index -= 1;
            }
        }

        log::trace!(
            "Landmark {} removed from slice {}",
            removed.order_index,
            slice_index
        );
        Some(removed)
    }

    /// Remove every landmark, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.total_count;
        self.groups.clear();
        self.total_count = 0;
        removed
    }

    /// Landmarks to display while `slice_index` is the active slice.
    pub fn visible_on(&self, slice_index: SliceIndex) -> &[Landmark] {
        self.groups
            .get(&slice_index)
            .map(SliceLandmarks::as_slice)
            .unwrap_or(&[])
    }

    /// Non-empty slice groups in ascending slice order.
    pub fn groups(&self) -> impl Iterator<Item = &SliceLandmarks> {
        self.groups.values()
    }

    /// Every landmark with its presentation key.
    pub fn keyed(&self) -> impl Iterator<Item = (LandmarkKey, &Landmark)> {
        self.groups.values().flat_map(|group| {
            group.iter().enumerate().map(move |(position, landmark)| {
                (
                    LandmarkKey {
                        slice_index: group.slice_index(),
                        position,
                    },
                    landmark,
                )
            })
        })
    }

    /// All landmarks sorted by placement order.
    pub fn ordered(&self) -> Vec<Landmark> {
        let mut all: Vec<Landmark> = self.groups.values().flat_map(|g| g.iter().copied()).collect();
        all.sort_by_key(|l| l.order_index);
        all
    }

    /// Number of placed landmarks.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Landmark capacity.
    pub fn max_landmarks(&self) -> usize {
        self.max_landmarks
    }

    /// Landmarks still to place before the sequence is complete.
    pub fn remaining(&self) -> usize {
        self.max_landmarks.saturating_sub(self.total_count)
    }

    /// Whether every landmark has been placed.
    pub fn is_complete(&self) -> bool {
        self.total_count == self.max_landmarks
    }

    /// Whether no landmark has been placed.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

impl fmt::Display for LandmarkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Points: {} - MAX: {}", self.total_count, self.max_landmarks)
    }
}
