//! Map - Container for keyframes and landmarks.
//!
//! The Map holds the frames selected for permanent retention (keyframes)
//! and the sparse 3D landmarks. Within the tracking front-end it is
//! append-only and single-writer: frames only enter via an explicit
//! keyframe-insertion decision, never implicitly.

use std::collections::HashMap;

use nalgebra::Vector3;
use opencv::core::Mat;

use super::frame::Frame;
use super::landmark::Landmark;
use super::types::{FrameId, LandmarkId};

/// The sparse map of keyframes and landmarks.
pub struct Map {
    /// Keyframes, keyed by their frame id.
    keyframes: HashMap<FrameId, Frame>,

    /// Landmarks, keyed by their id.
    landmarks: HashMap<LandmarkId, Landmark>,

    /// Counter for generating unique Landmark IDs.
    next_landmark_id: u64,
}

impl Map {
    /// Create a new empty Map.
    pub fn new() -> Self {
        Self {
            keyframes: HashMap::new(),
            landmarks: HashMap::new(),
            next_landmark_id: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Keyframe Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a frame as a keyframe.
    ///
    /// Upsert semantics: re-inserting a frame with the same id overwrites
    /// the stored one.
    pub fn insert_keyframe(&mut self, frame: Frame) {
        self.keyframes.insert(frame.id, frame);
    }

    /// Get a keyframe by id.
    pub fn get_keyframe(&self, id: FrameId) -> Option<&Frame> {
        self.keyframes.get(&id)
    }

    /// Get all keyframes.
    pub fn keyframes(&self) -> impl Iterator<Item = &Frame> {
        self.keyframes.values()
    }

    /// Get the number of keyframes.
    pub fn num_keyframes(&self) -> usize {
        self.keyframes.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Landmark Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Create and add a new Landmark, allocating the next sequential id.
    ///
    /// Returns the id of the created Landmark.
    pub fn create_landmark(
        &mut self,
        position: Vector3<f64>,
        normal: Vector3<f64>,
        descriptor: Mat,
    ) -> LandmarkId {
        let id = LandmarkId::new(self.next_landmark_id);
        self.next_landmark_id += 1;
        self.landmarks
            .insert(id, Landmark::new(id, position, normal, descriptor));
        id
    }

    /// Insert an existing Landmark.
    ///
    /// Upsert semantics keyed by the landmark's id. The id counter is
    /// bumped past the inserted id so later `create_landmark` calls stay
    /// unique.
    pub fn insert_landmark(&mut self, landmark: Landmark) {
        if landmark.id.0 >= self.next_landmark_id {
            self.next_landmark_id = landmark.id.0 + 1;
        }
        self.landmarks.insert(landmark.id, landmark);
    }

    /// Get a Landmark by id.
    pub fn get_landmark(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    /// Get a mutable reference to a Landmark by id.
    pub fn get_landmark_mut(&mut self, id: LandmarkId) -> Option<&mut Landmark> {
        self.landmarks.get_mut(&id)
    }

    /// Get all Landmarks.
    pub fn landmarks(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// Get the number of Landmarks.
    pub fn num_landmarks(&self) -> usize {
        self.landmarks.len()
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("num_keyframes", &self.keyframes.len())
            .field("num_landmarks", &self.landmarks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraModel;
    use opencv::core::{self, Scalar};
    use std::sync::Arc;

    fn test_frame(id: u64) -> Frame {
        let camera = Arc::new(CameraModel::new(500.0, 500.0, 320.0, 240.0, 1000.0));
        let color =
            Mat::new_rows_cols_with_default(48, 64, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let depth =
            Mat::new_rows_cols_with_default(48, 64, core::CV_16UC1, Scalar::all(1000.0)).unwrap();
        Frame::new(FrameId::new(id), id as f64, camera, color, depth)
    }

    #[test]
    fn test_insert_keyframe() {
        let mut map = Map::new();
        map.insert_keyframe(test_frame(3));

        assert_eq!(map.num_keyframes(), 1);
        assert!(map.get_keyframe(FrameId::new(3)).is_some());
        assert!(map.get_keyframe(FrameId::new(4)).is_none());
    }

    #[test]
    fn test_insert_keyframe_is_upsert() {
        let mut map = Map::new();

        let mut first = test_frame(7);
        first.timestamp = 1.0;
        let mut second = test_frame(7);
        second.timestamp = 2.0;

        map.insert_keyframe(first);
        map.insert_keyframe(second);

        assert_eq!(map.num_keyframes(), 1);
        assert_eq!(map.get_keyframe(FrameId::new(7)).unwrap().timestamp, 2.0);
    }

    #[test]
    fn test_create_landmark_allocates_sequential_ids() {
        let mut map = Map::new();

        let a = map.create_landmark(Vector3::zeros(), Vector3::z(), Mat::default());
        let b = map.create_landmark(Vector3::zeros(), Vector3::z(), Mat::default());

        assert_eq!(a, LandmarkId::new(0));
        assert_eq!(b, LandmarkId::new(1));
        assert_eq!(map.num_landmarks(), 2);
    }

    #[test]
    fn test_insert_landmark_is_upsert_and_bumps_counter() {
        let mut map = Map::new();

        let lm = Landmark::new(
            LandmarkId::new(5),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::z(),
            Mat::default(),
        );
        map.insert_landmark(lm.clone());
        map.insert_landmark(lm);

        assert_eq!(map.num_landmarks(), 1);

        // Fresh ids must not collide with the inserted one
        let next = map.create_landmark(Vector3::zeros(), Vector3::z(), Mat::default());
        assert_eq!(next, LandmarkId::new(6));
    }

    #[test]
    fn test_landmark_counters_can_be_incremented_in_place() {
        let mut map = Map::new();
        let id = map.create_landmark(Vector3::zeros(), Vector3::z(), Mat::default());

        map.get_landmark_mut(id).unwrap().increase_observed();
        map.get_landmark_mut(id).unwrap().increase_matched();

        let lm = map.get_landmark(id).unwrap();
        assert_eq!(lm.observed_count, 1);
        assert_eq!(lm.matched_count, 1);
    }
}
