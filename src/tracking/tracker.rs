//! Visual odometry tracker: orchestrates feature extraction, matching,
//! PnP solving, pose validation, and the keyframe decision.
//!
//! The tracker is single-threaded and synchronous: each frame is fully
//! processed before the next one is accepted, because the pose estimate for
//! frame n depends on the committed reference state from frame n-1. All
//! per-frame numerical difficulties (no matches, too few inliers, diverged
//! solve) are absorbed here and surfaced only through the boolean result of
//! [`VisualOdometry::add_frame`].

use anyhow::{Result, bail};
use nalgebra::{Vector2, Vector3};
use opencv::core::{self, DMatch, Mat, Point2f, Vector};
use opencv::prelude::*;
use tracing::{debug, info, warn};

use crate::config::TrackingConfig;
use crate::geometry::pnp::{PnpRansacSolver, PnpSolution, PoseSolver};
use crate::map::{Frame, Map};
use crate::tracking::features::{FeatureExtractor, FeatureSet, OrbExtractor};
use crate::tracking::matching::{BruteForceMatcher, FeatureMatcher, filter_matches};
use crate::tracking::state::TrackingState;

/// Upper bound on the tangent-space norm of a single-step motion estimate.
/// Anything larger is treated as solver divergence, not real camera motion.
const MAX_MOTION_NORM: f64 = 5.0;

/// Frame-to-frame visual odometry front-end.
pub struct VisualOdometry {
    config: TrackingConfig,

    extractor: Box<dyn FeatureExtractor>,
    matcher: Box<dyn FeatureMatcher>,
    solver: Box<dyn PoseSolver>,

    state: TrackingState,
    map: Map,

    /// The most recent successfully tracked frame; matching target for the
    /// next incoming frame. `Some` whenever the state is `Ok`.
    reference: Option<Frame>,

    /// Camera-frame 3D points of the reference frame's keypoints with valid
    /// depth. Rebuilt on every reference promotion, never persisted.
    ref_points: Vec<Vector3<f64>>,

    /// Descriptors row-aligned with `ref_points`.
    ref_descriptors: Mat,

    /// Consecutive tracking failures since the last success.
    num_lost: u32,
}

impl VisualOdometry {
    /// Create a tracker with the default OpenCV-backed capabilities (ORB
    /// extraction, brute-force Hamming matching, RANSAC PnP).
    pub fn new(config: TrackingConfig) -> Result<Self> {
        let extractor = OrbExtractor::new(
            config.num_features,
            config.scale_factor,
            config.level_pyramid,
        )?;
        let matcher = BruteForceMatcher::new()?;
        Ok(Self::with_capabilities(
            config,
            Box::new(extractor),
            Box::new(matcher),
            Box::new(PnpRansacSolver::default()),
        ))
    }

    /// Create a tracker with explicit capability implementations.
    pub fn with_capabilities(
        config: TrackingConfig,
        extractor: Box<dyn FeatureExtractor>,
        matcher: Box<dyn FeatureMatcher>,
        solver: Box<dyn PoseSolver>,
    ) -> Self {
        Self {
            config,
            extractor,
            matcher,
            solver,
            state: TrackingState::Initializing,
            map: Map::new(),
            reference: None,
            ref_points: Vec::new(),
            ref_descriptors: Mat::default(),
            num_lost: 0,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The most recent successfully tracked frame.
    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Process one incoming frame.
    ///
    /// Returns `Ok(true)` when the frame was tracked (or seeded the map),
    /// `Ok(false)` when tracking failed for this frame or the tracker is
    /// lost. `Err` is reserved for fatal conditions such as malformed
    /// images or broken internal invariants.
    pub fn add_frame(&mut self, mut frame: Frame) -> Result<bool> {
        match self.state {
            TrackingState::Initializing => {
                let features = self.extract_features(&frame)?;
                self.set_reference_points(&frame, &features)?;
                self.seed_landmarks(&frame)?;
                self.map.insert_keyframe(frame.clone());
                self.reference = Some(frame);
                self.state = TrackingState::Ok;
                info!(
                    landmarks = self.map.num_landmarks(),
                    "map seeded from first frame"
                );
                Ok(true)
            }

            TrackingState::Ok => {
                let features = self.extract_features(&frame)?;
                let candidates = self
                    .matcher
                    .match_descriptors(&self.ref_descriptors, &features.descriptors)?;
                let matches = filter_matches(&candidates, self.config.match_ratio);
                debug!(
                    candidates = candidates.len(),
                    good = matches.len(),
                    "matched features against reference"
                );

                let (ref_pose, ref_camera) = match self.reference.as_ref() {
                    Some(r) => (r.t_cw.clone(), r.camera.clone()),
                    None => bail!("tracking state is OK but no reference frame is set"),
                };

                let (points3d, points2d) = self.build_correspondences(&matches, &features)?;
                let solution = self.solver.solve(&points3d, &points2d, ref_camera.as_ref())?;
                debug!(inliers = solution.num_inliers, "pose solved");

                if !self.check_estimated_pose(&solution) {
                    self.num_lost += 1;
                    if self.num_lost > self.config.max_num_lost {
                        warn!(
                            failures = self.num_lost,
                            "too many consecutive tracking failures"
                        );
                        self.state = TrackingState::Lost;
                    }
                    return Ok(false);
                }

                // The solved transform maps reference-camera coordinates to
                // current-camera coordinates, so it pre-composes onto the
                // reference's world-to-camera pose.
                frame.set_pose(solution.t_cr.compose(&ref_pose));
                self.num_lost = 0;

                let is_keyframe = self.check_key_frame(&solution.t_cr);
                self.set_reference_points(&frame, &features)?;
                if is_keyframe {
                    debug!(frame = %frame.id, "inserting keyframe");
                    self.map.insert_keyframe(frame.clone());
                }
                self.reference = Some(frame);
                Ok(true)
            }

            TrackingState::Lost => {
                warn!("tracking is lost, ignoring frame");
                Ok(false)
            }
        }
    }

    /// Detect keypoints and compute their descriptors on the color image.
    fn extract_features(&mut self, frame: &Frame) -> Result<FeatureSet> {
        let mut keypoints = self.extractor.detect(&frame.color)?;
        let descriptors = self.extractor.compute(&frame.color, &mut keypoints)?;
        Ok(FeatureSet {
            keypoints,
            descriptors,
        })
    }

    /// Rebuild the reference 3D point set from a newly promoted reference
    /// frame.
    ///
    /// Keypoints without valid depth cannot participate in PnP solving and
    /// are dropped.
    fn set_reference_points(&mut self, frame: &Frame, features: &FeatureSet) -> Result<()> {
        self.ref_points.clear();
        let mut descriptor_rows = Vector::<Mat>::new();

        for (i, kp) in features.keypoints.iter().enumerate() {
            let Some(depth) = frame.find_depth(&kp)? else {
                continue;
            };
            let pixel = Vector2::new(kp.pt().x as f64, kp.pt().y as f64);
            self.ref_points.push(frame.camera.pixel_to_camera(&pixel, depth));
            descriptor_rows.push(features.descriptors.row(i as i32)?.try_clone()?);
        }

        self.ref_descriptors = Mat::default();
        if !descriptor_rows.is_empty() {
            core::vconcat(&descriptor_rows, &mut self.ref_descriptors)?;
        }
        Ok(())
    }

    /// Promote the reference points of the seeding frame to landmarks.
    fn seed_landmarks(&mut self, frame: &Frame) -> Result<()> {
        let center = frame.camera_center();
        for (i, p_cam) in self.ref_points.iter().enumerate() {
            let p_world = frame.camera.camera_to_world(p_cam, &frame.t_cw);
            let normal = (p_world - center).normalize();
            let descriptor = self.ref_descriptors.row(i as i32)?.try_clone()?;
            self.map.create_landmark(p_world, normal, descriptor);
        }
        Ok(())
    }

    /// Pair reference 3D points with current 2D keypoints through the
    /// filtered matches.
    fn build_correspondences(
        &self,
        matches: &[DMatch],
        features: &FeatureSet,
    ) -> Result<(Vec<Vector3<f64>>, Vec<Point2f>)> {
        let mut points3d = Vec::with_capacity(matches.len());
        let mut points2d = Vec::with_capacity(matches.len());

        for m in matches {
            points3d.push(self.ref_points[m.query_idx as usize]);
            let kp = features.keypoints.get(m.train_idx as usize)?;
            points2d.push(kp.pt());
        }
        Ok((points3d, points2d))
    }

    /// Validate a solved pose: enough inliers, plausible motion magnitude.
    fn check_estimated_pose(&self, solution: &PnpSolution) -> bool {
        if solution.num_inliers < self.config.min_inliers {
            debug!(
                inliers = solution.num_inliers,
                "rejecting pose: too few inliers"
            );
            return false;
        }

        let motion = solution.t_cr.log().norm();
        if motion > MAX_MOTION_NORM {
            debug!(motion, "rejecting pose: implausibly large motion");
            return false;
        }

        true
    }

    /// Whether the relative motion is large enough for the current frame to
    /// become a keyframe. Rotation and translation are thresholded
    /// independently.
    fn check_key_frame(&self, t_cr: &crate::geometry::SE3) -> bool {
        let xi = t_cr.log();
        let translation = xi.fixed_rows::<3>(0).norm();
        let rotation = xi.fixed_rows::<3>(3).norm();

        rotation > self.config.keyframe_min_rotation
            || translation > self.config.keyframe_min_translation
    }
}
