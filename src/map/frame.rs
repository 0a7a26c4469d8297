//! Frame - one timestamped RGB-D observation.

use std::sync::Arc;

use anyhow::Result;
use nalgebra::{Vector2, Vector3};
use opencv::core::{KeyPoint, Mat};
use opencv::prelude::*;

use crate::camera::CameraModel;
use crate::geometry::SE3;

use super::types::FrameId;

/// A single RGB-D observation.
///
/// Everything but the pose is immutable after construction. The pose starts
/// at identity and is committed exactly once by the tracker when the frame
/// is successfully tracked; a frame stored in the Map as a keyframe is only
/// handed out by shared reference afterwards.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Unique identifier, monotonically increasing with arrival order.
    pub id: FrameId,

    /// Capture time in seconds.
    pub timestamp: f64,

    /// World-to-camera transform.
    pub t_cw: SE3,

    /// The sensor this frame was captured with, shared across frames.
    pub camera: Arc<CameraModel>,

    /// Color image (8-bit, BGR).
    pub color: Mat,

    /// Depth image (16-bit, raw units of `camera.depth_scale` per metre).
    pub depth: Mat,
}

impl Frame {
    /// Create a frame with an identity pose.
    pub fn new(id: FrameId, timestamp: f64, camera: Arc<CameraModel>, color: Mat, depth: Mat) -> Self {
        Self {
            id,
            timestamp,
            t_cw: SE3::identity(),
            camera,
            color,
            depth,
        }
    }

    /// Commit the world-to-camera pose. Called once per frame by the
    /// tracker.
    pub fn set_pose(&mut self, t_cw: SE3) {
        self.t_cw = t_cw;
    }

    /// Metric depth at a keypoint, or `None` when the sensor reported no
    /// depth there.
    ///
    /// A zero sample at the rounded pixel falls back to the 4-neighbourhood
    /// before giving up, which recovers keypoints sitting on small holes in
    /// the depth image.
    pub fn find_depth(&self, kp: &KeyPoint) -> Result<Option<f64>> {
        let x = kp.pt().x.round() as i32;
        let y = kp.pt().y.round() as i32;
        let cols = self.depth.cols();
        let rows = self.depth.rows();

        for (dx, dy) in [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)] {
            let (u, v) = (x + dx, y + dy);
            if u < 0 || v < 0 || u >= cols || v >= rows {
                continue;
            }
            let d = *self.depth.at_2d::<u16>(v, u)?;
            if d != 0 {
                return Ok(Some(d as f64 / self.camera.depth_scale));
            }
        }

        Ok(None)
    }

    /// The camera's optical centre in world coordinates.
    pub fn camera_center(&self) -> Vector3<f64> {
        self.t_cw.inverse().translation
    }

    /// Whether a world point projects inside the image with strictly
    /// positive depth.
    pub fn is_in_frame(&self, p_world: &Vector3<f64>) -> bool {
        let p_cam = self.t_cw.transform_point(p_world);
        if p_cam.z <= 0.0 {
            return false;
        }

        let pixel: Vector2<f64> = self.camera.camera_to_pixel(&p_cam);
        pixel.x >= 0.0
            && pixel.y >= 0.0
            && pixel.x < self.color.cols() as f64
            && pixel.y < self.color.rows() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use opencv::core::{self, Scalar};

    fn test_camera() -> Arc<CameraModel> {
        Arc::new(CameraModel::new(500.0, 500.0, 320.0, 240.0, 1000.0))
    }

    fn test_frame(depth_raw: f64) -> Frame {
        let color =
            Mat::new_rows_cols_with_default(480, 640, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let depth =
            Mat::new_rows_cols_with_default(480, 640, core::CV_16UC1, Scalar::all(depth_raw))
                .unwrap();
        Frame::new(FrameId::new(0), 0.0, test_camera(), color, depth)
    }

    fn keypoint(x: f32, y: f32) -> KeyPoint {
        KeyPoint::new_coords(x, y, 1.0, -1.0, 0.0, 0, -1).unwrap()
    }

    #[test]
    fn test_find_depth_at_pixel() {
        let frame = test_frame(2000.0);
        let depth = frame.find_depth(&keypoint(100.0, 120.0)).unwrap();

        assert_eq!(depth, Some(2.0));
    }

    #[test]
    fn test_find_depth_falls_back_to_neighbours() {
        let mut frame = test_frame(0.0);
        // Only the left neighbour of (100, 120) carries depth
        *frame.depth.at_2d_mut::<u16>(120, 99).unwrap() = 1500;

        let depth = frame.find_depth(&keypoint(100.0, 120.0)).unwrap();
        assert_eq!(depth, Some(1.5));
    }

    #[test]
    fn test_find_depth_missing_is_none() {
        let frame = test_frame(0.0);
        let depth = frame.find_depth(&keypoint(100.0, 120.0)).unwrap();

        assert_eq!(depth, None);
    }

    #[test]
    fn test_camera_center_for_identity_pose() {
        let frame = test_frame(1000.0);
        assert_relative_eq!(frame.camera_center().norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_camera_center_undoes_translation() {
        let mut frame = test_frame(1000.0);
        frame.set_pose(SE3::new(
            UnitQuaternion::identity(),
            Vector3::new(1.0, -2.0, 3.0),
        ));

        assert_relative_eq!(
            frame.camera_center(),
            Vector3::new(-1.0, 2.0, -3.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_is_in_frame_accepts_visible_point() {
        let frame = test_frame(1000.0);
        // Projects to the principal point
        assert!(frame.is_in_frame(&Vector3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn test_is_in_frame_rejects_point_behind_camera() {
        let frame = test_frame(1000.0);
        assert!(!frame.is_in_frame(&Vector3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn test_is_in_frame_rejects_point_outside_bounds() {
        let frame = test_frame(1000.0);
        // u = 500 * 10 / 1 + 320, far beyond the right edge
        assert!(!frame.is_in_frame(&Vector3::new(10.0, 0.0, 1.0)));
    }
}
