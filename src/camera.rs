//! Pinhole RGB-D camera model.
//!
//! One `CameraModel` describes a physical sensor and is shared read-only
//! (via `Arc`) by every Frame captured with it. All conversions follow the
//! standard pinhole equations; depth is metric after division by
//! `depth_scale`.

use nalgebra::{Vector2, Vector3};

use crate::geometry::SE3;

/// Pinhole camera intrinsics plus the raw-to-metric depth conversion factor.
#[derive(Debug, Clone)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Raw depth units per metre (e.g. 5000 for TUM RGB-D).
    pub depth_scale: f64,
}

impl CameraModel {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, depth_scale: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            depth_scale,
        }
    }

    /// Back-project a pixel with known depth into the camera frame.
    ///
    /// Depth must be positive; filtering non-positive depth is the caller's
    /// responsibility (see `Frame::find_depth`).
    pub fn pixel_to_camera(&self, pixel: &Vector2<f64>, depth: f64) -> Vector3<f64> {
        Vector3::new(
            (pixel.x - self.cx) * depth / self.fx,
            (pixel.y - self.cy) * depth / self.fy,
            depth,
        )
    }

    /// Project a camera-frame point onto the image plane.
    pub fn camera_to_pixel(&self, p_cam: &Vector3<f64>) -> Vector2<f64> {
        Vector2::new(
            self.fx * p_cam.x / p_cam.z + self.cx,
            self.fy * p_cam.y / p_cam.z + self.cy,
        )
    }

    /// Transform a world point into the camera frame given a world-to-camera
    /// pose.
    pub fn world_to_camera(&self, p_world: &Vector3<f64>, t_cw: &SE3) -> Vector3<f64> {
        t_cw.transform_point(p_world)
    }

    /// Transform a camera-frame point into the world frame.
    pub fn camera_to_world(&self, p_cam: &Vector3<f64>, t_cw: &SE3) -> Vector3<f64> {
        t_cw.inverse().transform_point(p_cam)
    }

    /// Project a world point all the way to pixel coordinates.
    pub fn world_to_pixel(&self, p_world: &Vector3<f64>, t_cw: &SE3) -> Vector2<f64> {
        self.camera_to_pixel(&self.world_to_camera(p_world, t_cw))
    }

    /// Back-project a pixel with known depth into the world frame.
    pub fn pixel_to_world(&self, pixel: &Vector2<f64>, t_cw: &SE3, depth: f64) -> Vector3<f64> {
        self.camera_to_world(&self.pixel_to_camera(pixel, depth), t_cw)
    }
}
