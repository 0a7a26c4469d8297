//! PnP (Perspective-n-Point) pose solving.
//!
//! The tracker consumes the solver through the [`PoseSolver`] trait so that
//! any robust solver can be substituted without touching the state machine.
//! The default implementation wraps OpenCV's RANSAC PnP.

use anyhow::Result;
use nalgebra::{Matrix3, Vector3};
use opencv::calib3d;
use opencv::core::{Mat, Point2f, Point3d};
use opencv::prelude::*;

use crate::camera::CameraModel;
use crate::geometry::SE3;

/// Outcome of a robust PnP solve.
#[derive(Debug, Clone)]
pub struct PnpSolution {
    /// Relative transform mapping reference-camera coordinates into
    /// current-camera coordinates.
    pub t_cr: SE3,
    /// Number of correspondences the solver judged consistent.
    pub num_inliers: usize,
}

impl PnpSolution {
    /// The result reported for inputs no pose can be estimated from.
    pub fn degenerate() -> Self {
        Self {
            t_cr: SE3::identity(),
            num_inliers: 0,
        }
    }
}

/// Robust solver for 3D-2D pose estimation.
///
/// Implementations must tolerate zero or too-few correspondences by
/// returning a degenerate zero-inlier solution rather than failing hard;
/// `Err` is reserved for fatal conditions (malformed input data).
pub trait PoseSolver {
    /// Solve for the transform from the frame the 3D points are expressed
    /// in to the frame the 2D points were observed in.
    fn solve(
        &self,
        points3d: &[Vector3<f64>],
        points2d: &[Point2f],
        camera: &CameraModel,
    ) -> Result<PnpSolution>;
}

/// RANSAC PnP on top of `opencv::calib3d`.
pub struct PnpRansacSolver {
    iterations: i32,
    reprojection_error: f32,
    confidence: f64,
}

impl Default for PnpRansacSolver {
    fn default() -> Self {
        Self {
            iterations: 100,
            reprojection_error: 4.0,
            confidence: 0.99,
        }
    }
}

impl PoseSolver for PnpRansacSolver {
    fn solve(
        &self,
        points3d: &[Vector3<f64>],
        points2d: &[Point2f],
        camera: &CameraModel,
    ) -> Result<PnpSolution> {
        if points3d.len() < 4 || points3d.len() != points2d.len() {
            return Ok(PnpSolution::degenerate());
        }

        // Convert to Point3d for OpenCV
        let pts3d: Vec<Point3d> = points3d
            .iter()
            .map(|p| Point3d::new(p.x, p.y, p.z))
            .collect();
        let obj_points = Mat::from_slice(&pts3d)?.try_clone()?;
        let img_points = Mat::from_slice(points2d)?.try_clone()?;

        let camera_matrix = Mat::from_slice_2d(&[
            [camera.fx, 0.0, camera.cx],
            [0.0, camera.fy, camera.cy],
            [0.0, 0.0, 1.0],
        ])?
        .try_clone()?;
        let dist_coeffs = Mat::zeros(1, 5, opencv::core::CV_64F)?.to_mat()?;

        let mut rvec = Mat::default();
        let mut tvec = Mat::default();
        let mut inliers = Mat::default();

        let found = calib3d::solve_pnp_ransac(
            &obj_points,
            &img_points,
            &camera_matrix,
            &dist_coeffs,
            &mut rvec,
            &mut tvec,
            false,
            self.iterations,
            self.reprojection_error,
            self.confidence,
            &mut inliers,
            calib3d::SOLVEPNP_ITERATIVE,
        )?;

        if !found {
            return Ok(PnpSolution::degenerate());
        }

        let mut rot_mat = Mat::default();
        calib3d::rodrigues(&rvec, &mut rot_mat, &mut opencv::core::no_array())?;
        let rotation = mat3_to_matrix3(&rot_mat)?;
        let translation = Vector3::new(
            *tvec.at::<f64>(0i32)?,
            *tvec.at::<f64>(1i32)?,
            *tvec.at::<f64>(2i32)?,
        );

        // The 3D input is expressed in the reference camera frame, so the
        // rvec/tvec output already is the reference-to-current transform.
        Ok(PnpSolution {
            t_cr: SE3::from_rt(rotation, translation),
            num_inliers: inliers.rows() as usize,
        })
    }
}

/// Convert OpenCV 3x3 Mat to nalgebra Matrix3.
fn mat3_to_matrix3(mat: &Mat) -> Result<Matrix3<f64>> {
    let mut arr = [0.0f64; 9];
    for (i, v) in arr.iter_mut().enumerate() {
        *v = *mat.at::<f64>(i as i32)?;
    }
    Ok(Matrix3::from_row_slice(&arr))
}
