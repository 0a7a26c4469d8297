//! Feature extraction behind a capability trait.
//!
//! The tracker only depends on [`FeatureExtractor`]; the ORB implementation
//! on top of OpenCV is the default but any detector/descriptor pair can be
//! substituted (tests use stubs).

use anyhow::Result;
use opencv::core::{KeyPoint, Mat, Ptr, Vector};
use opencv::features2d;
use opencv::prelude::*;

/// A set of features extracted from one image: keypoints and their
/// row-aligned descriptors.
#[derive(Clone)]
pub struct FeatureSet {
    pub keypoints: Vector<KeyPoint>,
    pub descriptors: Mat,
}

/// Keypoint detection and descriptor computation.
///
/// `compute` may prune keypoints (e.g. near image borders); afterwards the
/// descriptor rows are order-aligned with the surviving keypoints.
pub trait FeatureExtractor {
    /// Detect salient keypoints in an image.
    fn detect(&mut self, image: &Mat) -> Result<Vector<KeyPoint>>;

    /// Compute one descriptor row per keypoint, order-aligned.
    fn compute(&mut self, image: &Mat, keypoints: &mut Vector<KeyPoint>) -> Result<Mat>;
}

/// ORB features on top of `opencv::features2d`.
pub struct OrbExtractor {
    orb: Ptr<features2d::ORB>,
}

impl OrbExtractor {
    /// Create an extractor with the given feature budget, pyramid scale
    /// factor, and pyramid level count.
    pub fn new(num_features: i32, scale_factor: f32, level_pyramid: i32) -> Result<Self> {
        let orb = features2d::ORB::create(
            num_features,
            scale_factor,
            level_pyramid,
            31,
            0,
            2,
            features2d::ORB_ScoreType::HARRIS_SCORE,
            31,
            20,
        )?;
        Ok(Self { orb })
    }
}

impl FeatureExtractor for OrbExtractor {
    fn detect(&mut self, image: &Mat) -> Result<Vector<KeyPoint>> {
        let mut keypoints = Vector::<KeyPoint>::new();
        self.orb.detect(image, &mut keypoints, &Mat::default())?;
        Ok(keypoints)
    }

    fn compute(&mut self, image: &Mat, keypoints: &mut Vector<KeyPoint>) -> Result<Mat> {
        let mut descriptors = Mat::default();
        self.orb.compute(image, keypoints, &mut descriptors)?;
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Scalar};

    /// A checkerboard image gives ORB plenty of corners to latch onto.
    fn checkerboard(size: i32, square: i32) -> Mat {
        let mut image =
            Mat::new_rows_cols_with_default(size, size, core::CV_8UC1, Scalar::all(0.0)).unwrap();
        for y in 0..size {
            for x in 0..size {
                if ((x / square) + (y / square)) % 2 == 0 {
                    *image.at_2d_mut::<u8>(y, x).unwrap() = 255;
                }
            }
        }
        image
    }

    #[test]
    fn test_detect_finds_corners() {
        let image = checkerboard(256, 32);
        let mut extractor = OrbExtractor::new(500, 1.2, 8).unwrap();

        let keypoints = extractor.detect(&image).unwrap();
        assert!(!keypoints.is_empty());
    }

    #[test]
    fn test_descriptors_align_with_keypoints() {
        let image = checkerboard(256, 32);
        let mut extractor = OrbExtractor::new(500, 1.2, 8).unwrap();

        let mut keypoints = extractor.detect(&image).unwrap();
        let descriptors = extractor.compute(&image, &mut keypoints).unwrap();

        assert_eq!(descriptors.rows() as usize, keypoints.len());
    }
}
