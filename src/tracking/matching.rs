//! Descriptor matching between the reference frame and the current frame.

use anyhow::Result;
use opencv::core::{DMatch, Mat, Vector};
use opencv::features2d::BFMatcher;
use opencv::prelude::*;

/// Fixed floor for the match-distance threshold.
///
/// When the minimum candidate distance is already tiny, a pure ratio
/// threshold would discard nearly everything; the floor keeps the filter
/// two-sided.
pub const MIN_DISTANCE_FLOOR: f32 = 30.0;

/// Candidate correspondence search between two descriptor sets.
pub trait FeatureMatcher {
    /// Match reference descriptors against current descriptors.
    ///
    /// `query_idx` of a returned match indexes the reference set and
    /// `train_idx` the current set.
    fn match_descriptors(&self, reference: &Mat, current: &Mat) -> Result<Vector<DMatch>>;
}

/// Brute-force Hamming matcher for binary descriptors.
pub struct BruteForceMatcher {
    matcher: BFMatcher,
}

impl BruteForceMatcher {
    pub fn new() -> Result<Self> {
        let matcher = BFMatcher::new(opencv::core::NORM_HAMMING, false)?;
        Ok(Self { matcher })
    }
}

impl FeatureMatcher for BruteForceMatcher {
    fn match_descriptors(&self, reference: &Mat, current: &Mat) -> Result<Vector<DMatch>> {
        if reference.rows() == 0 || current.rows() == 0 {
            return Ok(Vector::new());
        }

        let mut matches = Vector::<DMatch>::new();
        self.matcher
            .train_match(reference, current, &mut matches, &Mat::default())?;
        Ok(matches)
    }
}

/// Keep only candidate matches closer than `max(d_min · match_ratio, 30)`,
/// where `d_min` is the minimum candidate distance (0 when there are no
/// candidates).
pub fn filter_matches(candidates: &Vector<DMatch>, match_ratio: f32) -> Vec<DMatch> {
    let min_distance = candidates
        .iter()
        .map(|m| m.distance)
        .fold(f32::INFINITY, f32::min);
    let min_distance = if min_distance.is_finite() {
        min_distance
    } else {
        0.0
    };

    let threshold = (min_distance * match_ratio).max(MIN_DISTANCE_FLOOR);
    candidates
        .iter()
        .filter(|m| m.distance < threshold)
        .collect()
}
