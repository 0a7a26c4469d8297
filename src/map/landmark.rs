//! Landmark - a persistent 3D map point.

use nalgebra::Vector3;
use opencv::core::Mat;

use super::types::LandmarkId;

/// A 3D landmark retained in the map for future matching.
///
/// Landmarks carry a representative descriptor and observation statistics
/// used for quality book-keeping by later tracking iterations.
#[derive(Clone)]
pub struct Landmark {
    /// Unique identifier for this Landmark.
    pub id: LandmarkId,

    /// 3D position in world frame.
    pub position: Vector3<f64>,

    /// Unit viewing direction from the observing camera towards the point.
    pub normal: Vector3<f64>,

    /// Representative ORB descriptor (a cloned Mat row, not a row view).
    pub descriptor: Mat,

    /// Number of times this point was observed by a frame.
    pub observed_count: u32,

    /// Number of times an observation was judged consistent.
    pub matched_count: u32,
}

impl Landmark {
    pub fn new(id: LandmarkId, position: Vector3<f64>, normal: Vector3<f64>, descriptor: Mat) -> Self {
        Self {
            id,
            position,
            normal,
            descriptor,
            observed_count: 0,
            matched_count: 0,
        }
    }

    /// Increment the observation count (point was seen by a frame).
    pub fn increase_observed(&mut self) {
        self.observed_count += 1;
    }

    /// Increment the match count (observation was judged consistent).
    pub fn increase_matched(&mut self) {
        self.matched_count += 1;
    }

    /// Compute the matched ratio: matched_count / observed_count.
    ///
    /// Returns 1.0 when the point has never been observed, so fresh points
    /// are not penalized.
    pub fn matched_ratio(&self) -> f64 {
        if self.observed_count == 0 {
            1.0
        } else {
            self.matched_count as f64 / self.observed_count as f64
        }
    }
}

impl std::fmt::Debug for Landmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Landmark")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("observed_count", &self.observed_count)
            .field("matched_count", &self.matched_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_landmark() -> Landmark {
        Landmark::new(
            LandmarkId::new(1),
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.0, 0.0, 1.0),
            Mat::default(),
        )
    }

    #[test]
    fn test_counters_increment() {
        let mut lm = test_landmark();

        lm.increase_observed();
        lm.increase_observed();
        lm.increase_matched();

        assert_eq!(lm.observed_count, 2);
        assert_eq!(lm.matched_count, 1);
    }

    #[test]
    fn test_matched_ratio() {
        let mut lm = test_landmark();

        // Never observed - should return 1.0
        assert_eq!(lm.matched_ratio(), 1.0);

        lm.observed_count = 4;
        lm.matched_count = 3;
        assert!((lm.matched_ratio() - 0.75).abs() < 1e-12);
    }
}
