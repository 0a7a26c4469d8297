//! Configuration for the visual odometry pipeline.
//!
//! All tuning parameters live in explicit structs that are passed into the
//! components that need them; nothing is read from ambient global state.
//! The binary loads a single YAML file (see `config/default.yaml`).

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::camera::CameraModel;

/// Top-level configuration loaded by the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct VoConfig {
    /// Root directory of a TUM RGB-D sequence.
    pub dataset_dir: PathBuf,

    pub camera: CameraConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl VoConfig {
    /// Load the configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open config file {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("malformed config file {}", path.display()))
    }
}

/// Pinhole intrinsics of the RGB-D sensor.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CameraConfig {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Raw depth units per metre.
    pub depth_scale: f64,
}

impl From<CameraConfig> for CameraModel {
    fn from(c: CameraConfig) -> Self {
        CameraModel::new(c.fx, c.fy, c.cx, c.cy, c.depth_scale)
    }
}

/// Tuning parameters of the tracking pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Feature budget handed to the extractor.
    pub num_features: i32,
    /// Pyramid scale factor handed to the extractor.
    pub scale_factor: f32,
    /// Number of pyramid levels handed to the extractor.
    pub level_pyramid: i32,

    /// Multiplier in the match-distance filter.
    pub match_ratio: f32,

    /// Consecutive tracking failures tolerated before giving up.
    pub max_num_lost: u32,

    /// Minimum solver inlier count to accept a pose.
    pub min_inliers: usize,

    /// Rotation magnitude (rad) beyond which a frame becomes a keyframe.
    pub keyframe_min_rotation: f64,
    /// Translation magnitude (m) beyond which a frame becomes a keyframe.
    pub keyframe_min_translation: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            num_features: 500,
            scale_factor: 1.2,
            level_pyramid: 8,
            match_ratio: 2.0,
            max_num_lost: 10,
            min_inliers: 10,
            keyframe_min_rotation: 0.1,
            keyframe_min_translation: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let yaml = r#"
dataset_dir: /data/rgbd_dataset_freiburg1_xyz
camera:
  fx: 517.3
  fy: 516.5
  cx: 325.1
  cy: 249.7
  depth_scale: 5000.0
tracking:
  num_features: 1000
  match_ratio: 2.5
"#;
        let config: VoConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.dataset_dir, PathBuf::from("/data/rgbd_dataset_freiburg1_xyz"));
        assert_eq!(config.camera.fx, 517.3);

        // Overridden fields take the file's value, the rest keep defaults
        assert_eq!(config.tracking.num_features, 1000);
        assert_eq!(config.tracking.match_ratio, 2.5);
        assert_eq!(config.tracking.max_num_lost, 10);
        assert_eq!(config.tracking.min_inliers, 10);
    }

    #[test]
    fn test_tracking_section_is_optional() {
        let yaml = r#"
dataset_dir: /data/seq
camera:
  fx: 500.0
  fy: 500.0
  cx: 320.0
  cy: 240.0
  depth_scale: 5000.0
"#;
        let config: VoConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracking.num_features, 500);
        assert_eq!(config.tracking.keyframe_min_rotation, 0.1);
    }

    #[test]
    fn test_camera_config_converts_to_model() {
        let c = CameraConfig {
            fx: 1.0,
            fy: 2.0,
            cx: 3.0,
            cy: 4.0,
            depth_scale: 5.0,
        };
        let model: CameraModel = c.into();
        assert_eq!(model.fy, 2.0);
        assert_eq!(model.depth_scale, 5.0);
    }
}
