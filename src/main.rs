use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rgbd_vo::camera::CameraModel;
use rgbd_vo::config::VoConfig;
use rgbd_vo::io::tum::TumRgbdDataset;
use rgbd_vo::map::{Frame, FrameId};
use rgbd_vo::tracking::{TrackingState, VisualOdometry};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.yaml".to_string());
    let config = VoConfig::from_file(&config_path)?;

    let dataset = TumRgbdDataset::new(&config.dataset_dir)?;
    info!(
        frames = dataset.len(),
        dataset = %config.dataset_dir.display(),
        "loaded rgb-d sequence"
    );

    let camera = Arc::new(CameraModel::from(config.camera));
    let mut vo = VisualOdometry::new(config.tracking)?;

    for idx in 0..dataset.len() {
        let pair = dataset.frame(idx)?;
        let frame = Frame::new(
            FrameId::new(idx as u64),
            pair.timestamp,
            camera.clone(),
            pair.color,
            pair.depth,
        );

        let tracked = vo.add_frame(frame)?;

        if tracked {
            if let Some(reference) = vo.reference() {
                let center = reference.camera_center();
                info!(
                    frame = %reference.id,
                    x = center.x,
                    y = center.y,
                    z = center.z,
                    "tracked"
                );
            }
        } else if vo.state() == TrackingState::Lost {
            warn!(frame = idx, "tracking lost, stopping");
            break;
        }
    }

    info!(
        keyframes = vo.map().num_keyframes(),
        landmarks = vo.map().num_landmarks(),
        "finished"
    );

    Ok(())
}
