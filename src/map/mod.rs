//! Sparse map: frames, landmarks, and their container.

pub mod frame;
pub mod landmark;
pub mod map;
pub mod types;

pub use frame::Frame;
pub use landmark::Landmark;
pub use map::Map;
pub use types::{FrameId, LandmarkId};
