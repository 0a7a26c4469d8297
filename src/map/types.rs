//! Core ID types for the map structures.

/// Unique identifier for a Frame.
///
/// FrameIds are assigned sequentially as observations arrive. They serve as
/// lightweight handles for cross-referencing without needing Arc/Rc, which
/// simplifies ownership and avoids cyclic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

impl FrameId {
    /// Create a new FrameId with the given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Unique identifier for a Landmark within the Map.
///
/// LandmarkIds are assigned sequentially when Landmarks are created. A
/// Landmark represents a persistent 3D map point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LandmarkId(pub u64);

impl LandmarkId {
    /// Create a new LandmarkId with the given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}
