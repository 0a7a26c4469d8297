//! Geometry utilities: SO(3)/SE(3) Lie group operations, PnP solving.

pub mod pnp;
pub mod se3;
pub mod so3;

pub use pnp::{PnpRansacSolver, PnpSolution, PoseSolver};
pub use se3::SE3;
