//! SO(3) Lie group utilities used by the SE(3) logarithm and exponential.
//!
//! Provides skew-symmetric matrix construction and the left Jacobian Jl(φ)
//! that couples rotation and translation in the se(3) tangent space.

use nalgebra::{Matrix3, Vector3};

/// Small angle threshold for numerical stability.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-6;

/// Constructs the skew-symmetric matrix [v]× such that [v]× u = v × u.
///
/// ```text
/// [v]× = |  0   -v_z   v_y |
///        |  v_z   0   -v_x |
///        | -v_y  v_x    0  |
/// ```
#[inline]
#[rustfmt::skip]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Computes the left Jacobian Jl(φ) of SO(3).
///
/// ```text
/// Jl(φ) = I + (1 - cos|φ|)/|φ|² [φ]× + (|φ| - sin|φ|)/|φ|³ [φ]×²
/// ```
///
/// For small angles (|φ| < ε):
/// ```text
/// Jl(φ) ≈ I + 0.5 [φ]×
/// ```
pub fn left_jacobian_so3(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();

    if theta < SMALL_ANGLE_THRESHOLD {
        // First-order approximation for small angles
        return Matrix3::identity() + 0.5 * skew(phi);
    }

    let theta_sq = theta * theta;
    let theta_cu = theta_sq * theta;
    let sin_theta = theta.sin();
    let cos_theta = theta.cos();

    let skew_phi = skew(phi);
    let skew_phi_sq = skew_phi * skew_phi;

    // Jl(φ) = I + (1 - cos θ)/θ² [φ]× + (θ - sin θ)/θ³ [φ]×²
    Matrix3::identity()
        + ((1.0 - cos_theta) / theta_sq) * skew_phi
        + ((theta - sin_theta) / theta_cu) * skew_phi_sq
}

/// Computes the inverse of the left Jacobian Jl⁻¹(φ).
///
/// ```text
/// Jl⁻¹(φ) = I - 0.5 [φ]× + (1/|φ|² - (1 + cos|φ|)/(2|φ| sin|φ|)) [φ]×²
/// ```
///
/// For small angles:
/// ```text
/// Jl⁻¹(φ) ≈ I - 0.5 [φ]× + 1/12 [φ]×²
/// ```
pub fn left_jacobian_so3_inv(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();

    if theta < SMALL_ANGLE_THRESHOLD {
        // Second-order approximation for small angles
        let skew_phi = skew(phi);
        return Matrix3::identity() - 0.5 * skew_phi + (1.0 / 12.0) * skew_phi * skew_phi;
    }

    let theta_sq = theta * theta;
    let sin_theta = theta.sin();
    let cos_theta = theta.cos();

    let skew_phi = skew(phi);
    let skew_phi_sq = skew_phi * skew_phi;

    // Coefficient for [φ]×² term
    let coeff = 1.0 / theta_sq - (1.0 + cos_theta) / (2.0 * theta * sin_theta);

    Matrix3::identity() - 0.5 * skew_phi + coeff * skew_phi_sq
}
