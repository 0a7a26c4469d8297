//! SE(3) rigid-body transforms.
//!
//! Poses are stored as a unit quaternion plus a translation vector. The
//! tangent-space (Lie algebra) vector returned by [`SE3::log`] is ordered
//! translation-first: ξ = [ρ, φ] with ρ the translational block and φ the
//! rotation axis-angle block. Its Euclidean norm is the single scalar used
//! to threshold the magnitude of a 6-DOF motion.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3, Vector6};

use super::so3;

/// A rigid-body transform in SE(3).
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build a transform from a rotation matrix and translation vector.
    ///
    /// The matrix is assumed orthonormal (e.g. the output of a PnP solver).
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        Self {
            rotation,
            translation,
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    /// Compose two transforms: `self ∘ other` applies `other` first.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// The se(3) logarithm ξ = [ρ, φ].
    ///
    /// φ is the rotation axis-angle vector and ρ = Jl⁻¹(φ)·t, so that
    /// `SE3::exp(&pose.log())` reproduces the pose.
    pub fn log(&self) -> Vector6<f64> {
        let phi = self.rotation.scaled_axis();
        let rho = so3::left_jacobian_so3_inv(&phi) * self.translation;

        let mut xi = Vector6::zeros();
        xi.fixed_rows_mut::<3>(0).copy_from(&rho);
        xi.fixed_rows_mut::<3>(3).copy_from(&phi);
        xi
    }

    /// The se(3) exponential, inverse of [`SE3::log`].
    pub fn exp(xi: &Vector6<f64>) -> Self {
        let rho = xi.fixed_rows::<3>(0).into_owned();
        let phi = xi.fixed_rows::<3>(3).into_owned();

        Self {
            rotation: UnitQuaternion::from_scaled_axis(phi),
            translation: so3::left_jacobian_so3(&phi) * rho,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_log_is_zero() {
        let xi = SE3::identity().log();
        assert_relative_eq!(xi.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_translation_log() {
        // With no rotation the tangent vector is the translation itself
        let pose = SE3::new(UnitQuaternion::identity(), Vector3::new(1.0, -2.0, 0.5));
        let xi = pose.log();

        assert_relative_eq!(
            xi.fixed_rows::<3>(0).into_owned(),
            Vector3::new(1.0, -2.0, 0.5),
            epsilon = 1e-12
        );
        assert_relative_eq!(xi.fixed_rows::<3>(3).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_log_roundtrip() {
        let xi = Vector6::new(0.3, -0.1, 0.7, 0.2, -0.4, 0.1);
        let pose = SE3::exp(&xi);
        let xi_back = pose.log();

        assert_relative_eq!(xi, xi_back, epsilon = 1e-9);
    }

    #[test]
    fn test_log_exp_roundtrip() {
        let pose = SE3::new(
            UnitQuaternion::from_scaled_axis(Vector3::new(0.4, 0.1, -0.3)),
            Vector3::new(-0.2, 1.1, 0.6),
        );
        let back = SE3::exp(&pose.log());

        assert_relative_eq!(back.translation, pose.translation, epsilon = 1e-9);
        assert_relative_eq!(
            back.rotation.angle_to(&pose.rotation),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let pose = SE3::new(
            UnitQuaternion::from_scaled_axis(Vector3::new(0.1, 0.2, 0.3)),
            Vector3::new(1.0, 2.0, 3.0),
        );
        let ident = pose.compose(&pose.inverse());

        assert_relative_eq!(ident.translation.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ident.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let a = SE3::new(
            UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.5, 0.0)),
            Vector3::new(1.0, 0.0, 0.0),
        );
        let b = SE3::new(
            UnitQuaternion::from_scaled_axis(Vector3::new(0.3, 0.0, 0.0)),
            Vector3::new(0.0, 2.0, 0.0),
        );
        let p = Vector3::new(0.5, -0.5, 2.0);

        let composed = a.compose(&b).transform_point(&p);
        let sequential = a.transform_point(&b.transform_point(&p));

        assert_relative_eq!(composed, sequential, epsilon = 1e-12);
    }
}
