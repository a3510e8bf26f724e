//! RigidTransform: 6-DOF rigid body transformation (rotation + translation).
//!
//! The rotation is stored as a unit quaternion, so the rotation block of
//! [`RigidTransform::to_matrix`] is orthonormal with determinant +1 for every
//! value of this type. Matrices coming from outside (peers) go through
//! [`RigidTransform::try_from_matrix`], which rejects anything with scale,
//! shear, reflection or a projective row.

use std::ops::Mul;

use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, UnitQuaternion, Vector3};

/// Rigid body transform. Transforms points as: p' = R * p + t
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from a rotation matrix and translation.
    ///
    /// Closed-form conversion, exact for half-turns. Callers are expected
    /// to pass a proper rotation; small float noise is absorbed by
    /// renormalizing the quaternion.
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        Self {
            rotation: Unit::new_normalize(q.into_inner()),
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Rotation block as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Homogeneous 4x4 matrix [R | t; 0 0 0 1] (column-vector convention).
    pub fn to_matrix(&self) -> Matrix4<f64> {
        self.rotation.to_homogeneous().append_translation(&self.translation)
    }

    /// Construct from a homogeneous matrix, checking it is rigid.
    ///
    /// Returns `None` when the last row is not (0, 0, 0, 1), when the
    /// rotation block is not orthonormal within `tolerance`, or when its
    /// determinant is negative (reflection).
    pub fn try_from_matrix(mat: &Matrix4<f64>, tolerance: f64) -> Option<Self> {
        if !mat.iter().all(|v| v.is_finite()) {
            return None;
        }

        let bottom = mat.fixed_view::<1, 4>(3, 0);
        let expected_bottom = [0.0, 0.0, 0.0, 1.0];
        if bottom
            .iter()
            .zip(expected_bottom.iter())
            .any(|(a, b)| (a - b).abs() > tolerance)
        {
            return None;
        }

        let r = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let gram = r.transpose() * r;
        if (gram - Matrix3::identity()).abs().max() > tolerance {
            return None;
        }
        if (r.determinant() - 1.0).abs() > tolerance {
            return None;
        }

        let translation = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]);
        Some(Self::from_rt(r, translation))
    }

    /// Inverse transformation: [R^T | -R^T * t].
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Compose two transforms: self ∘ other (apply `other` first).
    pub fn compose(&self, other: &RigidTransform) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a single point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Element-wise comparison of the homogeneous matrices.
    ///
    /// Compares matrices rather than quaternions so that q and -q are equal.
    pub fn approx_eq(&self, other: &RigidTransform, epsilon: f64) -> bool {
        (self.to_matrix() - other.to_matrix()).abs().max() <= epsilon
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

impl Mul<&RigidTransform> for &RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: &RigidTransform) -> RigidTransform {
        self.compose(rhs)
    }
}
