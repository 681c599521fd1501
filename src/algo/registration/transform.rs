//! Rigid transformation type for registration results.

use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

use crate::mesh::MeshSnapshot;

/// A rigid transformation `x ↦ R·x + t`.
///
/// # Example
///
/// ```
/// use tessera::algo::registration::RigidTransform;
/// use nalgebra::{Point3, Vector3};
/// use std::f64::consts::FRAC_PI_2;
///
/// // Rotate 90 degrees about Z, then translate
/// let transform = RigidTransform::from_axis_angle(&Vector3::z(), FRAC_PI_2)
///     .then(&RigidTransform::from_translation(Vector3::new(1.0, 2.0, 3.0)));
///
/// let p = transform.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((p - Point3::new(1.0, 3.0, 3.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation matrix (orthonormal, determinant +1).
    pub rotation: Matrix3<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Creates a transform from a rotation matrix and a translation.
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Creates a transform with only translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(Matrix3::identity(), translation)
    }

    /// Creates a transform with only rotation.
    pub fn from_rotation(rotation: Matrix3<f64>) -> Self {
        Self::new(rotation, Vector3::zeros())
    }

    /// Rotation of `angle` radians about `axis` (normalized internally).
    ///
    /// A zero axis yields the identity.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        match Unit::try_new(*axis, 0.0) {
            Some(axis) => Self::from_rotation(*Rotation3::from_axis_angle(&axis, angle).matrix()),
            None => Self::identity(),
        }
    }

    /// Transforms a 3D point.
    #[inline]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Transforms a direction (rotation only).
    #[inline]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Composes this transform with another (self * other).
    ///
    /// The result applies `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    /// Applies `self` first, then `next`.
    pub fn then(&self, next: &Self) -> Self {
        next.compose(self)
    }

    /// The inverse transform `x ↦ Rᵀ·(x - t)`.
    pub fn inverse(&self) -> Self {
        let rt = self.rotation.transpose();
        Self::new(rt, -(rt * self.translation))
    }

    /// True if `‖t‖ <= eps` and every entry of `R` is within `eps` of the
    /// identity matrix.
    pub fn is_near_identity(&self, eps: f64) -> bool {
        self.translation.norm() <= eps && self.rotation_deviation() <= eps
    }

    /// Largest absolute entry of `R - I`.
    pub fn rotation_deviation(&self) -> f64 {
        (self.rotation - Matrix3::identity()).amax()
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        ((self.rotation.trace() - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
    }

    /// True if all entries are finite.
    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}

impl MeshSnapshot {
    /// A copy of this snapshot with positions and normals moved by `transform`.
    pub fn transformed(&self, transform: &RigidTransform) -> Self {
        self.map_vertices(
            |p| transform.transform_point(p),
            |n| transform.transform_vector(n),
        )
    }
}
