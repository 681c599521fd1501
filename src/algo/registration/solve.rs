//! Optimal rigid transforms for matched point pairs.

use nalgebra::{Matrix3, Matrix6, Point3, Vector3, Vector6};

use super::{PointPair, RigidTransform};
use crate::error::{MeshError, Result};

/// Eigenvalue ratio below which the point-to-plane system counts as singular.
const PLANE_SYSTEM_RCOND: f64 = 1e-12;

/// Weighted point-to-point alignment (Kabsch).
///
/// Minimizes `Σ wᵢ ‖R·pᵢ + t - qᵢ‖²` over rotations `R` and translations `t`.
///
/// # Errors
///
/// [`MeshError::NoValidPointPairs`] if there are no pairs or the weights do
/// not sum to a positive value.
pub fn point_to_point(pairs: &[PointPair], weights: &[f64]) -> Result<RigidTransform> {
    if weights.len() != pairs.len() {
        return Err(MeshError::SizeMismatch {
            what: "pair weights",
            expected: pairs.len(),
            actual: weights.len(),
        });
    }
    let total: f64 = weights.iter().sum();
    if pairs.is_empty() || !(total > 0.0) {
        return Err(MeshError::NoValidPointPairs);
    }

    // Weighted centroids
    let weighted_mean = |select: fn(&PointPair) -> Point3<f64>| {
        pairs
            .iter()
            .zip(weights)
            .map(|(p, &w)| select(p).coords * w)
            .sum::<Vector3<f64>>()
            / total
    };
    let source_centroid = weighted_mean(|p| p.source.position);
    let target_centroid = weighted_mean(|p| p.target.position);

    // Weighted covariance H = Σ wᵢ (pᵢ - c_p)(qᵢ - c_q)ᵀ
    let mut h = Matrix3::zeros();
    for (pair, &w) in pairs.iter().zip(weights) {
        let s = pair.source.position.coords - source_centroid;
        let t = pair.target.position.coords - target_centroid;
        h += w * s * t.transpose();
    }

    let rotation = proper_rotation(&h)?;
    let translation = target_centroid - rotation * source_centroid;
    Ok(RigidTransform::new(rotation, translation))
}

/// Linearized point-to-plane alignment.
///
/// Minimizes `Σ ((R·pᵢ + t - qᵢ)·nᵢ)²` for small rotations, with `nᵢ` the
/// target normals, by solving the 6x6 normal equations for a rotation vector
/// and translation. The rotation is projected back onto SO(3).
///
/// # Errors
///
/// [`MeshError::NoValidPointPairs`] without pairs, [`MeshError::SingularSystem`]
/// if the pairs do not constrain all six degrees of freedom (e.g. a plane).
pub fn point_to_plane(pairs: &[PointPair]) -> Result<RigidTransform> {
    if pairs.is_empty() {
        return Err(MeshError::NoValidPointPairs);
    }

    let mut a = Matrix6::zeros();
    let mut b = Vector6::zeros();
    for pair in pairs {
        let p = pair.source.position.coords;
        let q = pair.target.position.coords;
        let n = pair.target.normal;
        let pn = p.cross(&n);
        let row = Vector6::new(pn.x, pn.y, pn.z, n.x, n.y, n.z);
        let c = (p - q).dot(&n);
        a += row * row.transpose();
        b += c * row;
    }

    let eigenvalues = a.symmetric_eigenvalues();
    let (min, max) = eigenvalues
        .iter()
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), &e| (lo.min(e), hi.max(e.abs())));
    if !(max > 0.0) || min <= PLANE_SYSTEM_RCOND * max {
        return Err(MeshError::SingularSystem {
            context: "point-to-plane normal equations",
        });
    }

    let x = a.lu().solve(&-b).ok_or(MeshError::SingularSystem {
        context: "point-to-plane normal equations",
    })?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(MeshError::NonFiniteValue {
            context: "point-to-plane solution",
        });
    }

    let (alpha, beta, gamma) = (x[0], x[1], x[2]);
    #[rustfmt::skip]
    let linearized = Matrix3::new(
        1.0,    -gamma, beta,
        gamma,  1.0,    -alpha,
        -beta,  alpha,  1.0,
    );
    let rotation = nearest_rotation(&linearized)?;
    Ok(RigidTransform::new(rotation, Vector3::new(x[3], x[4], x[5])))
}

/// Rotation `R = V·diag(1, 1, det(VUᵀ))·Uᵀ` from the SVD `H = UΣVᵀ` of a
/// cross-covariance matrix.
fn proper_rotation(h: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let svd = h.svd(true, true);
    let u = svd.u.ok_or(MeshError::SingularSystem { context: "covariance SVD" })?;
    let v_t = svd.v_t.ok_or(MeshError::SingularSystem { context: "covariance SVD" })?;
    let v = v_t.transpose();

    // Handle reflection case (det = -1)
    let correction = reflection_fix((v * u.transpose()).determinant());
    Ok(v * correction * u.transpose())
}

/// Closest rotation to `m` in the Frobenius norm: `U·diag(1, 1, det(UVᵀ))·Vᵀ`.
fn nearest_rotation(m: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u.ok_or(MeshError::SingularSystem { context: "rotation SVD" })?;
    let v_t = svd.v_t.ok_or(MeshError::SingularSystem { context: "rotation SVD" })?;

    let correction = reflection_fix((u * v_t).determinant());
    Ok(u * correction * v_t)
}

fn reflection_fix(det: f64) -> Matrix3<f64> {
    let d = if det < 0.0 { -1.0 } else { 1.0 };
    Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d))
}
