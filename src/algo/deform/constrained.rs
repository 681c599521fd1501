//! Least-squares deformation with positional handles.

use nalgebra::{DMatrix, DVector, Point3};

use super::positions_matrix;
use crate::algo::operators::graph_laplacian;
use crate::algo::sparse::{CsrMatrix, SparseCholesky};
use crate::error::{check_index, MeshError, Result};
use crate::mesh::{MeshSnapshot, Topology};

/// Options for [`constrained_deform`].
#[derive(Debug, Clone)]
pub struct ConstrainedDeformOptions {
    /// Weight `λ` of the handle constraints against shape preservation.
    pub weight: f64,

    /// Add a soft constraint keeping the vertex centroid in place.
    pub preserve_centroid: bool,

    /// Which coordinates are solved for; the others keep their input values.
    pub axes: [bool; 3],
}

impl Default for ConstrainedDeformOptions {
    fn default() -> Self {
        Self {
            weight: 0.9,
            preserve_centroid: true,
            axes: [true; 3],
        }
    }
}

impl ConstrainedDeformOptions {
    /// Set the constraint weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set whether the centroid is preserved.
    pub fn with_preserve_centroid(mut self, preserve_centroid: bool) -> Self {
        self.preserve_centroid = preserve_centroid;
        self
    }

    /// Set the solved coordinates.
    pub fn with_axes(mut self, axes: [bool; 3]) -> Self {
        self.axes = axes;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(MeshError::invalid_param(
                "weight",
                self.weight,
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Move `handles` toward their target positions while preserving the
/// Laplacian coordinates of the mesh.
///
/// Minimizes `‖L·v - L·v₀‖² + λ‖C·v - d‖²` per solved axis, where `C` selects
/// the handle vertices and, with `preserve_centroid`, appends the row
/// `(1/n, …, 1/n)` with target `mean(v₀)`. The normal equations
/// `(LᵀL + λCᵀC)·v = LᵀL·v₀ + λCᵀd` are factorized once for all axes; the
/// dense centroid row is folded in as a rank-one update.
///
/// Without handles the input positions are returned.
///
/// # Errors
///
/// [`MeshError::IndexOutOfRange`] for a bad handle index,
/// [`MeshError::SingularSystem`] if some connected component has no handle.
pub fn constrained_deform(
    mesh: &MeshSnapshot,
    handles: &[(usize, Point3<f64>)],
    options: &ConstrainedDeformOptions,
) -> Result<Vec<Point3<f64>>> {
    options.validate()?;
    let n = mesh.num_vertices();
    for &(v, target) in handles {
        check_index("handle vertex", v, n)?;
        if !target.coords.iter().all(|c| c.is_finite()) {
            return Err(MeshError::NonFiniteValue {
                context: "handle target",
            });
        }
    }
    if handles.is_empty() {
        return Ok(mesh.positions().to_vec());
    }

    let topology = Topology::from_mesh(mesh);
    let (num_components, labels) = topology.connected_components();
    let mut anchored = vec![false; num_components];
    for &(v, _) in handles {
        anchored[labels[v]] = true;
    }
    if anchored.contains(&false) {
        return Err(MeshError::SingularSystem {
            context: "constrained deformation with an unanchored component",
        });
    }

    let lambda = options.weight;
    let laplacian = graph_laplacian(&topology);
    let normal = laplacian.transpose().matmul(&laplacian);
    let handle_diag =
        CsrMatrix::from_triplets(n, n, handles.iter().map(|&(v, _)| (v, v, 1.0)).collect());
    let system = normal.add_scaled(lambda, &handle_diag);
    let solver = SparseCholesky::factor(&system, "constrained deformation")?;

    let original = positions_matrix(mesh.positions());
    let mut rhs = normal.mul_dense(&original);
    for &(v, target) in handles {
        for k in 0..3 {
            rhs[(v, k)] += lambda * target[k];
        }
    }

    let solved = if options.preserve_centroid {
        // (K + λccᵀ)⁻¹ by Sherman-Morrison with c = 1/n
        let c = DVector::from_element(n, 1.0 / n as f64);
        let means = original.row_mean();
        for k in 0..3 {
            rhs.column_mut(k).axpy(lambda * means[k], &c, 1.0);
        }
        let x = solver.solve_dense(&rhs)?;
        let y = solver.solve(&c)?;
        let denominator = 1.0 + lambda * c.dot(&y);
        let mut corrected = x.clone();
        for k in 0..3 {
            let s = lambda * c.dot(&x.column(k)) / denominator;
            corrected.column_mut(k).axpy(-s, &y, 1.0);
        }
        corrected
    } else {
        solver.solve_dense(&rhs)?
    };

    let result: DMatrix<f64> = DMatrix::from_fn(n, 3, |i, k| {
        if options.axes[k] {
            solved[(i, k)]
        } else {
            original[(i, k)]
        }
    });
    Ok((0..n)
        .map(|i| Point3::new(result[(i, 0)], result[(i, 1)], result[(i, 2)]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_handles_at_rest_change_nothing() {
        let mesh = primitives::uv_sphere(6, 10, 1.0);
        let handles = [(0, *mesh.position(0)), (7, *mesh.position(7))];
        let options = ConstrainedDeformOptions::default();
        let positions = constrained_deform(&mesh, &handles, &options).unwrap();
        for (p, q) in positions.iter().zip(mesh.positions()) {
            assert_relative_eq!(*p, *q, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_translating_every_handle_translates_mesh() {
        let mesh = primitives::grid(5, 5, 1.0);
        let offset = Vector3::new(0.5, -1.0, 2.0);
        let handles: Vec<_> = [0, 5, 30, 35]
            .iter()
            .map(|&v| (v, mesh.position(v) + offset))
            .collect();
        let options = ConstrainedDeformOptions::default().with_preserve_centroid(false);

        let positions = constrained_deform(&mesh, &handles, &options).unwrap();
        for (p, q) in positions.iter().zip(mesh.positions()) {
            assert_relative_eq!(*p, q + offset, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_pulling_a_handle() {
        let mesh = primitives::grid(6, 6, 1.0);
        let corner = 0;
        let far = 48;
        let pulled = mesh.position(corner) + Vector3::new(0.0, 0.0, 1.0);
        let handles = [(corner, pulled), (far, *mesh.position(far))];
        let options = ConstrainedDeformOptions::default().with_preserve_centroid(false);

        let positions = constrained_deform(&mesh, &handles, &options).unwrap();
        assert!(positions[corner].z > 0.1 && positions[corner].z <= 1.0 + 1e-9);
        assert!(positions[far].z.abs() < positions[corner].z);
    }

    #[test]
    fn test_axes_mask() {
        let mesh = primitives::grid(4, 4, 1.0);
        let handles = [(0, Point3::new(-1.0, -1.0, 1.0)), (24, Point3::new(5.0, 5.0, 0.0))];
        let options = ConstrainedDeformOptions::default().with_axes([false, false, true]);

        let positions = constrained_deform(&mesh, &handles, &options).unwrap();
        for (p, q) in positions.iter().zip(mesh.positions()) {
            assert_eq!(p.x, q.x);
            assert_eq!(p.y, q.y);
        }
        assert!(positions[0].z > 0.0);
    }

    #[test]
    fn test_centroid_is_held() {
        let mesh = primitives::grid(6, 6, 1.0);
        let handles = [(0, Point3::new(0.0, 0.0, 3.0))];
        let loose = constrained_deform(
            &mesh,
            &handles,
            &ConstrainedDeformOptions::default().with_preserve_centroid(false),
        )
        .unwrap();
        let held =
            constrained_deform(&mesh, &handles, &ConstrainedDeformOptions::default()).unwrap();

        let mean_z = |ps: &[Point3<f64>]| ps.iter().map(|p| p.z).sum::<f64>() / ps.len() as f64;
        assert!(mean_z(&held).abs() < mean_z(&loose).abs());
    }

    #[test]
    fn test_errors() {
        let mesh = primitives::tetrahedron();
        let options = ConstrainedDeformOptions::default();
        assert!(matches!(
            constrained_deform(&mesh, &[(4, Point3::origin())], &options),
            Err(MeshError::IndexOutOfRange { what: "handle vertex", .. })
        ));
        assert!(matches!(
            constrained_deform(&mesh, &[(0, Point3::origin())], &options.clone().with_weight(0.0)),
            Err(MeshError::InvalidParameter { name: "weight", .. })
        ));

        // Two disjoint triangles, only one anchored
        let two = MeshSnapshot::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(5.0, 0.0, 0.0),
                Point3::new(6.0, 0.0, 0.0),
                Point3::new(5.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        )
        .unwrap();
        assert!(matches!(
            constrained_deform(&two, &[(0, Point3::origin())], &options),
            Err(MeshError::SingularSystem { .. })
        ));
    }

    #[test]
    fn test_no_handles_returns_input() {
        let mesh = primitives::cube(1.0);
        let options = ConstrainedDeformOptions::default();
        let positions = constrained_deform(&mesh, &[], &options).unwrap();
        assert_eq!(positions, mesh.positions());
    }
}
