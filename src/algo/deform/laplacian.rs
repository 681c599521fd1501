//! Laplacian-domain brush.

use nalgebra::{Matrix3, Point3, RowVector3};

use super::{check_positions, positions_matrix, recenter_components, selection_mask, SYSTEM_SHIFT};
use crate::algo::operators::graph_laplacian;
use crate::algo::sparse::{CsrMatrix, SparseCholesky};
use crate::error::{MeshError, Result};
use crate::mesh::{MeshSnapshot, Topology};

/// Deforms a mesh by editing its Laplacian coordinates `δ = L·v`.
///
/// Uses the uniform graph Laplacian. Selection is per vertex; each selected
/// `δᵢ`, as a row vector, is multiplied on the right by the brush matrix and
/// positions are recovered from `LᵀL·v = Lᵀ·δ'`.
#[derive(Debug)]
pub struct LaplacianBrush {
    laplacian: CsrMatrix,
    laplacian_t: CsrMatrix,
    solver: SparseCholesky,
    labels: Vec<usize>,
    num_components: usize,
}

impl LaplacianBrush {
    /// Build the Laplacian of `mesh` and factorize `LᵀL`.
    pub fn new(mesh: &MeshSnapshot) -> Result<Self> {
        if mesh.num_vertices() == 0 {
            return Err(MeshError::EmptyMesh);
        }
        let topology = Topology::from_mesh(mesh);
        let laplacian = graph_laplacian(&topology);
        let laplacian_t = laplacian.transpose();
        let normal = laplacian_t.matmul(&laplacian);
        let solver =
            SparseCholesky::factor_shifted(&normal, SYSTEM_SHIFT, "Laplacian brush system")?;
        let (num_components, labels) = topology.connected_components();

        Ok(Self {
            laplacian,
            laplacian_t,
            solver,
            labels,
            num_components,
        })
    }

    /// The uniform Laplacian the brush edits.
    pub fn laplacian(&self) -> &CsrMatrix {
        &self.laplacian
    }

    /// Transform the Laplacian coordinates of `selected_vertices` by
    /// `transform` (`δ' = δ·T`) and solve for new positions.
    pub fn apply(
        &self,
        positions: &[Point3<f64>],
        selected_vertices: &[usize],
        transform: &Matrix3<f64>,
    ) -> Result<Vec<Point3<f64>>> {
        let n = self.labels.len();
        check_positions(positions, n)?;
        let selected = selection_mask("vertex", selected_vertices, n)?;

        let mut deltas = self.laplacian.mul_dense(&positions_matrix(positions));
        for (i, &is_selected) in selected.iter().enumerate() {
            if is_selected {
                let delta: RowVector3<f64> = deltas.fixed_view::<1, 3>(i, 0).into_owned();
                deltas.fixed_view_mut::<1, 3>(i, 0).copy_from(&(delta * transform));
            }
        }

        let rhs = self.laplacian_t.mul_dense(&deltas);
        let solved = self.solver.solve_dense(&rhs)?;
        Ok(recenter_components(&solved, positions, &self.labels, self.num_components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_round_trip() {
        let mesh = primitives::uv_sphere(8, 12, 1.0);
        let brush = LaplacianBrush::new(&mesh).unwrap();
        let selected: Vec<usize> = (0..mesh.num_vertices()).step_by(2).collect();

        let positions = brush.apply(mesh.positions(), &selected, &Matrix3::identity()).unwrap();
        for (p, q) in positions.iter().zip(mesh.positions()) {
            assert_relative_eq!(*p, *q, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_uniform_scale() {
        let mesh = primitives::ellipsoid(8, 12, [2.0, 1.0, 1.0]);
        let brush = LaplacianBrush::new(&mesh).unwrap();
        let all: Vec<usize> = (0..mesh.num_vertices()).collect();
        let centroid = mesh.centroid().unwrap();

        let positions = brush
            .apply(mesh.positions(), &all, &Matrix3::from_diagonal_element(0.5))
            .unwrap();
        for (p, q) in positions.iter().zip(mesh.positions()) {
            assert_relative_eq!(*p, centroid + 0.5 * (q - centroid), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_local_edit_moves_selection() {
        let mesh = primitives::grid(6, 6, 1.0);
        let brush = LaplacianBrush::new(&mesh).unwrap();
        // Tilt the Laplacian coordinates of the interior centre vertex out of the plane
        let centre = 3 * 7 + 3;
        let tilt = Matrix3::new(1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let flat = mesh.positions();
        let positions = brush.apply(flat, &[centre], &tilt).unwrap();
        assert!(positions
            .iter()
            .zip(flat)
            .all(|(p, q)| (p.x - q.x).abs() < 1e-6 && (p.y - q.y).abs() < 1e-6));

        // Interior deltas of a flat regular grid are zero, so an interior edit has no effect
        assert!(positions.iter().all(|p| p.z.abs() < 1e-6));

        // Corner vertices have non-zero deltas
        let positions = brush.apply(flat, &[0], &tilt).unwrap();
        assert!(positions.iter().any(|p| p.z.abs() > 1e-3));
    }

    #[test]
    fn test_rejects_bad_selection() {
        let mesh = primitives::tetrahedron();
        let brush = LaplacianBrush::new(&mesh).unwrap();
        assert!(matches!(
            brush.apply(mesh.positions(), &[9], &Matrix3::identity()),
            Err(MeshError::IndexOutOfRange { what: "vertex", index: 9, .. })
        ));
    }
}
