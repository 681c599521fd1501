//! Gradient- and Laplacian-domain mesh deformation.
//!
//! The brushes edit a differential representation of the surface and solve
//! back to vertex positions:
//!
//! - [`GradientBrush`]: transforms per-face gradients of the coordinate
//!   functions and solves `GᵀMG·v = GᵀM·g'`.
//! - [`LaplacianBrush`]: transforms per-vertex Laplacian coordinates and solves
//!   `LᵀL·v = Lᵀ·δ'`.
//! - [`bump_brush`]: a gradient brush that tilts faces around a centre vertex.
//! - [`constrained_deform`]: least-squares deformation pinning handle vertices
//!   to target positions.
//!
//! Both brush systems are singular along constant fields, so they are factored
//! with a tiny diagonal shift and every connected component is moved back to
//! its original centroid after the solve. Edits therefore never translate the
//! mesh.
//!
//! # Example
//!
//! ```
//! use tessera::algo::deform::{scale_rotate_matrix, GradientBrush};
//! use tessera::mesh::primitives;
//!
//! let mesh = primitives::uv_sphere(8, 12, 1.0);
//! let brush = GradientBrush::new(&mesh).unwrap();
//!
//! // Stretch the first ten faces along X
//! let faces: Vec<usize> = (0..10).collect();
//! let transform = scale_rotate_matrix([1.5, 1.0, 1.0], [0.0, 0.0, 0.0]);
//! let positions = brush.apply(mesh.positions(), &faces, &transform).unwrap();
//! assert_eq!(positions.len(), mesh.num_vertices());
//! ```

mod bump;
mod cache;
mod constrained;
mod gradient;
mod laplacian;

pub use bump::{bump_brush, bump_brush_with, BumpBrushOptions};
pub use cache::MatrixCache;
pub use constrained::{constrained_deform, ConstrainedDeformOptions};
pub use gradient::{scale_rotate_matrix, GradientBrush, GradientSystem};
pub use laplacian::LaplacianBrush;

use nalgebra::{DMatrix, Point3};

use crate::error::{check_index, MeshError, Result};

/// Relative diagonal shift for the brush systems.
const SYSTEM_SHIFT: f64 = 1e-10;

/// Vertex positions as a V x 3 matrix.
fn positions_matrix(positions: &[Point3<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(positions.len(), 3, |i, k| positions[i][k])
}

/// Rows of a V x 3 matrix as points.
fn matrix_positions(m: &DMatrix<f64>) -> Vec<Point3<f64>> {
    (0..m.nrows())
        .map(|i| Point3::new(m[(i, 0)], m[(i, 1)], m[(i, 2)]))
        .collect()
}

/// Fails unless `positions` has one entry per vertex.
fn check_positions(positions: &[Point3<f64>], num_vertices: usize) -> Result<()> {
    if positions.len() == num_vertices {
        Ok(())
    } else {
        Err(MeshError::SizeMismatch {
            what: "vertex positions",
            expected: num_vertices,
            actual: positions.len(),
        })
    }
}

/// Membership mask for `indices`, validated against `len`.
fn selection_mask(what: &'static str, indices: &[usize], len: usize) -> Result<Vec<bool>> {
    let mut mask = vec![false; len];
    for &i in indices {
        check_index(what, i, len)?;
        mask[i] = true;
    }
    Ok(mask)
}

/// Solved positions shifted so every connected component keeps the centroid
/// it had in `original`.
fn recenter_components(
    solved: &DMatrix<f64>,
    original: &[Point3<f64>],
    labels: &[usize],
    num_components: usize,
) -> Vec<Point3<f64>> {
    let mut positions = matrix_positions(solved);

    let mut shift = vec![nalgebra::Vector3::zeros(); num_components];
    let mut counts = vec![0usize; num_components];
    for ((new, old), &c) in positions.iter().zip(original).zip(labels) {
        shift[c] += old - new;
        counts[c] += 1;
    }
    for (s, &count) in shift.iter_mut().zip(&counts) {
        if count > 0 {
            *s /= count as f64;
        }
    }

    for (p, &c) in positions.iter_mut().zip(labels) {
        *p += shift[c];
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recenter_components_per_label() {
        let original = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
        ];
        let solved = DMatrix::from_row_slice(3, 3, &[5.0, 1.0, 0.0, 7.0, 1.0, 0.0, 0.0, 0.0, 3.0]);
        let positions = recenter_components(&solved, &original, &[0, 0, 1], 2);

        assert_eq!(positions[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(positions[1], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(positions[2], Point3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_selection_mask() {
        assert_eq!(selection_mask("face", &[2, 0, 2], 3).unwrap(), vec![true, false, true]);
        assert!(matches!(
            selection_mask("face", &[3], 3),
            Err(MeshError::IndexOutOfRange { what: "face", index: 3, len: 3 })
        ));
    }
}
