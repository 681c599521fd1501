//! Gradient-domain brush.

use std::hash::Hash;
use std::sync::Arc;

use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

use super::{
    check_positions, positions_matrix, recenter_components, selection_mask, MatrixCache,
    SYSTEM_SHIFT,
};
use crate::algo::operators::{compute_deformation_matrices, DeformationMatrices};
use crate::algo::sparse::SparseCholesky;
use crate::error::Result;
use crate::mesh::{MeshSnapshot, Topology};

/// The prefactorized gradient-domain system of one mesh.
///
/// Building one is the expensive part of a brush stroke; it depends only on
/// the mesh the operators were assembled from, so it can be shared across
/// strokes through a [`MatrixCache`].
#[derive(Debug)]
pub struct GradientSystem {
    matrices: DeformationMatrices,
    solver: SparseCholesky,
    labels: Vec<usize>,
    num_components: usize,
}

impl GradientSystem {
    /// Assemble `G`, `M`, `GᵀM` and factorize `GᵀMG`.
    pub fn new(mesh: &MeshSnapshot) -> Result<Self> {
        let matrices = compute_deformation_matrices(mesh)?;
        let solver = SparseCholesky::factor_shifted(
            &matrices.cotangent,
            SYSTEM_SHIFT,
            "gradient-domain system",
        )?;
        let (num_components, labels) = Topology::from_mesh(mesh).connected_components();
        Ok(Self {
            matrices,
            solver,
            labels,
            num_components,
        })
    }

    /// The assembled operators.
    pub fn matrices(&self) -> &DeformationMatrices {
        &self.matrices
    }

    /// Number of mesh vertices.
    pub fn num_vertices(&self) -> usize {
        self.labels.len()
    }

    /// Number of mesh faces.
    pub fn num_faces(&self) -> usize {
        self.matrices.gradient.nrows() / 3
    }
}

/// Build a brush matrix: rotation by XYZ Euler angles (degrees, extrinsic)
/// applied after a per-axis scale.
pub fn scale_rotate_matrix(scale: [f64; 3], euler_degrees: [f64; 3]) -> Matrix3<f64> {
    let [rx, ry, rz] = euler_degrees.map(f64::to_radians);
    let rotation = Rotation3::from_euler_angles(rx, ry, rz);
    rotation.matrix() * Matrix3::from_diagonal(&Vector3::from(scale))
}

/// Deforms a mesh by editing the gradients of its coordinate functions.
///
/// On each face the gradients of x, y and z form the rows of a 3x3 matrix
/// `J`. An edit replaces `J` on some faces and the positions are recovered in
/// the least-squares sense from the edited field.
#[derive(Debug, Clone)]
pub struct GradientBrush {
    system: Arc<GradientSystem>,
}

impl GradientBrush {
    /// Build and factorize the system for `mesh`.
    pub fn new(mesh: &MeshSnapshot) -> Result<Self> {
        Ok(Self {
            system: Arc::new(GradientSystem::new(mesh)?),
        })
    }

    /// Reuse the system cached under `key`, building it on a miss.
    pub fn from_cache<K: Eq + Hash>(
        cache: &mut MatrixCache<K>,
        key: K,
        mesh: &MeshSnapshot,
    ) -> Result<Self> {
        Ok(Self {
            system: cache.get_or_build(key, mesh)?,
        })
    }

    /// The underlying system.
    pub fn system(&self) -> &GradientSystem {
        &self.system
    }

    /// Multiply the gradients of `selected_faces` on the right by `transform`
    /// (`g' = g·T`) and solve for new positions.
    ///
    /// `positions` are the current positions of the mesh the brush was built
    /// for. Repeated face indices are applied once.
    ///
    /// # Errors
    ///
    /// [`MeshError::SizeMismatch`](crate::error::MeshError::SizeMismatch) for
    /// a wrong position count,
    /// [`MeshError::IndexOutOfRange`](crate::error::MeshError::IndexOutOfRange)
    /// for a bad face index.
    pub fn apply(
        &self,
        positions: &[Point3<f64>],
        selected_faces: &[usize],
        transform: &Matrix3<f64>,
    ) -> Result<Vec<Point3<f64>>> {
        let selected = selection_mask("face", selected_faces, self.system.num_faces())?;
        self.apply_with(positions, |f, jacobian| {
            if selected[f] {
                jacobian * transform
            } else {
                jacobian
            }
        })
    }

    /// Replace every face's gradient matrix `J` (rows: gradients of x, y, z)
    /// with `edit(face, J)` and solve for new positions.
    pub fn apply_with<F>(&self, positions: &[Point3<f64>], mut edit: F) -> Result<Vec<Point3<f64>>>
    where
        F: FnMut(usize, Matrix3<f64>) -> Matrix3<f64>,
    {
        let system = &*self.system;
        check_positions(positions, system.num_vertices())?;

        // Row 3f + k, column a: component k of the gradient of coordinate a on face f
        let mut gradients = system.matrices.gradient.mul_dense(&positions_matrix(positions));
        for f in 0..system.num_faces() {
            let jacobian = Matrix3::from_fn(|a, k| gradients[(3 * f + k, a)]);
            let edited = edit(f, jacobian);
            for a in 0..3 {
                for k in 0..3 {
                    gradients[(3 * f + k, a)] = edited[(a, k)];
                }
            }
        }

        let rhs = system.matrices.gtm.mul_dense(&gradients);
        let solved = system.solver.solve_dense(&rhs)?;
        Ok(recenter_components(&solved, positions, &system.labels, system.num_components))
    }
}
