//! Discrete differential operators on triangle meshes.
//!
//! All operators are assembled as sparse [`CsrMatrix`] values from a
//! [`MeshSnapshot`] and are immutable once built.
//!
//! | Operator | Shape | Builder |
//! |----------|-------|---------|
//! | Gradient `G` | 3F x V | [`compute_gradient_matrix`] |
//! | Mass `M` | 3F x 3F | [`compute_mass_matrix`] |
//! | Cotangent `GᵀMG` | V x V | [`compute_cotangent_matrix`] |
//! | Graph Laplacian `I - D⁻¹A` | V x V | [`compute_graph_laplacian`] |
//!
//! Rows `3f`, `3f + 1` and `3f + 2` of `G` hold the x, y and z components of
//! the gradient on face `f`.
//!
//! # Example
//!
//! ```
//! use tessera::algo::operators::{compute_gradient_matrix, per_face_gradients};
//! use tessera::mesh::primitives;
//! use nalgebra::DVector;
//!
//! let mesh = primitives::grid(4, 4, 1.0);
//! let g = compute_gradient_matrix(&mesh).unwrap();
//!
//! // f(p) = 2x has gradient (2, 0, 0) on every face of a flat grid
//! let f = DVector::from_iterator(mesh.num_vertices(), mesh.positions().iter().map(|p| 2.0 * p.x));
//! for grad in per_face_gradients(&g, &f) {
//!     assert!((grad.x - 2.0).abs() < 1e-12);
//! }
//! ```

use nalgebra::{DVector, Vector3};

use crate::algo::sparse::CsrMatrix;
use crate::error::{MeshError, Result};
use crate::mesh::{MeshSnapshot, Topology};

/// Faces smaller than this fraction of the squared bounding-box diagonal are
/// treated as zero-area.
const DEGENERATE_AREA_RATIO: f64 = 1e-14;

/// Gradient, mass and cotangent operators of one mesh, plus the cached
/// product `GᵀM` used to form deformation right-hand sides.
#[derive(Debug, Clone)]
pub struct DeformationMatrices {
    /// Per-face gradient operator (3F x V).
    pub gradient: CsrMatrix,
    /// Area-weighted mass matrix (3F x 3F).
    pub mass: CsrMatrix,
    /// Cotangent Laplacian `GᵀMG` (V x V).
    pub cotangent: CsrMatrix,
    /// `GᵀM` (V x 3F).
    pub gtm: CsrMatrix,
}

/// Build the per-face gradient operator `G` (3F x V).
///
/// For face `(v0, v1, v2)` with unit normal `n` and area `A`, the gradient
/// contribution of corner `i` is `n × e_i / (2A)` where `e_i` is the edge
/// opposite the corner, running from `v(i+1)` to `v(i+2)`.
///
/// # Errors
///
/// [`MeshError::EmptyMesh`] without faces, [`MeshError::ZeroAreaFace`] for a
/// degenerate triangle.
pub fn compute_gradient_matrix(mesh: &MeshSnapshot) -> Result<CsrMatrix> {
    check_faces(mesh)?;

    let mut triplets = Vec::with_capacity(9 * mesh.num_faces());
    for (f, face) in mesh.faces().iter().enumerate() {
        let p = mesh.face_positions(f);
        let cross = mesh.face_cross(f);
        let double_area = cross.norm();
        let normal = cross / double_area;

        for (i, &v) in face.iter().enumerate() {
            // Edge opposite to corner i
            let edge = p[(i + 2) % 3] - p[(i + 1) % 3];
            let grad = normal.cross(&edge) / double_area;
            for k in 0..3 {
                triplets.push((3 * f + k, v, grad[k]));
            }
        }
    }

    log::trace!("gradient matrix: {}x{}", 3 * mesh.num_faces(), mesh.num_vertices());
    Ok(CsrMatrix::from_triplets(3 * mesh.num_faces(), mesh.num_vertices(), triplets))
}

/// Build the block-diagonal mass matrix `M` (3F x 3F), `Area(f)·I₃` per face.
pub fn compute_mass_matrix(mesh: &MeshSnapshot) -> Result<CsrMatrix> {
    check_faces(mesh)?;

    let diag: Vec<f64> = (0..mesh.num_faces())
        .flat_map(|f| {
            let area = mesh.face_area(f);
            [area; 3]
        })
        .collect();
    Ok(CsrMatrix::from_diagonal(&diag))
}

/// Build the cotangent Laplacian `GᵀMG` (V x V).
///
/// Symmetric positive semi-definite; constant fields on each connected
/// component lie in its null space.
pub fn compute_cotangent_matrix(mesh: &MeshSnapshot) -> Result<CsrMatrix> {
    Ok(compute_deformation_matrices(mesh)?.cotangent)
}

/// Build `G`, `M`, `GᵀM` and `GᵀMG` together.
pub fn compute_deformation_matrices(mesh: &MeshSnapshot) -> Result<DeformationMatrices> {
    let gradient = compute_gradient_matrix(mesh)?;
    let mass = compute_mass_matrix(mesh)?;
    let gtm = gradient.transpose().matmul(&mass);
    let cotangent = gtm.matmul(&gradient);

    log::trace!(
        "cotangent matrix: {}x{}, nnz {}",
        cotangent.nrows(),
        cotangent.ncols(),
        cotangent.nnz()
    );

    Ok(DeformationMatrices {
        gradient,
        mass,
        cotangent,
        gtm,
    })
}

/// Build the uniform graph Laplacian `L = I - D⁻¹A` (V x V) of a mesh.
///
/// `D` holds vertex degrees and `A` is the adjacency matrix. Rows of isolated
/// vertices are zero, so they stay fixed under smoothing.
pub fn compute_graph_laplacian(mesh: &MeshSnapshot) -> CsrMatrix {
    graph_laplacian(&Topology::from_mesh(mesh))
}

/// Build the uniform graph Laplacian from derived adjacency.
pub fn graph_laplacian(topology: &Topology) -> CsrMatrix {
    let n = topology.num_vertices();
    let mut triplets = Vec::with_capacity(n + 2 * topology.num_edges());
    for v in 0..n {
        let nbrs = topology.neighbors(v);
        if nbrs.is_empty() {
            continue;
        }
        let w = 1.0 / nbrs.len() as f64;
        triplets.push((v, v, 1.0));
        triplets.extend(nbrs.iter().map(|&u| (v, u, -w)));
    }
    CsrMatrix::from_triplets(n, n, triplets)
}

/// Reshape a flattened gradient vector `G·f` (length 3F) into per-face vectors.
pub fn per_face_gradients(gradient: &CsrMatrix, field: &DVector<f64>) -> Vec<Vector3<f64>> {
    let flat = gradient.mul_vec(field);
    flat.as_slice()
        .chunks_exact(3)
        .map(Vector3::from_column_slice)
        .collect()
}

/// Flatten per-face vectors into the 3F layout used by `G` and `M`.
pub fn flatten_gradients(gradients: &[Vector3<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        3 * gradients.len(),
        gradients.iter().flat_map(|g| [g.x, g.y, g.z]),
    )
}

fn check_faces(mesh: &MeshSnapshot) -> Result<()> {
    if mesh.num_faces() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    let diag = mesh.bounding_box_diagonal();
    let min_area = DEGENERATE_AREA_RATIO * diag * diag;
    for f in 0..mesh.num_faces() {
        let area = mesh.face_area(f);
        if !area.is_finite() {
            return Err(MeshError::NonFiniteValue { context: "face area" });
        }
        if area <= min_area {
            return Err(MeshError::ZeroAreaFace { face: f });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Rotation3, Unit};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_unit(rng: &mut StdRng) -> Vector3<f64> {
        loop {
            let v = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if let Some(u) = v.try_normalize(1e-3) {
                return u;
            }
        }
    }

    /// Closed-form gradient of a per-vertex field on face `f`.
    fn face_gradient(mesh: &MeshSnapshot, f: usize, values: &[f64]) -> Vector3<f64> {
        let face = mesh.faces()[f];
        let p = mesh.face_positions(f);
        let n = mesh.face_normal(f);
        let area = mesh.face_area(f);
        (0..3)
            .map(|i| {
                let edge = p[(i + 2) % 3] - p[(i + 1) % 3];
                values[face[i]] * n.cross(&edge) / (2.0 * area)
            })
            .sum()
    }

    #[test]
    fn test_gradient_of_linear_field_under_rotations() {
        let mut rng = StdRng::seed_from_u64(1);
        let base = primitives::ellipsoid(8, 12, [1.5, 1.0, 0.75]);
        let e = Vector3::new(1.0, 0.0, 0.0);

        for _ in 0..100 {
            let axis = Unit::new_normalize(random_unit(&mut rng));
            let rot = Rotation3::from_axis_angle(&axis, rng.gen_range(0.0..std::f64::consts::TAU));
            let mesh = base.map_vertices(|p| rot * p, |n| rot * n);
            let c = rot * e;

            let values: Vec<f64> = mesh.positions().iter().map(|p| c.dot(&p.coords)).collect();
            let g = compute_gradient_matrix(&mesh).unwrap();
            let grads = per_face_gradients(&g, &DVector::from_vec(values.clone()));

            for (f, grad) in grads.iter().enumerate() {
                let expected = face_gradient(&mesh, f, &values);
                assert!((grad - expected).amax() < 1e-3);
                // Linear field: gradient is c projected into the face plane
                let n = mesh.face_normal(f);
                let tangential = c - n * n.dot(&c);
                assert!((grad - tangential).amax() < 1e-9);
            }
        }
    }

    #[test]
    fn test_gradient_of_constant_is_zero() {
        let mesh = primitives::uv_sphere(6, 8, 1.0);
        let g = compute_gradient_matrix(&mesh).unwrap();
        let ones = DVector::from_element(mesh.num_vertices(), 1.0);
        assert!(g.mul_vec(&ones).amax() < 1e-12);
    }

    #[test]
    fn test_cotangent_is_psd_and_symmetric() {
        let mut rng = StdRng::seed_from_u64(2);
        let mesh = primitives::ellipsoid(10, 14, [2.0, 1.0, 0.5]);
        let l = compute_cotangent_matrix(&mesh).unwrap();
        assert!(l.is_symmetric(1e-10));

        for _ in 0..50 {
            let u = DVector::from_fn(mesh.num_vertices(), |_, _| rng.gen_range(-1.0..1.0));
            assert!(l.quadratic_form(&u) >= -1e-9);
        }
        let ones = DVector::from_element(mesh.num_vertices(), 1.0);
        assert!(l.mul_vec(&ones).amax() < 1e-10);
    }

    #[test]
    fn test_cotangent_weights_of_right_triangle() {
        // Right angle at v0; angles at v1 and v2 are 45 degrees (cot = 1)
        let mesh = MeshSnapshot::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let l = compute_cotangent_matrix(&mesh).unwrap();

        // Off-diagonal entry is -cot(opposite angle) / 2
        assert_relative_eq!(l.get(1, 2), 0.0, epsilon = 1e-12);
        assert_relative_eq!(l.get(0, 1), -0.5, epsilon = 1e-12);
        assert_relative_eq!(l.get(0, 2), -0.5, epsilon = 1e-12);
        assert_relative_eq!(l.get(0, 0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mass_matrix_total_area() {
        let mesh = primitives::ellipsoid(7, 9, [1.0, 2.0, 3.0]);
        let m = compute_mass_matrix(&mesh).unwrap();
        assert_eq!(m.nrows(), 3 * mesh.num_faces());
        let total: f64 = m.diagonal().iter().sum::<f64>() / 3.0;
        assert_relative_eq!(total, mesh.total_area(), epsilon = 1e-10);
    }

    #[test]
    fn test_zero_area_face_is_rejected() {
        let mesh = MeshSnapshot::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 3], [0, 1, 2]],
        )
        .unwrap();
        assert!(matches!(
            compute_gradient_matrix(&mesh),
            Err(MeshError::ZeroAreaFace { face: 1 })
        ));
        assert!(matches!(
            compute_mass_matrix(&mesh),
            Err(MeshError::ZeroAreaFace { face: 1 })
        ));
    }

    #[test]
    fn test_graph_laplacian_rows() {
        let mut positions = primitives::tetrahedron().positions().to_vec();
        positions.push(Point3::new(9.0, 9.0, 9.0));
        let faces = primitives::tetrahedron().faces().to_vec();
        let mesh = MeshSnapshot::from_triangles(positions, faces).unwrap();
        let l = compute_graph_laplacian(&mesh);

        for v in 0..4 {
            assert_relative_eq!(l.get(v, v), 1.0);
            assert_relative_eq!(l.row(v).map(|(_, w)| w).sum::<f64>(), 0.0, epsilon = 1e-12);
        }
        // Isolated vertex
        assert_eq!(l.row(4).count(), 0);
    }

    #[test]
    fn test_graph_laplacian_matches_laplace_coordinates() {
        let mesh = primitives::uv_sphere(5, 7, 1.3);
        let topo = Topology::from_mesh(&mesh);
        let l = graph_laplacian(&topo);
        let coords = crate::mesh::laplace_coordinates(&mesh, &topo);
        let xs = DVector::from_iterator(mesh.num_vertices(), mesh.positions().iter().map(|p| p.x));
        let lx = l.mul_vec(&xs);
        for v in 0..mesh.num_vertices() {
            assert_relative_eq!(lx[v], coords[v].x, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_flatten_inverts_per_face_gradients() {
        let mesh = primitives::grid(2, 3, 0.5);
        let g = compute_gradient_matrix(&mesh).unwrap();
        let n = mesh.num_vertices();
        let field = DVector::from_iterator(n, (0..n).map(|i| i as f64));
        let grads = per_face_gradients(&g, &field);
        assert_eq!(grads.len(), mesh.num_faces());
        assert_relative_eq!(flatten_gradients(&grads), g.mul_vec(&field));
    }
}
