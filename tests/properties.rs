//! Property-based tests for the operators and search structures.
//!
//! Run with: cargo test --test properties

use nalgebra::{DVector, Point3, Vector3};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera::algo::operators::{compute_deformation_matrices, compute_mass_matrix};
use tessera::algo::registration::RigidTransform;
use tessera::algo::smooth::{smooth, SmoothOptions, SmoothingMethod};
use tessera::mesh::{primitives, MeshSnapshot};
use tessera::spatial::KdTree;

// =============================================================================
// Strategies
// =============================================================================

/// An ellipsoid with random radii whose vertices are pushed radially by up to 10%.
fn arb_bumpy_ellipsoid() -> impl Strategy<Value = MeshSnapshot> {
    (prop::array::uniform3(0.5..3.0f64), any::<u64>()).prop_map(|(radii, seed)| {
        let mesh = primitives::ellipsoid(6, 10, radii);
        let mut rng = StdRng::seed_from_u64(seed);
        let positions = mesh
            .positions()
            .iter()
            .map(|p| p * (1.0 + rng.gen_range(-0.1..0.1)))
            .collect();
        mesh.with_positions(positions).unwrap()
    })
}

fn arb_point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-10.0..10.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

// =============================================================================
// Operators
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cotangent_matrix_is_positive_semidefinite(
        mesh in arb_bumpy_ellipsoid(),
        seed in any::<u64>(),
    ) {
        let matrices = compute_deformation_matrices(&mesh).unwrap();
        prop_assert!(matrices.cotangent.is_symmetric(1e-9));

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..5 {
            let u = DVector::from_fn(mesh.num_vertices(), |_, _| rng.gen_range(-1.0..1.0));
            prop_assert!(matrices.cotangent.quadratic_form(&u) >= -1e-9);
        }
    }

    #[test]
    fn mass_matrix_sums_to_area(mesh in arb_bumpy_ellipsoid()) {
        let mass = compute_mass_matrix(&mesh).unwrap();
        let total: f64 = mass.diagonal().iter().sum::<f64>() / 3.0;
        prop_assert!((total - mesh.total_area()).abs() <= 1e-9 * mesh.total_area());
    }

    #[test]
    fn gradient_of_constant_vanishes(mesh in arb_bumpy_ellipsoid(), c in -5.0..5.0f64) {
        let matrices = compute_deformation_matrices(&mesh).unwrap();
        let field = DVector::from_element(mesh.num_vertices(), c);
        let grads = matrices.gradient.mul_vec(&field);
        prop_assert!(grads.amax() < 1e-9);
    }

    #[test]
    fn smoothing_with_zero_step_is_identity(
        mesh in arb_bumpy_ellipsoid(),
        iterations in 0usize..5,
    ) {
        for method in [SmoothingMethod::IteratedAveraging, SmoothingMethod::ImplicitEuler] {
            let options = SmoothOptions::default()
                .with_method(method)
                .with_iterations(iterations)
                .with_step_size(0.0);
            prop_assert_eq!(smooth(&mesh, &options).unwrap(), mesh.positions().to_vec());
        }
    }
}

// =============================================================================
// Search and transforms
// =============================================================================

proptest! {
    #[test]
    fn kdtree_matches_brute_force(
        points in prop::collection::vec(arb_point(), 1..300),
        queries in prop::collection::vec(arb_point(), 1..20),
    ) {
        let tree = KdTree::euclidean3(points.clone());
        for q in &queries {
            let (_, found) = tree.nearest(q).unwrap();
            let brute = points.iter().map(|p| (p - q).norm()).fold(f64::INFINITY, f64::min);
            prop_assert_eq!(found, brute);
        }
    }

    #[test]
    fn rigid_transform_inverse_round_trips(
        axis in prop::array::uniform3(-1.0..1.0f64),
        angle in -3.0..3.0f64,
        t in prop::array::uniform3(-10.0..10.0f64),
        p in arb_point(),
    ) {
        let transform = RigidTransform::from_axis_angle(&Vector3::from(axis), angle)
            .then(&RigidTransform::from_translation(Vector3::from(t)));
        let back = transform.inverse().transform_point(&transform.transform_point(&p));
        prop_assert!((back - p).norm() < 1e-9);
        prop_assert!(transform.compose(&transform.inverse()).is_near_identity(1e-9));
    }
}
