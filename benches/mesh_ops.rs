//! Benchmarks for mesh operations.

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::{Matrix3, Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera::algo::operators::{compute_deformation_matrices, compute_graph_laplacian};
use tessera::prelude::*;
use tessera::spatial::KdTree;

fn random_points(n: usize, seed: u64) -> Vec<Point3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        })
        .collect()
}

fn bench_kdtree(c: &mut Criterion) {
    let points = random_points(10_000, 1);
    let queries = random_points(1_000, 2);

    c.bench_function("kdtree_build_10k", |b| {
        b.iter(|| KdTree::euclidean3(points.clone()));
    });

    let tree = KdTree::euclidean3(points);
    c.bench_function("kdtree_nearest_1k_queries", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for q in &queries {
                if let Some((_, d)) = tree.nearest(q) {
                    sum += d;
                }
            }
            sum
        });
    });
}

fn bench_operators(c: &mut Criterion) {
    let mesh = primitives::uv_sphere(40, 80, 1.0);

    c.bench_function("deformation_matrices_sphere_40x80", |b| {
        b.iter(|| compute_deformation_matrices(&mesh).unwrap());
    });

    c.bench_function("graph_laplacian_sphere_40x80", |b| {
        b.iter(|| compute_graph_laplacian(&mesh));
    });
}

fn bench_icp(c: &mut Criterion) {
    let fixed = primitives::ellipsoid(30, 60, [4.0, 2.5, 1.5]);
    let displacement = RigidTransform::from_axis_angle(&Vector3::z(), 10f64.to_radians())
        .then(&RigidTransform::from_translation(Vector3::new(0.5, 0.0, 0.0)));
    let moving = fixed.transformed(&displacement);
    let options = IcpOptions::default().with_seed(7).with_max_iterations(50);

    c.bench_function("icp_point_to_point_ellipsoid", |b| {
        b.iter(|| IcpSolver::new(options.clone()).register(&moving, &fixed).unwrap());
    });
}

fn bench_brush(c: &mut Criterion) {
    let mesh = primitives::uv_sphere(40, 80, 1.0);
    let brush = GradientBrush::new(&mesh).unwrap();
    let faces: Vec<usize> = (0..mesh.num_faces()).step_by(7).collect();
    let transform = scale_rotate_matrix([1.2, 1.0, 1.0], [0.0, 0.0, 15.0]);

    c.bench_function("gradient_brush_stroke", |b| {
        b.iter(|| brush.apply(mesh.positions(), &faces, &transform).unwrap());
    });

    c.bench_function("gradient_brush_identity_stroke", |b| {
        b.iter(|| brush.apply(mesh.positions(), &faces, &Matrix3::identity()).unwrap());
    });
}

criterion_group!(benches, bench_kdtree, bench_operators, bench_icp, bench_brush);
criterion_main!(benches);
