//! Procedural meshes used by tests, benchmarks and documentation.

use std::f64::consts::PI;

use nalgebra::Point3;

use super::MeshSnapshot;

/// A tetrahedron with outward-facing triangles.
pub fn tetrahedron() -> MeshSnapshot {
    let positions = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.5, 1.0, 0.0),
        Point3::new(0.5, 0.5, 1.0),
    ];
    let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
    build(positions, faces)
}

/// An axis-aligned cube of side `size` centred at the origin, 12 triangles.
pub fn cube(size: f64) -> MeshSnapshot {
    let h = 0.5 * size;
    let positions = vec![
        Point3::new(-h, -h, -h),
        Point3::new(h, -h, -h),
        Point3::new(h, h, -h),
        Point3::new(-h, h, -h),
        Point3::new(-h, -h, h),
        Point3::new(h, -h, h),
        Point3::new(h, h, h),
        Point3::new(-h, h, h),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 6, 2],
        [3, 7, 6],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    build(positions, faces)
}

/// A flat `nx` x `ny` grid in the XY plane with the given cell spacing.
///
/// Vertex `(i, j)` has index `j * (nx + 1) + i`; each cell is split along its
/// diagonal into two triangles facing +Z.
pub fn grid(nx: usize, ny: usize, spacing: f64) -> MeshSnapshot {
    let mut positions = Vec::with_capacity((nx + 1) * (ny + 1));
    let mut faces = Vec::with_capacity(nx * ny * 2);

    for j in 0..=ny {
        for i in 0..=nx {
            positions.push(Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
        }
    }

    for j in 0..ny {
        for i in 0..nx {
            let v00 = j * (nx + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (nx + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    build(positions, faces)
}

/// A closed UV sphere.
pub fn uv_sphere(rings: usize, segments: usize, radius: f64) -> MeshSnapshot {
    ellipsoid(rings, segments, [radius, radius, radius])
}

/// A closed UV ellipsoid with semi-axes `radii`, poles on the Z axis.
///
/// `rings` is the number of latitude bands (at least 2), `segments` the number
/// of longitude slices (at least 3).
pub fn ellipsoid(rings: usize, segments: usize, radii: [f64; 3]) -> MeshSnapshot {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let [rx, ry, rz] = radii;

    let mut positions = Vec::with_capacity((rings - 1) * segments + 2);
    positions.push(Point3::new(0.0, 0.0, rz));
    for i in 1..rings {
        let theta = PI * i as f64 / rings as f64;
        for j in 0..segments {
            let phi = 2.0 * PI * j as f64 / segments as f64;
            positions.push(Point3::new(
                rx * theta.sin() * phi.cos(),
                ry * theta.sin() * phi.sin(),
                rz * theta.cos(),
            ));
        }
    }
    positions.push(Point3::new(0.0, 0.0, -rz));

    let north = 0;
    let south = positions.len() - 1;
    let ring = |i: usize, j: usize| 1 + i * segments + (j % segments);

    let mut faces = Vec::with_capacity(2 * rings * segments);
    for j in 0..segments {
        faces.push([north, ring(0, j), ring(0, j + 1)]);
    }
    for i in 0..rings - 2 {
        for j in 0..segments {
            let a = ring(i, j);
            let b = ring(i, j + 1);
            let c = ring(i + 1, j + 1);
            let d = ring(i + 1, j);
            faces.push([a, d, c]);
            faces.push([a, c, b]);
        }
    }
    for j in 0..segments {
        faces.push([south, ring(rings - 2, j + 1), ring(rings - 2, j)]);
    }

    build(positions, faces)
}

fn build(positions: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> MeshSnapshot {
    match MeshSnapshot::from_triangles(positions, faces) {
        Ok(mesh) => mesh,
        // Index layouts above are fixed and always valid.
        Err(err) => unreachable!("procedural mesh is invalid: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{signed_volume, Topology};
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_is_closed_genus_zero() {
        let mesh = uv_sphere(8, 12, 1.0);
        let topo = Topology::from_mesh(&mesh);
        assert_eq!(topo.boundary_loops(), 0);
        assert_eq!(topo.euler_characteristic(), 2);
        assert_relative_eq!(topo.genus(), 0.0);
    }

    #[test]
    fn test_sphere_is_outward_oriented() {
        let mesh = uv_sphere(16, 24, 1.0);
        let volume = signed_volume(&mesh);
        // Inscribed polyhedron: slightly less than 4/3 pi
        assert!(volume > 3.9 && volume < 4.0 * PI / 3.0, "volume {volume}");
        for (p, n) in mesh.positions().iter().zip(mesh.normals()) {
            assert!(p.coords.dot(n) > 0.0);
        }
    }

    #[test]
    fn test_grid_counts() {
        let mesh = grid(3, 2, 0.5);
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.num_faces(), 12);
        assert_relative_eq!(mesh.total_area(), 1.5, epsilon = 1e-12);
    }
}
