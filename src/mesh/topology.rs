//! Derived vertex adjacency and topological queries.
//!
//! Adjacency is never stored on the [`MeshSnapshot`]; it is derived here from
//! the face list (or from an explicit edge list) whenever an operator needs it.
//!
//! # Example
//!
//! ```
//! use tessera::mesh::{primitives, Topology};
//!
//! let mesh = primitives::tetrahedron();
//! let topo = Topology::from_mesh(&mesh);
//! assert_eq!(topo.num_edges(), 6);
//! assert_eq!(topo.boundary_loops(), 0);
//! assert_eq!(topo.genus(), 0.0);
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};

use nalgebra::Point3;

use super::MeshSnapshot;
use crate::error::{check_index, Result};

/// Vertex adjacency of a mesh plus per-edge face counts.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Sorted neighbor lists, one per vertex.
    neighbors: Vec<Vec<usize>>,
    /// Undirected edge (min, max) -> number of incident faces.
    edge_faces: HashMap<(usize, usize), usize>,
    num_faces: usize,
}

impl Topology {
    /// Derive adjacency from the triangles of a mesh.
    pub fn from_mesh(mesh: &MeshSnapshot) -> Self {
        let mut edge_faces = HashMap::with_capacity(mesh.num_faces() * 3 / 2);
        for &[a, b, c] in mesh.faces() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edge_faces.entry(edge_key(u, v)).or_insert(0) += 1;
            }
        }
        let neighbors = neighbor_lists(mesh.num_vertices(), edge_faces.keys().copied());
        Self {
            neighbors,
            edge_faces,
            num_faces: mesh.num_faces(),
        }
    }

    /// Derive adjacency from an explicit edge list.
    ///
    /// Edges carry no face information, so every edge counts as a boundary
    /// edge and the face count is zero.
    pub fn from_edges(num_vertices: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut edge_faces = HashMap::with_capacity(edges.len());
        for &(u, v) in edges {
            check_index("vertex", u, num_vertices)?;
            check_index("vertex", v, num_vertices)?;
            if u != v {
                edge_faces.insert(edge_key(u, v), 0);
            }
        }
        let neighbors = neighbor_lists(num_vertices, edge_faces.keys().copied());
        Ok(Self {
            neighbors,
            edge_faces,
            num_faces: 0,
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.neighbors.len()
    }

    /// Number of undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edge_faces.len()
    }

    /// Number of faces the topology was derived from.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.num_faces
    }

    /// Vertices sharing an edge with `v`, in ascending order.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.neighbors[v]
    }

    /// Number of neighbors of `v`.
    #[inline]
    pub fn degree(&self, v: usize) -> usize {
        self.neighbors[v].len()
    }

    /// Iterate over undirected edges as `(min, max)` pairs (unordered).
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edge_faces.keys().copied()
    }

    /// True if the edge exists and has exactly one incident face, or was
    /// given through [`Topology::from_edges`].
    pub fn is_boundary_edge(&self, u: usize, v: usize) -> bool {
        matches!(self.edge_faces.get(&edge_key(u, v)), Some(&n) if n <= 1)
    }

    /// All boundary edges, sorted.
    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<_> = self
            .edge_faces
            .iter()
            .filter(|(_, &n)| n <= 1)
            .map(|(&e, _)| e)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Number of boundary loops.
    ///
    /// Counts connected components of the graph formed by boundary edges only.
    pub fn boundary_loops(&self) -> usize {
        let boundary = self.boundary_edges();
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for &(u, v) in &boundary {
            adjacency.entry(u).or_default().push(v);
            adjacency.entry(v).or_default().push(u);
        }

        let mut unvisited: BTreeSet<usize> = adjacency.keys().copied().collect();
        let mut loops = 0;
        while let Some(start) = unvisited.pop_first() {
            loops += 1;
            let mut queue = VecDeque::from([start]);
            while let Some(v) = queue.pop_front() {
                for &n in &adjacency[&v] {
                    if unvisited.remove(&n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        loops
    }

    /// Label every vertex with its connected component.
    ///
    /// Returns `(count, labels)`; labels are in `0..count`, assigned in order of
    /// the lowest vertex index of each component. Isolated vertices form their
    /// own components.
    pub fn connected_components(&self) -> (usize, Vec<usize>) {
        let n = self.num_vertices();
        let mut labels = vec![usize::MAX; n];
        let mut count = 0;
        let mut queue = VecDeque::new();

        for start in 0..n {
            if labels[start] != usize::MAX {
                continue;
            }
            labels[start] = count;
            queue.push_back(start);
            while let Some(v) = queue.pop_front() {
                for &nb in &self.neighbors[v] {
                    if labels[nb] == usize::MAX {
                        labels[nb] = count;
                        queue.push_back(nb);
                    }
                }
            }
            count += 1;
        }

        (count, labels)
    }

    /// Euler characteristic `V - E + F`.
    pub fn euler_characteristic(&self) -> i64 {
        self.num_vertices() as i64 - self.num_edges() as i64 + self.num_faces as i64
    }

    /// Genus of a connected orientable surface: `1 - (V - E + F + B) / 2`.
    pub fn genus(&self) -> f64 {
        1.0 - (self.euler_characteristic() + self.boundary_loops() as i64) as f64 / 2.0
    }
}

/// Signed volume enclosed by a closed, consistently oriented mesh.
///
/// Sums the signed volumes `(v1 × v2) · v3 / 6` of the tetrahedra formed by
/// each face and the origin.
pub fn signed_volume(mesh: &MeshSnapshot) -> f64 {
    mesh.faces()
        .iter()
        .map(|&[a, b, c]| {
            let (p, q, r) = (mesh.position(a), mesh.position(b), mesh.position(c));
            p.coords.cross(&q.coords).dot(&r.coords) / 6.0
        })
        .sum()
}

/// Uniform Laplace coordinates: for each vertex, the mean of `v - n` over
/// its neighbors. Isolated vertices get the zero vector.
pub fn laplace_coordinates(
    mesh: &MeshSnapshot,
    topology: &Topology,
) -> Vec<nalgebra::Vector3<f64>> {
    (0..mesh.num_vertices())
        .map(|v| {
            let nbrs = topology.neighbors(v);
            if nbrs.is_empty() {
                return nalgebra::Vector3::zeros();
            }
            let p: &Point3<f64> = mesh.position(v);
            let sum: nalgebra::Vector3<f64> = nbrs.iter().map(|&n| p - mesh.position(n)).sum();
            sum / nbrs.len() as f64
        })
        .collect()
}

#[inline]
fn edge_key(u: usize, v: usize) -> (usize, usize) {
    if u < v {
        (u, v)
    } else {
        (v, u)
    }
}

fn neighbor_lists(
    num_vertices: usize,
    edges: impl Iterator<Item = (usize, usize)>,
) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); num_vertices];
    for (u, v) in edges {
        neighbors[u].push(v);
        neighbors[v].push(u);
    }
    for list in &mut neighbors {
        list.sort_unstable();
    }
    neighbors
}
