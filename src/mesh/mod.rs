//! Mesh snapshot and derived topology.
//!
//! This module provides the immutable [`MeshSnapshot`] value that every
//! operator in the crate consumes, plus [`Topology`] for adjacency queries
//! derived from its faces.
//!
//! # Overview
//!
//! A snapshot is captured by the caller from whatever mesh storage it owns:
//! vertex positions, per-vertex normals and a list of triangles. Operators
//! never mutate it; they return either new positions or a rigid transform.
//!
//! # Construction
//!
//! ```
//! use tessera::mesh::MeshSnapshot;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh = MeshSnapshot::from_triangles(positions, faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 3);
//! ```

pub mod primitives;
mod snapshot;
mod topology;

pub use snapshot::{centroid, triangulate_polygons, MeshSnapshot};
pub use topology::{laplace_coordinates, signed_volume, Topology};
