//! # Tessera
//!
//! Differential operators, smoothing, deformation and rigid registration for
//! triangle meshes.
//!
//! Tessera works on immutable [`MeshSnapshot`](mesh::MeshSnapshot) values:
//! positions, per-vertex normals and triangle faces handed over by the host
//! application. Every operation returns new positions or a rigid transform
//! for the caller to apply.
//!
//! ## Features
//!
//! - **Differential operators**: per-face gradient, mass, cotangent and
//!   uniform graph Laplacian matrices in a compact CSR format
//! - **Smoothing**: explicit iterated averaging and unconditionally stable
//!   implicit Euler
//! - **Deformation**: gradient- and Laplacian-domain brushes with cached
//!   factorizations, a bump brush and handle-based deformation
//! - **Registration**: Iterative Closest Point backed by a k-d tree, with
//!   enum-selected sampling, rejection, weighting and minimization
//!
//! ## Quick Start
//!
//! ```
//! use tessera::prelude::*;
//! use nalgebra::Vector3;
//!
//! let fixed = primitives::ellipsoid(12, 24, [3.0, 2.0, 1.0]);
//! let moving = fixed.transformed(&RigidTransform::from_translation(Vector3::new(0.02, 0.0, 0.0)));
//!
//! let mut solver = IcpSolver::new(IcpOptions::default().with_seed(1).with_max_iterations(20));
//! let result = solver.register(&moving, &fixed).unwrap();
//! assert!(result.converged);
//!
//! // Smooth the registered copy
//! let aligned = moving.transformed(&result.transform);
//! let positions = smooth(&aligned, &SmoothOptions::default().with_iterations(2)).unwrap();
//! assert_eq!(positions.len(), aligned.num_vertices());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;
pub mod spatial;

/// Prelude module for convenient imports.
///
/// ```
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::deform::{
        bump_brush, constrained_deform, scale_rotate_matrix, BumpBrushOptions,
        ConstrainedDeformOptions, GradientBrush, LaplacianBrush, MatrixCache,
    };
    pub use crate::algo::registration::{
        DistanceMetric, IcpOptions, IcpResult, IcpSolver, Minimization, RejectionCriterion,
        RigidTransform, SamplingStrategy, WeightingStrategy,
    };
    pub use crate::algo::smooth::{smooth, SmoothOptions, SmoothingMethod};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{primitives, MeshSnapshot, Topology};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
