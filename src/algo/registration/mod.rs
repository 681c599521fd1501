//! Rigid registration with Iterative Closest Point.
//!
//! Each ICP iteration samples vertices of the moving mesh in world space,
//! matches them to the nearest vertices of the fixed mesh, drops outlier
//! pairs, optionally weights the rest, and solves for the rigid increment
//! that best aligns the pairs. Every step is an enum-selected policy:
//!
//! | Axis | Type |
//! |------|------|
//! | sampling | [`SamplingStrategy`] |
//! | correspondence metric | [`DistanceMetric`] |
//! | outlier rejection | [`RejectionCriterion`] |
//! | pair weighting | [`WeightingStrategy`] |
//! | minimization | [`Minimization`] |
//!
//! # Example
//!
//! ```
//! use tessera::algo::registration::{IcpOptions, IcpSolver, RigidTransform};
//! use tessera::mesh::primitives;
//! use nalgebra::Vector3;
//!
//! let fixed = primitives::ellipsoid(12, 24, [3.0, 2.0, 1.0]);
//! let offset = RigidTransform::from_translation(Vector3::new(0.05, 0.0, 0.0));
//! let moving = fixed.transformed(&offset);
//!
//! let mut solver = IcpSolver::new(IcpOptions::default().with_seed(7).with_max_iterations(50));
//! let result = solver.register(&moving, &fixed).unwrap();
//! assert!(result.converged);
//! ```

mod correspondence;
mod icp;
mod policy;
mod rejection;
mod sampling;
mod solve;
mod transform;
mod weighting;

pub use correspondence::{FixedIndex, OrientedPoint, PointPair};
pub use icp::{rmse, IcpOptions, IcpResult, IcpSolver, IterationRecord};
pub use policy::{
    DistanceMetric, Minimization, RejectionCriterion, SamplingStrategy, WeightingStrategy,
};
pub use rejection::{median, reject_pairs};
pub use sampling::{sample_count, sample_indices};
pub use solve::{point_to_plane, point_to_point};
pub use transform::RigidTransform;
pub use weighting::PairWeighting;
