//! Spatial search structures.
//!
//! - [`KdTree`]: static k-d tree for nearest-neighbor queries with a pluggable
//!   distance function and per-axis coordinate accessor.

mod kdtree;

pub use kdtree::{DistanceConvention, EuclideanKdTree, KdTree, PointCoord, PointDistance};
