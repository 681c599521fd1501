//! Closest-point correspondences between the moving samples and the fixed mesh.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use super::DistanceMetric;
use crate::mesh::MeshSnapshot;
use crate::spatial::{DistanceConvention, KdTree};

/// A position with its unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedPoint {
    /// Position.
    pub position: Point3<f64>,
    /// Unit normal (zero if unknown).
    pub normal: Vector3<f64>,
}

/// A sample of the moving mesh matched to a vertex of the fixed mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    /// Moving-mesh vertex index.
    pub source_index: usize,
    /// Sample in world space.
    pub source: OrientedPoint,
    /// Fixed-mesh vertex index.
    pub target_index: usize,
    /// Matched fixed-mesh vertex.
    pub target: OrientedPoint,
    /// Euclidean distance between the two positions.
    pub distance: f64,
}

impl PointPair {
    /// Dot product of the two normals.
    #[inline]
    pub fn normal_agreement(&self) -> f64 {
        self.source.normal.dot(&self.target.normal)
    }
}

type PointMetric = fn(&OrientedPoint, &OrientedPoint) -> f64;
type PointAxis = fn(&OrientedPoint, usize) -> f64;

/// Nearest-vertex search structure over a fixed mesh.
pub struct FixedIndex {
    tree: KdTree<OrientedPoint, PointMetric, PointAxis>,
    points: Vec<OrientedPoint>,
}

impl FixedIndex {
    /// Index the vertices of `fixed` under `metric`.
    pub fn new(fixed: &MeshSnapshot, metric: DistanceMetric) -> Self {
        let points: Vec<OrientedPoint> = fixed
            .positions()
            .iter()
            .zip(fixed.normals())
            .map(|(&position, &normal)| OrientedPoint { position, normal })
            .collect();
        let dist: PointMetric = match metric {
            DistanceMetric::Euclidean => euclidean,
            DistanceMetric::NormalWeighted => normal_weighted,
        };
        // Both metrics are >= the Euclidean distance, so linear pruning is exact
        let tree = KdTree::from_points(
            points.clone(),
            3,
            DistanceConvention::Linear,
            dist,
            axis as PointAxis,
        );
        Self { tree, points }
    }

    /// Number of indexed vertices.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// True if the fixed mesh had no vertices.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Match one world-space sample.
    pub fn match_point(&self, source_index: usize, source: OrientedPoint) -> Option<PointPair> {
        let (target_index, _) = self.tree.nearest_index(&source)?;
        let target = self.points[target_index];
        Some(PointPair {
            source_index,
            source,
            target_index,
            target,
            distance: (source.position - target.position).norm(),
        })
    }

    /// Match every sample, optionally in parallel. Output order follows input.
    pub fn match_all(&self, samples: &[(usize, OrientedPoint)], parallel: bool) -> Vec<PointPair> {
        if parallel {
            samples
                .par_iter()
                .filter_map(|&(i, p)| self.match_point(i, p))
                .collect()
        } else {
            samples
                .iter()
                .filter_map(|&(i, p)| self.match_point(i, p))
                .collect()
        }
    }
}

fn euclidean(a: &OrientedPoint, b: &OrientedPoint) -> f64 {
    (a.position - b.position).norm()
}

/// Euclidean distance scaled by `2 - dot(n_a, n_b)`, which lies in `[1, 3]`
/// for unit normals: opposing normals triple the distance.
fn normal_weighted(a: &OrientedPoint, b: &OrientedPoint) -> f64 {
    let agreement = a.normal.dot(&b.normal).clamp(-1.0, 1.0);
    (2.0 - agreement) * euclidean(a, b)
}

fn axis(p: &OrientedPoint, axis: usize) -> f64 {
    p.position[axis]
}
