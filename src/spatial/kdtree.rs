//! Static k-d tree for nearest-neighbor search.
//!
//! The tree is built once over a fixed point collection by recursive median
//! splits along a cycling axis (`axis = depth % dim`) and is read-only
//! afterwards. Points can be any type: the caller supplies the distance
//! function and a coordinate accessor.
//!
//! # Pruning
//!
//! During the backtracking search the far subtree is skipped when the offset
//! to the splitting plane already exceeds the best distance found. The offset
//! is compared in the same convention the distance function uses (see
//! [`DistanceConvention`]), so the distance function must never be smaller
//! than the plain Euclidean distance expressed in that convention.
//!
//! # Example
//!
//! ```
//! use tessera::spatial::KdTree;
//! use nalgebra::Point3;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 5.0, 0.0),
//! ];
//! let tree = KdTree::euclidean3(points);
//!
//! let (nearest, dist) = tree.nearest(&Point3::new(0.9, 0.2, 0.0)).unwrap();
//! assert_eq!(*nearest, Point3::new(1.0, 0.0, 0.0));
//! assert!(dist < 0.25);
//! ```

use nalgebra::Point3;

/// How the distance function measures distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceConvention {
    /// `dist` returns a length (e.g. Euclidean norm).
    Linear,
    /// `dist` returns a squared length.
    Squared,
}

impl DistanceConvention {
    /// Express a signed offset to a splitting plane in this convention.
    #[inline]
    fn plane_bound(self, offset: f64) -> f64 {
        match self {
            DistanceConvention::Linear => offset.abs(),
            DistanceConvention::Squared => offset * offset,
        }
    }
}

/// A node holds one point (with its index in the input collection) and the two
/// subtrees built from the lower and upper halves of its axis-sorted range.
#[derive(Debug)]
struct KdNode<P> {
    index: usize,
    point: P,
    left: Option<Box<KdNode<P>>>,
    right: Option<Box<KdNode<P>>>,
}

/// A balanced k-d tree over a static point collection.
pub struct KdTree<P, D, C> {
    root: Option<Box<KdNode<P>>>,
    len: usize,
    dim: usize,
    convention: DistanceConvention,
    dist: D,
    coord: C,
}

/// Distance function type of [`EuclideanKdTree`].
pub type PointDistance = fn(&Point3<f64>, &Point3<f64>) -> f64;
/// Coordinate accessor type of [`EuclideanKdTree`].
pub type PointCoord = fn(&Point3<f64>, usize) -> f64;

/// A k-d tree over plain 3D points with Euclidean distance.
pub type EuclideanKdTree = KdTree<Point3<f64>, PointDistance, PointCoord>;

impl EuclideanKdTree {
    /// Build a 3D tree using the Euclidean distance.
    pub fn euclidean3(points: Vec<Point3<f64>>) -> Self {
        KdTree::from_points(
            points,
            3,
            DistanceConvention::Linear,
            euclidean_distance as PointDistance,
            point_coord as PointCoord,
        )
    }
}

fn euclidean_distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

fn point_coord(p: &Point3<f64>, axis: usize) -> f64 {
    p[axis]
}

impl<P, D, C> KdTree<P, D, C>
where
    D: Fn(&P, &P) -> f64,
    C: Fn(&P, usize) -> f64,
{
    /// Build a tree over `points`.
    ///
    /// # Arguments
    ///
    /// * `points` - The static point collection (may be empty)
    /// * `dim` - Number of axes to cycle through (clamped to at least 1)
    /// * `convention` - Whether `dist` returns linear or squared distances
    /// * `dist` - Distance between two points, `>= 0`
    /// * `coord` - Coordinate of a point along an axis in `0..dim`
    ///
    /// Construction is O(N log N) using linear-time median selection.
    pub fn from_points(
        points: Vec<P>,
        dim: usize,
        convention: DistanceConvention,
        dist: D,
        coord: C,
    ) -> Self {
        let dim = dim.max(1);
        let len = points.len();
        let root = build(points.into_iter().enumerate().collect(), 0, dim, &coord);
        Self {
            root,
            len,
            dim,
            convention,
            dist,
            coord,
        }
    }

    /// Number of points in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the tree holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of axes the tree cycles through.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Height of the tree (0 for an empty tree).
    pub fn depth(&self) -> usize {
        fn height<P>(node: &Option<Box<KdNode<P>>>) -> usize {
            node.as_ref()
                .map_or(0, |n| 1 + height(&n.left).max(height(&n.right)))
        }
        height(&self.root)
    }

    /// Find the point nearest to `query`.
    ///
    /// Returns the point and its distance as measured by the tree's distance
    /// function, or `None` for an empty tree. When several points are equally
    /// near, any one of them may be returned.
    pub fn nearest(&self, query: &P) -> Option<(&P, f64)> {
        self.nearest_node(query).map(|(node, d)| (&node.point, d))
    }

    /// Like [`KdTree::nearest`], but returns the position of the nearest point
    /// in the collection the tree was built from.
    pub fn nearest_index(&self, query: &P) -> Option<(usize, f64)> {
        self.nearest_node(query).map(|(node, d)| (node.index, d))
    }

    fn nearest_node(&self, query: &P) -> Option<(&KdNode<P>, f64)> {
        let root = self.root.as_deref()?;
        let mut best = None;
        self.search(root, query, 0, &mut best);
        best
    }

    fn search<'a>(
        &'a self,
        node: &'a KdNode<P>,
        query: &P,
        depth: usize,
        best: &mut Option<(&'a KdNode<P>, f64)>,
    ) {
        let d = (self.dist)(query, &node.point);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            *best = Some((node, d));
        }

        // Decide which side to go to
        let axis = depth % self.dim;
        let offset = (self.coord)(query, axis) - (self.coord)(&node.point, axis);
        let (near, far) = if offset < 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(child) = near.as_deref() {
            self.search(child, query, depth + 1, best);
        }

        if let Some(child) = far.as_deref() {
            let bound = self.convention.plane_bound(offset);
            if best.map_or(true, |(_, best_d)| bound < best_d) {
                self.search(child, query, depth + 1, best);
            }
        }
    }
}

fn build<P, C>(
    mut points: Vec<(usize, P)>,
    depth: usize,
    dim: usize,
    coord: &C,
) -> Option<Box<KdNode<P>>>
where
    C: Fn(&P, usize) -> f64,
{
    if points.is_empty() {
        return None;
    }

    let axis = depth % dim;
    let median = points.len() / 2;
    points.select_nth_unstable_by(median, |a, b| {
        coord(&a.1, axis).total_cmp(&coord(&b.1, axis))
    });

    let upper = points.split_off(median + 1);
    let (index, point) = points.pop()?;

    Some(Box::new(KdNode {
        index,
        point,
        left: build(points, depth + 1, dim, coord),
        right: build(upper, depth + 1, dim, coord),
    }))
}

impl<P: std::fmt::Debug, D, C> std::fmt::Debug for KdTree<P, D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTree")
            .field("len", &self.len)
            .field("dim", &self.dim)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}
