//! Immutable triangle-mesh snapshot.
//!
//! A [`MeshSnapshot`] is the value every operator in this crate consumes: an
//! ordered list of vertex positions and normals plus a face-vertex list of
//! triangles. It owns no editing state; operators return new positions or a
//! rigid transform and the caller writes them back to its own mesh storage.

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};

/// A triangle mesh captured at one instant.
///
/// Invariants (checked by every constructor):
/// - `positions.len() == normals.len()`
/// - every face references three distinct, valid vertex indices
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSnapshot {
    positions: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl MeshSnapshot {
    /// Build a snapshot from positions, per-vertex normals and triangles.
    ///
    /// # Example
    /// ```
    /// use tessera::mesh::MeshSnapshot;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let positions = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.0, 1.0, 0.0),
    /// ];
    /// let normals = vec![Vector3::z(); 3];
    /// let mesh = MeshSnapshot::new(positions, normals, vec![[0, 1, 2]]).unwrap();
    /// assert_eq!(mesh.num_faces(), 1);
    /// ```
    pub fn new(
        positions: Vec<Point3<f64>>,
        normals: Vec<Vector3<f64>>,
        faces: Vec<[usize; 3]>,
    ) -> Result<Self> {
        if normals.len() != positions.len() {
            return Err(MeshError::SizeMismatch {
                what: "vertex normals",
                expected: positions.len(),
                actual: normals.len(),
            });
        }
        validate_faces(positions.len(), &faces)?;
        Ok(Self {
            positions,
            normals,
            faces,
        })
    }

    /// Build a snapshot from positions and triangles, deriving area-weighted
    /// vertex normals.
    pub fn from_triangles(positions: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        validate_faces(positions.len(), &faces)?;
        let normals = area_weighted_normals(&positions, &faces);
        Ok(Self {
            positions,
            normals,
            faces,
        })
    }

    /// Build a snapshot from arbitrary polygons, rejecting anything that is not
    /// a triangle.
    ///
    /// Use [`triangulate_polygons`] first when the input may contain quads or
    /// larger polygons.
    pub fn from_polygons(positions: Vec<Point3<f64>>, polygons: &[Vec<usize>]) -> Result<Self> {
        let mut faces = Vec::with_capacity(polygons.len());
        for (fi, poly) in polygons.iter().enumerate() {
            match poly.as_slice() {
                &[a, b, c] => faces.push([a, b, c]),
                _ => {
                    return Err(MeshError::NonTriangularFace {
                        face: fi,
                        sides: poly.len(),
                    })
                }
            }
        }
        Self::from_triangles(positions, faces)
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Per-vertex normals.
    #[inline]
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Triangles as vertex-index triples.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Position of vertex `v`.
    #[inline]
    pub fn position(&self, v: usize) -> &Point3<f64> {
        &self.positions[v]
    }

    /// Normal of vertex `v`.
    #[inline]
    pub fn normal(&self, v: usize) -> &Vector3<f64> {
        &self.normals[v]
    }

    // ==================== Geometry ====================

    /// Get the positions of the three corners of face `f`.
    pub fn face_positions(&self, f: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[f];
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    /// Unnormalized face normal; its length is twice the face area.
    pub fn face_cross(&self, f: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Compute the unit normal of a face.
    ///
    /// Returns the zero vector for a zero-area face.
    pub fn face_normal(&self, f: usize) -> Vector3<f64> {
        self.face_cross(f).try_normalize(0.0).unwrap_or_else(Vector3::zeros)
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: usize) -> f64 {
        0.5 * self.face_cross(f).norm()
    }

    /// Compute the centroid of a face.
    pub fn face_centroid(&self, f: usize) -> Point3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    /// Total surface area.
    pub fn total_area(&self) -> f64 {
        (0..self.num_faces()).map(|f| self.face_area(f)).sum()
    }

    /// Mean of all vertex positions. `None` for an empty mesh.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        centroid(&self.positions)
    }

    /// Compute the axis-aligned bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.positions.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        Some((min, max))
    }

    /// Length of the bounding box diagonal (0 for an empty mesh).
    pub fn bounding_box_diagonal(&self) -> f64 {
        self.bounding_box()
            .map_or(0.0, |(min, max)| (max - min).norm())
    }

    // ==================== Derived snapshots ====================

    /// A copy of this snapshot with new vertex positions and recomputed normals.
    pub fn with_positions(&self, positions: Vec<Point3<f64>>) -> Result<Self> {
        if positions.len() != self.positions.len() {
            return Err(MeshError::SizeMismatch {
                what: "vertex positions",
                expected: self.positions.len(),
                actual: positions.len(),
            });
        }
        let normals = area_weighted_normals(&positions, &self.faces);
        Ok(Self {
            positions,
            normals,
            faces: self.faces.clone(),
        })
    }

    /// A copy of this snapshot with positions and normals mapped by the given
    /// functions. Faces are unchanged.
    pub fn map_vertices<FP, FN>(&self, map_position: FP, map_normal: FN) -> Self
    where
        FP: Fn(&Point3<f64>) -> Point3<f64>,
        FN: Fn(&Vector3<f64>) -> Vector3<f64>,
    {
        Self {
            positions: self.positions.iter().map(map_position).collect(),
            normals: self.normals.iter().map(map_normal).collect(),
            faces: self.faces.clone(),
        }
    }

    /// Recompute area-weighted vertex normals from the current positions.
    pub fn recompute_normals(&mut self) {
        self.normals = area_weighted_normals(&self.positions, &self.faces);
    }
}

/// Mean of a set of points. `None` when `points` is empty.
pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / points.len() as f64))
}

/// Fan-triangulate convex polygons.
///
/// Triangles are passed through, polygons with fewer than three corners are
/// dropped, and an n-gon `[v0, v1, .., vn-1]` becomes `[v0, vi, vi+1]`.
///
/// ```
/// use tessera::mesh::triangulate_polygons;
///
/// let quads = vec![vec![0, 1, 2, 3]];
/// assert_eq!(triangulate_polygons(&quads), vec![[0, 1, 2], [0, 2, 3]]);
/// ```
pub fn triangulate_polygons(polygons: &[Vec<usize>]) -> Vec<[usize; 3]> {
    let mut triangles = Vec::with_capacity(polygons.len() * 2);
    for poly in polygons {
        if poly.len() < 3 {
            continue;
        }
        for i in 1..poly.len() - 1 {
            triangles.push([poly[0], poly[i], poly[i + 1]]);
        }
    }
    triangles
}

fn validate_faces(num_vertices: usize, faces: &[[usize; 3]]) -> Result<()> {
    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= num_vertices {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }
    Ok(())
}

fn area_weighted_normals(positions: &[Point3<f64>], faces: &[[usize; 3]]) -> Vec<Vector3<f64>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];
    for &[a, b, c] in faces {
        // Area-weighted (not normalized)
        let n = (positions[b] - positions[a]).cross(&(positions[c] - positions[a]));
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    for n in &mut normals {
        *n = n.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> MeshSnapshot {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        MeshSnapshot::from_triangles(positions, vec![[0, 1, 2]]).unwrap()
    }

    #[test]
    fn test_invalid_index_rejected() {
        let positions = vec![Point3::origin(); 3];
        let err = MeshSnapshot::from_triangles(positions, vec![[0, 1, 3]]).unwrap_err();
        assert!(matches!(err, MeshError::InvalidVertexIndex { face: 0, vertex: 3 }));
    }

    #[test]
    fn test_degenerate_face_rejected() {
        let positions = vec![Point3::origin(); 3];
        let err = MeshSnapshot::from_triangles(positions, vec![[0, 1, 1]]).unwrap_err();
        assert!(matches!(err, MeshError::DegenerateFace { face: 0 }));
    }

    #[test]
    fn test_normal_count_mismatch() {
        let positions = vec![Point3::origin(); 3];
        let err = MeshSnapshot::new(positions, vec![Vector3::z()], vec![[0, 1, 2]]).unwrap_err();
        assert!(matches!(err, MeshError::SizeMismatch { expected: 3, actual: 1, .. }));
    }

    #[test]
    fn test_quad_rejected_by_from_polygons() {
        let positions = vec![Point3::origin(); 4];
        let err = MeshSnapshot::from_polygons(positions, &[vec![0, 1, 2, 3]]).unwrap_err();
        assert!(matches!(err, MeshError::NonTriangularFace { face: 0, sides: 4 }));
    }

    #[test]
    fn test_triangulate_pentagon() {
        let tris = triangulate_polygons(&[vec![0, 1, 2, 3, 4], vec![5, 6]]);
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_face_geometry() {
        let mesh = unit_triangle();
        assert_relative_eq!(mesh.face_area(0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(mesh.face_normal(0), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(*mesh.normal(1), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(mesh.total_area(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bounding_box_diagonal() {
        let mesh = unit_triangle();
        assert_relative_eq!(mesh.bounding_box_diagonal(), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_with_positions_size_checked() {
        let mesh = unit_triangle();
        assert!(mesh.with_positions(vec![Point3::origin()]).is_err());
        let moved = mesh
            .with_positions(mesh.positions().iter().map(|p| p * 2.0).collect())
            .unwrap();
        assert_relative_eq!(moved.total_area(), 2.0, epsilon = 1e-12);
    }
}
