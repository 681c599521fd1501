//! Bump brush: raises or sinks a round region around a vertex.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Matrix3, Point3, Rotation3, Unit};

use super::GradientBrush;
use crate::error::{check_index, MeshError, Result};
use crate::mesh::MeshSnapshot;

/// Options for [`bump_brush`].
#[derive(Debug, Clone)]
pub struct BumpBrushOptions {
    /// Vertex at the centre of the bump.
    pub center: usize,

    /// Radius of the affected region (must be positive).
    pub radius: f64,

    /// Peak tilt in radians, in `(-π/2, π/2)`. Positive values raise the
    /// centre along its normal, negative values sink it.
    pub slope: f64,

    /// Minimum dot product between a vertex normal and the centre normal for
    /// the vertex to count as inside the region.
    pub normal_agreement: f64,
}

impl Default for BumpBrushOptions {
    fn default() -> Self {
        Self {
            center: 0,
            radius: 0.1,
            slope: 0.0,
            normal_agreement: 0.9,
        }
    }
}

impl BumpBrushOptions {
    /// Set the centre vertex.
    pub fn with_center(mut self, center: usize) -> Self {
        self.center = center;
        self
    }

    /// Set the radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the peak tilt.
    pub fn with_slope(mut self, slope: f64) -> Self {
        self.slope = slope;
        self
    }

    /// Set the normal agreement threshold.
    pub fn with_normal_agreement(mut self, normal_agreement: f64) -> Self {
        self.normal_agreement = normal_agreement;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(MeshError::invalid_param(
                "radius",
                self.radius,
                "must be finite and positive",
            ));
        }
        if !self.slope.is_finite() || self.slope.abs() >= FRAC_PI_2 {
            return Err(MeshError::invalid_param("slope", self.slope, "must lie in (-pi/2, pi/2)"));
        }
        if !self.normal_agreement.is_finite() {
            return Err(MeshError::invalid_param(
                "normal_agreement",
                self.normal_agreement,
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Apply a bump to `mesh` and return the new positions.
///
/// Builds a fresh [`GradientBrush`]; use [`bump_brush_with`] to reuse one
/// across strokes.
pub fn bump_brush(mesh: &MeshSnapshot, options: &BumpBrushOptions) -> Result<Vec<Point3<f64>>> {
    options.validate()?;
    check_index("vertex", options.center, mesh.num_vertices())?;
    let brush = GradientBrush::new(mesh)?;
    bump_brush_with(&brush, mesh, options)
}

/// Apply a bump using a prebuilt brush for `mesh`.
///
/// A face is affected if any of its vertices lies within `radius` of the
/// centre and has a normal agreeing with the centre normal. With `d` the
/// distance from the centre to the face centroid, the face is tilted by
/// `slope·sin(π·d/radius)` about `n × r̂` (`n` the face normal, `r̂` the
/// outward direction) and stretched by `1/cos(angle)` along the tilted
/// `r̂`, so its footprint in the original plane is preserved.
pub fn bump_brush_with(
    brush: &GradientBrush,
    mesh: &MeshSnapshot,
    options: &BumpBrushOptions,
) -> Result<Vec<Point3<f64>>> {
    options.validate()?;
    check_index("vertex", options.center, mesh.num_vertices())?;

    let center = *mesh.position(options.center);
    let center_normal = *mesh.normal(options.center);
    let inside: Vec<bool> = mesh
        .positions()
        .iter()
        .zip(mesh.normals())
        .map(|(p, n)| {
            (p - center).norm() <= options.radius
                && n.dot(&center_normal) >= options.normal_agreement
        })
        .collect();

    let mut affected = 0usize;
    let positions = brush.apply_with(mesh.positions(), |f, jacobian| {
        if !mesh.faces()[f].iter().any(|&v| inside[v]) {
            return jacobian;
        }
        match face_tilt(mesh, f, center, options) {
            Some(tilt) => {
                affected += 1;
                tilt * jacobian
            }
            None => jacobian,
        }
    })?;

    log::debug!("bump brush tilted {} faces", affected);
    Ok(positions)
}

/// Image-space map `S·R` for one face, or `None` where the tilt axis is
/// undefined.
fn face_tilt(
    mesh: &MeshSnapshot,
    f: usize,
    center: Point3<f64>,
    options: &BumpBrushOptions,
) -> Option<Matrix3<f64>> {
    let outward = mesh.face_centroid(f) - center;
    let distance = outward.norm();
    let direction = outward.try_normalize(f64::EPSILON)?;
    let axis = Unit::try_new(mesh.face_normal(f).cross(&direction), f64::EPSILON)?;

    let angle = options.slope * (PI * distance / options.radius).sin();
    let rotation = Rotation3::from_axis_angle(&axis, angle);

    // Stretch along the tilted radial direction
    let tilted = rotation * direction;
    let stretch = Matrix3::identity() + (1.0 / angle.cos() - 1.0) * tilted * tilted.transpose();
    Some(stretch * rotation.matrix())
}
