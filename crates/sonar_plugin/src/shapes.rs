//! Analytic occupancy oracle for tests, benches and offline baking.
//!
//! These shapes are deterministic and easy to reason about: a seafloor
//! half-space, boxes and spheres, each carrying a material and optionally the
//! actor that owns it.

use glam::DVec3;

use crate::oracle::{ActorFilter, ActorId, OccupancyOracle, Precision, SurfaceHit};

/// Solid primitive geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
  /// Solid where `normal · p <= offset` (e.g. a seafloor with `normal = +Z`).
  HalfSpace { normal: DVec3, offset: f64 },
  /// Solid ball.
  Sphere { center: DVec3, radius: f64 },
  /// Solid axis-aligned box.
  Aabb { min: DVec3, max: DVec3 },
}

impl Geometry {
  /// Horizontal seafloor at height `z`.
  pub fn floor(z: f64) -> Self {
    Self::HalfSpace {
      normal: DVec3::Z,
      offset: z,
    }
  }

  /// Signed distance from `p` to the surface (negative inside).
  pub fn signed_distance(&self, p: DVec3) -> f64 {
    match *self {
      Geometry::HalfSpace { normal, offset } => normal.dot(p) - offset,
      Geometry::Sphere { center, radius } => (p - center).length() - radius,
      Geometry::Aabb { min, max } => {
        let center = (min + max) * 0.5;
        let half = (max - min) * 0.5;
        let q = (p - center).abs() - half;
        q.max(DVec3::ZERO).length() + q.max_element().min(0.0)
      }
    }
  }

  /// Exact cube overlap test.
  pub fn overlaps_cube(&self, center: DVec3, half_extent: f64) -> bool {
    match *self {
      Geometry::HalfSpace { normal, offset } => {
        let reach = half_extent * (normal.x.abs() + normal.y.abs() + normal.z.abs());
        normal.dot(center) - reach <= offset
      }
      Geometry::Sphere {
        center: sc,
        radius,
      } => {
        let closest = sc.clamp(center - half_extent, center + half_extent);
        (closest - sc).length_squared() <= radius * radius
      }
      Geometry::Aabb { min, max } => {
        let lo = center - half_extent;
        let hi = center + half_extent;
        lo.x <= max.x && hi.x >= min.x && lo.y <= max.y && hi.y >= min.y && lo.z <= max.z && hi.z >= min.z
      }
    }
  }

  /// Bounding-sphere overlap test: never misses, may over-report.
  pub fn overlaps_cube_approx(&self, center: DVec3, half_extent: f64) -> bool {
    self.signed_distance(center) <= half_extent * 3f64.sqrt()
  }

  /// Closest surface point and outward normal for a query centered at `p`.
  pub fn surface_at(&self, p: DVec3) -> (DVec3, DVec3) {
    match *self {
      Geometry::HalfSpace { normal, offset } => (p - normal * (normal.dot(p) - offset), normal),
      Geometry::Sphere { center, radius } => {
        // NaN at the exact center; octree construction repairs it.
        let dir = (p - center).normalize();
        let location = if dir.is_finite() { center + dir * radius } else { center };
        (location, dir)
      }
      Geometry::Aabb { min, max } => {
        let center = (min + max) * 0.5;
        let half = (max - min) * 0.5;
        let rel = (p - center) / half;
        let abs = rel.abs();
        let normal = if abs.x >= abs.y && abs.x >= abs.z {
          DVec3::new(rel.x.signum(), 0.0, 0.0)
        } else if abs.y >= abs.z {
          DVec3::new(0.0, rel.y.signum(), 0.0)
        } else {
          DVec3::new(0.0, 0.0, rel.z.signum())
        };
        (p.clamp(min, max), normal)
      }
    }
  }
}

/// Geometry tagged with material and owner.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneShape {
  pub geometry: Geometry,
  pub material: String,
  pub actor: Option<ActorId>,
}

impl SceneShape {
  pub fn new(geometry: Geometry, material: impl Into<String>) -> Self {
    Self {
      geometry,
      material: material.into(),
      actor: None,
    }
  }

  pub fn with_actor(mut self, actor: ActorId) -> Self {
    self.actor = Some(actor);
    self
  }
}

/// Ordered list of shapes; the first overlapping shape wins a query.
#[derive(Clone, Debug, Default)]
pub struct SceneOracle {
  pub shapes: Vec<SceneShape>,
}

impl SceneOracle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_shape(mut self, shape: SceneShape) -> Self {
    self.shapes.push(shape);
    self
  }
}

impl OccupancyOracle for SceneOracle {
  fn occupancy(
    &self,
    center: DVec3,
    half_extent: f64,
    precision: Precision,
    filter: &ActorFilter,
  ) -> Option<SurfaceHit> {
    self
      .shapes
      .iter()
      .filter(|s| filter.admits(s.actor))
      .find(|s| match precision {
        Precision::Precise => s.geometry.overlaps_cube(center, half_extent),
        Precision::Approximate => s.geometry.overlaps_cube_approx(center, half_extent),
      })
      .map(|s| {
        let (location, normal) = s.geometry.surface_at(center);
        SurfaceHit {
          location,
          normal,
          material: s.material.clone(),
          actor: s.actor,
        }
      })
  }
}
