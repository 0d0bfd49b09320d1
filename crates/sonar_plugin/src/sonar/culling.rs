//! Beam culling: is a node (possibly) inside the sensor's field of view?
//!
//! Coarse nodes are tested against a padded beam: the apex is pulled back
//! along the forward axis by `radius / sin(half_angle)` so any cube whose
//! bounding sphere touches the real beam passes.

use glam::{DQuat, DVec3};

use super::angles::{atan2_approx, Spherical};
use super::config::{BeamShape, SonarConfig};
use crate::pose::SensorPose;

const SQRT3_2: f64 = 0.866_025_403_784_438_6;

/// Beam bounds for one capture, in the sensor frame.
#[derive(Clone, Copy, Debug)]
pub struct BeamCuller {
  origin: DVec3,
  inverse_rotation: DQuat,
  forward: DVec3,
  shape: BeamShape,
  range_min: f64,
  range_max: f64,
  sin_offset: f64,
}

impl BeamCuller {
  pub fn new(config: &SonarConfig, pose: &SensorPose) -> Self {
    Self {
      origin: pose.position,
      inverse_rotation: pose.rotation.inverse(),
      forward: pose.forward(),
      shape: config.beam,
      range_min: config.range_min,
      range_max: config.range_max,
      sin_offset: config.sin_offset,
    }
  }

  #[inline]
  pub fn origin(&self) -> DVec3 {
    self.origin
  }

  /// Test a node center. `size` is the edge length of a coarse node, or None
  /// for leaf-sized points, which are tested against the exact beam.
  ///
  /// Returns the spherical coordinate relative to the (padded) apex.
  pub fn in_range(&self, center: DVec3, size: Option<f64>) -> Option<Spherical> {
    let (radius, offset) = match size {
      Some(size) => {
        let radius = size * SQRT3_2;
        (radius, radius / self.sin_offset)
      }
      None => (0.0, 0.0),
    };
    let apex = self.origin - self.forward * offset;
    let local = self.inverse_rotation * (center - apex);

    let range = local.length();
    if self.range_min + offset - radius >= range || range >= self.range_max + offset + radius {
      return None;
    }

    match self.shape {
      BeamShape::Fan { azimuth, elevation } => {
        let az = atan2_approx(-local.y, local.x);
        if -azimuth / 2.0 >= az || az >= azimuth / 2.0 {
          return None;
        }
        let el = atan2_approx(local.x.hypot(local.y), local.z);
        if 90.0 - elevation / 2.0 >= el || el >= 90.0 + elevation / 2.0 {
          return None;
        }
        Some(Spherical {
          range,
          azimuth: az,
          elevation: el,
        })
      }
      BeamShape::Cone { opening } => {
        let off_axis = atan2_approx(local.y.hypot(local.z), local.x);
        if 0.0 >= off_axis || off_axis >= opening / 2.0 {
          return None;
        }
        Some(Spherical {
          range,
          azimuth: atan2_approx(local.z, local.y),
          elevation: off_axis,
        })
      }
    }
  }

  /// Spherical coordinate of a point from the true apex, without bounds checks.
  pub fn locate(&self, point: DVec3) -> Spherical {
    let local = self.inverse_rotation * (point - self.origin);
    let range = local.length();
    match self.shape {
      BeamShape::Fan { .. } => Spherical {
        range,
        azimuth: atan2_approx(-local.y, local.x),
        elevation: atan2_approx(local.x.hypot(local.y), local.z),
      },
      BeamShape::Cone { .. } => Spherical {
        range,
        azimuth: atan2_approx(local.z, local.y),
        elevation: atan2_approx(local.y.hypot(local.z), local.x),
      },
    }
  }
}
