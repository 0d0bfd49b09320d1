//! Debug geometry for hosts to draw: beam outline and retained leaves.

use glam::DVec3;

use super::angles::{fan_to_local, Spherical};
use super::collect::LeafHit;
use super::config::{BeamShape, SonarConfig};
use crate::pose::SensorPose;

/// Generators drawn for conical beams.
const CONE_SIDES: usize = 6;

/// World-space lines and points produced by one capture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugOverlay {
  pub lines: Vec<[DVec3; 2]>,
  pub points: Vec<DVec3>,
  /// Seconds the host should keep drawing this overlay.
  pub lifetime: f64,
}

impl DebugOverlay {
  pub fn is_empty(&self) -> bool {
    self.lines.is_empty() && self.points.is_empty()
  }

  /// Overlay for a capture, or None when neither view option is enabled.
  ///
  /// `bins` are the shadowed hits of the capture.
  pub fn for_capture(config: &SonarConfig, pose: &SensorPose, bins: &[Vec<LeafHit>], dt: f64) -> Option<Self> {
    if !config.view_region && config.view_octree.is_none() {
      return None;
    }
    let mut overlay = Self {
      lifetime: dt * f64::from(config.ticks_per_capture),
      ..Default::default()
    };
    if config.view_region {
      overlay.lines = region_lines(config, pose);
    }
    if let Some(view) = config.view_octree {
      overlay.points = bins
        .iter()
        .flatten()
        .filter(|hit| view < 0 || hit.azimuth_bin as i64 == view)
        .map(|hit| hit.center)
        .collect();
    }
    Some(overlay)
  }
}

/// Outline of the beam volume.
pub fn region_lines(config: &SonarConfig, pose: &SensorPose) -> Vec<[DVec3; 2]> {
  let (near, far) = (config.range_min, config.range_max);
  let world = |p: DVec3| pose.local_to_world(p);

  match config.beam {
    BeamShape::Fan { azimuth, elevation } => {
      let corner = |range: f64, az: f64, el: f64| {
        world(fan_to_local(Spherical {
          range,
          azimuth: az * azimuth / 2.0,
          elevation: 90.0 + el * elevation / 2.0,
        }))
      };
      let mut lines = Vec::with_capacity(12);
      for (az, el) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)] {
        lines.push([corner(near, az, el), corner(far, az, el)]);
      }
      for range in [near, far] {
        lines.push([corner(range, -1.0, -1.0), corner(range, 1.0, -1.0)]);
        lines.push([corner(range, -1.0, 1.0), corner(range, 1.0, 1.0)]);
        lines.push([corner(range, -1.0, -1.0), corner(range, -1.0, 1.0)]);
        lines.push([corner(range, 1.0, -1.0), corner(range, 1.0, 1.0)]);
      }
      lines
    }
    BeamShape::Cone { opening } => {
      let half = (opening / 2.0).to_radians();
      let generator = |range: f64, side: usize| {
        let roll = (side % CONE_SIDES) as f64 * std::f64::consts::TAU / CONE_SIDES as f64;
        world(range * DVec3::new(half.cos(), half.sin() * roll.cos(), half.sin() * roll.sin()))
      };
      let mut lines = Vec::with_capacity(CONE_SIDES * 2);
      for side in 0..CONE_SIDES {
        lines.push([generator(near, side), generator(far, side)]);
        lines.push([generator(far, side), generator(far, side + 1)]);
      }
      lines
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sonar::config::SonarKind;

  fn hit(azimuth_bin: usize, x: f64) -> LeafHit {
    LeafHit {
      center: DVec3::new(x, 0.0, 0.0),
      normal: DVec3::NEG_X,
      impedance: 3000.0,
      spherical: Spherical::default(),
      incident: DVec3::NEG_X,
      cos: 1.0,
      value: 0.25,
      range_bin: 0,
      azimuth_bin,
      elevation_bin: 0,
    }
  }

  #[test]
  fn test_disabled_by_default() {
    let config = SonarConfig::from_json("", SonarKind::Imaging, 0.1).unwrap();
    assert!(DebugOverlay::for_capture(&config, &SensorPose::default(), &[], 0.1).is_none());
  }

  #[test]
  fn test_fan_region_lines() {
    let config = SonarConfig::from_json(r#"{"ViewRegion": true, "TicksPerCapture": 3}"#, SonarKind::Imaging, 0.1).unwrap();
    let pose = SensorPose::from_position(DVec3::new(0.0, 0.0, 2.0));
    let overlay = DebugOverlay::for_capture(&config, &pose, &[], 0.5).unwrap();
    assert_eq!(overlay.lines.len(), 12);
    assert!(overlay.points.is_empty());
    assert_eq!(overlay.lifetime, 1.5);
    // Radial edges span RangeMin..RangeMax from the sensor.
    let [a, b] = overlay.lines[0];
    assert!((a.distance(pose.position) - config.range_min).abs() < 1e-9);
    assert!((b.distance(pose.position) - config.range_max).abs() < 1e-9);
  }

  #[test]
  fn test_cone_region_lines() {
    let config = SonarConfig::from_json(r#"{"ViewRegion": true}"#, SonarKind::Singlebeam, 0.1).unwrap();
    let lines = region_lines(&config, &SensorPose::default());
    assert_eq!(lines.len(), 2 * CONE_SIDES);
    let half = 15f64.to_radians();
    for [a, b] in &lines {
      for p in [a, b] {
        let off_axis = p.y.hypot(p.z).atan2(p.x);
        assert!((off_axis - half).abs() < 1e-9);
      }
    }
  }

  #[test]
  fn test_view_octree_filters_azimuth_bin() {
    let bins = vec![vec![hit(3, 1.0), hit(4, 2.0)], vec![hit(3, 3.0)]];
    let all = SonarConfig::from_json(r#"{"ViewOctree": -1}"#, SonarKind::Imaging, 0.1).unwrap();
    let one = SonarConfig::from_json(r#"{"ViewOctree": 3}"#, SonarKind::Imaging, 0.1).unwrap();
    let pose = SensorPose::default();

    let overlay = DebugOverlay::for_capture(&all, &pose, &bins, 0.1).unwrap();
    assert_eq!(overlay.points.len(), 3);
    assert!(overlay.lines.is_empty());

    let overlay = DebugOverlay::for_capture(&one, &pose, &bins, 0.1).unwrap();
    assert_eq!(overlay.points, vec![DVec3::new(1.0, 0.0, 0.0), DVec3::new(3.0, 0.0, 0.0)]);
  }
}
