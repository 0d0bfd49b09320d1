//! Sensor-frame spherical coordinates and a fast atan2.

use std::f64::consts::{FRAC_PI_4, PI};

use glam::DVec3;

/// Polynomial `atan2` approximation in degrees.
///
/// Max error is well below the smallest bin width used by any sonar, and it
/// avoids the libm call in the culling hot loop.
#[inline]
pub fn atan2_approx(y: f64, x: f64) -> f64 {
  let abs_y = y.abs() + 1e-10;
  let (r, base) = if x < 0.0 {
    ((x + abs_y) / (abs_y - x), 3.0 * FRAC_PI_4)
  } else {
    ((x - abs_y) / (x + abs_y), FRAC_PI_4)
  };
  let angle = (base + (0.1963 * r * r - 0.9817) * r) * 180.0 / PI;
  if y < 0.0 {
    -angle
  } else {
    angle
  }
}

/// Position of a point as seen from the sensor.
///
/// For fan beams `azimuth` is the horizontal angle (positive toward -Y) and
/// `elevation` is measured from +Z (90 = horizontal). For cone beams
/// `azimuth` holds the central angle around +X and `elevation` the opening
/// angle off +X.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spherical {
  pub range: f64,
  pub azimuth: f64,
  pub elevation: f64,
}

/// Inverse of the fan-beam convention: spherical to sensor-local Cartesian.
pub fn fan_to_local(s: Spherical) -> DVec3 {
  let az = s.azimuth.to_radians();
  let el = s.elevation.to_radians();
  DVec3::new(
    s.range * el.sin() * az.cos(),
    -s.range * el.sin() * az.sin(),
    s.range * el.cos(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_atan2_approx_close_to_exact() {
    for i in -50..=50 {
      for j in -50..=50 {
        let (y, x) = (i as f64 * 0.37, j as f64 * 0.29);
        if x == 0.0 && y == 0.0 {
          continue;
        }
        let exact = y.atan2(x).to_degrees();
        let approx = atan2_approx(y, x);
        assert!((exact - approx).abs() < 0.1, "atan2({y}, {x}): {exact} vs {approx}");
      }
    }
  }

  #[test]
  fn test_atan2_approx_quadrants() {
    assert!(atan2_approx(0.0, 1.0).abs() < 1e-6);
    assert!((atan2_approx(1.0, 0.0) - 90.0).abs() < 0.1);
    assert!((atan2_approx(-1.0, 0.0) + 90.0).abs() < 0.1);
    assert!((atan2_approx(0.0, -1.0) - 180.0).abs() < 0.1);
  }

  #[test]
  fn test_fan_to_local_axes() {
    let ahead = fan_to_local(Spherical {
      range: 2.0,
      azimuth: 0.0,
      elevation: 90.0,
    });
    assert!((ahead - DVec3::new(2.0, 0.0, 0.0)).length() < 1e-12);

    // Positive azimuth is toward -Y.
    let left = fan_to_local(Spherical {
      range: 1.0,
      azimuth: 90.0,
      elevation: 90.0,
    });
    assert!((left - DVec3::NEG_Y).length() < 1e-12);
  }
}
