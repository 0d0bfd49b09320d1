//! Shadowing: within each azimuth/elevation bin only the nearest surface
//! cluster reflects.

use std::cmp::Ordering;

use rayon::prelude::*;

use super::collect::LeafHit;
use super::config::SonarConfig;

/// Assign angular bins and group hits by shadow bin.
pub fn bin_hits(config: &SonarConfig, hits: Vec<LeafHit>) -> Vec<Vec<LeafHit>> {
  let mut bins = vec![Vec::new(); config.shadow_bins()];
  for mut hit in hits {
    hit.azimuth_bin = config.azimuth.index(hit.spherical.azimuth);
    hit.elevation_bin = config.elevation.index(hit.spherical.elevation);
    bins[config.shadow_index(hit.azimuth_bin, hit.elevation_bin)].push(hit);
  }
  bins
}

/// Total order by range, ties broken by position so the result does not
/// depend on collection order.
fn by_range(a: &LeafHit, b: &LeafHit) -> Ordering {
  a.spherical
    .range
    .total_cmp(&b.spherical.range)
    .then_with(|| a.center.x.total_cmp(&b.center.x))
    .then_with(|| a.center.y.total_cmp(&b.center.y))
    .then_with(|| a.center.z.total_cmp(&b.center.z))
}

/// Sort every bin nearest first, compute reflected values and drop
/// everything behind the first gap wider than `epsilon`.
#[tracing::instrument(skip_all, name = "sonar::shadow")]
pub fn resolve_shadows(bins: &mut [Vec<LeafHit>], water_impedance: f64, epsilon: f64) {
  bins
    .par_iter_mut()
    .for_each(|bin| shadow_bin(bin, water_impedance, epsilon));
}

fn shadow_bin(bin: &mut Vec<LeafHit>, water_impedance: f64, epsilon: f64) {
  bin.sort_by(by_range);
  let mut keep = bin.len();
  for j in 0..bin.len() {
    let r = bin[j].reflection(water_impedance);
    bin[j].value = r * r * bin[j].cos;
    if let Some(next) = bin.get(j + 1) {
      if (next.spherical.range - bin[j].spherical.range).abs() > epsilon {
        keep = j + 1;
        break;
      }
    }
  }
  bin.truncate(keep);
}

#[cfg(test)]
mod tests {
  use glam::DVec3;

  use super::*;
  use crate::sonar::angles::Spherical;

  const WATER: f64 = 1000.0;

  fn hit(range: f64, x: f64) -> LeafHit {
    LeafHit {
      center: DVec3::new(x, 0.0, 0.0),
      normal: DVec3::X,
      // R = 0.5
      impedance: 3.0 * WATER,
      spherical: Spherical {
        range,
        azimuth: 0.0,
        elevation: 90.0,
      },
      incident: DVec3::X,
      cos: 1.0,
      value: 0.0,
      range_bin: 0,
      azimuth_bin: 0,
      elevation_bin: 0,
    }
  }

  #[test]
  fn test_truncates_after_first_gap() {
    let mut bin = vec![hit(3.0, 3.0), hit(1.0, 1.0), hit(1.05, 1.05), hit(5.0, 5.0)];
    shadow_bin(&mut bin, WATER, 0.4);
    let ranges: Vec<f64> = bin.iter().map(|h| h.spherical.range).collect();
    assert_eq!(ranges, vec![1.0, 1.05]);
    for h in &bin {
      assert!((h.value - 0.25).abs() < 1e-12);
    }
  }

  #[test]
  fn test_no_gap_keeps_everything() {
    let mut bin = vec![hit(1.0, 1.0), hit(1.3, 1.3), hit(1.6, 1.6)];
    shadow_bin(&mut bin, WATER, 0.4);
    assert_eq!(bin.len(), 3);
  }

  #[test]
  fn test_single_leaf_gets_value() {
    let mut bin = vec![hit(2.0, 2.0)];
    shadow_bin(&mut bin, WATER, 0.4);
    assert_eq!(bin.len(), 1);
    assert!((bin[0].value - 0.25).abs() < 1e-12);
  }

  /// Equal ranges are ordered by position, whatever the input order.
  #[test]
  fn test_order_independent() {
    let a = vec![hit(1.0, 0.2), hit(1.0, -0.2), hit(1.2, 0.0)];
    let mut b = a.clone();
    b.reverse();
    let mut a = a;
    shadow_bin(&mut a, WATER, 0.4);
    shadow_bin(&mut b, WATER, 0.4);
    assert_eq!(a, b);
    assert_eq!(a[0].center.x, -0.2);
  }
}
