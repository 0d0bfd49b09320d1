//! Multipath: second-bounce returns for imaging sonars.
//!
//! Returns are grouped into clusters of neighbouring bins with agreeing
//! normals. For each cluster the seed's specular reflection is raymarched
//! through the bin grid of the current capture; if it lands on another
//! return facing back toward the sensor, every member of the cluster
//! contributes a delayed, weaker echo via that surface.
//!
//! Randomness comes from a dedicated generator, and a failed cluster adds
//! nothing, so a capture whose clusters all fail is bit-identical to one
//! with multipath disabled.

use std::collections::BTreeMap;

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use smallvec::SmallVec;

use super::collect::LeafHit;
use super::config::{MultipathConfig, SonarConfig};
use super::culling::BeamCuller;
use super::image::{output_index, ImageAccumulator};

type BinKey = [usize; 3];
type Cluster = SmallVec<[LeafHit; 8]>;

/// Per-capture multipath counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MultipathStats {
  pub clusters: usize,
  pub valid: usize,
}

/// Mirror `v` about `normal`.
#[inline]
fn reflect(normal: DVec3, v: DVec3) -> DVec3 {
  -v + 2.0 * normal.dot(v) * normal
}

/// Representative returns keyed by (range, azimuth, elevation) bin: the
/// nearest return of every shadow bin plus each later one in a new range bin.
fn surface_map(bins: &[Vec<LeafHit>]) -> BTreeMap<BinKey, LeafHit> {
  let mut map = BTreeMap::new();
  for bin in bins {
    let Some(first) = bin.first() else {
      continue;
    };
    map.insert(key(first), *first);
    let mut last_range = first.range_bin;
    for hit in &bin[1..] {
      if hit.range_bin != last_range {
        map.insert(key(hit), *hit);
        last_range = hit.range_bin;
      }
    }
  }
  map
}

#[inline]
fn key(hit: &LeafHit) -> BinKey {
  [hit.range_bin, hit.azimuth_bin, hit.elevation_bin]
}

/// Greedy clustering, smallest key first.
fn clusters(config: &SonarConfig, mp: &MultipathConfig, map: &BTreeMap<BinKey, LeafHit>) -> Vec<Cluster> {
  let mut search = map.clone();
  let mut out = Vec::new();
  let limits = [config.range.bins, config.azimuth.bins, config.elevation.bins];
  let s = mp.cluster_size;

  while let Some((seed_key, seed)) = search.pop_first() {
    let mut cluster: Cluster = SmallVec::new();
    cluster.push(seed);
    let span = |axis: usize| seed_key[axis].saturating_sub(s)..(seed_key[axis] + s + 1).min(limits[axis]);
    for i in span(0) {
      for j in span(1) {
        for k in span(2) {
          let near = [i, j, k];
          if let Some(close) = search.get(&near) {
            if seed.normal.dot(close.normal) > mp.normal_threshold {
              cluster.push(*close);
              search.remove(&near);
            }
          }
        }
      }
    }
    out.push(cluster);
  }
  out
}

/// March the seed's reflection until it hits a mapped return.
fn trace_seed<'m>(
  config: &SonarConfig,
  mp: &MultipathConfig,
  culler: &BeamCuller,
  map: &'m BTreeMap<BinKey, LeafHit>,
  seed: &LeafHit,
) -> Option<&'m LeafHit> {
  let reflection = reflect(seed.normal, seed.incident);
  let mut offset = reflection * mp.step_size * mp.start_steps as f64;
  for _ in 0..mp.iterations {
    offset += reflection * mp.step_size;
    let s = culler.in_range(seed.center + offset, None)?;
    let probe = [
      config.range.index(s.range),
      config.azimuth.index(s.azimuth),
      config.elevation.index(s.elevation),
    ];
    if let Some(hit) = map.get(&probe) {
      let back = reflect(hit.normal, -reflection);
      return (back.dot(hit.incident) > 0.0).then_some(hit);
    }
  }
  None
}

/// Echo contributions `(output index, value)` of one cluster via `via`.
fn echoes(
  config: &SonarConfig,
  culler: &BeamCuller,
  cluster: &Cluster,
  via: &LeafHit,
  rng: &mut impl Rng,
) -> Vec<(usize, f64)> {
  let r2 = via.reflection(config.water_impedance);
  let mut out = Vec::with_capacity(cluster.len());
  for member in cluster {
    let reflection = reflect(member.normal, member.incident);
    let t = (via.center - member.center).dot(via.normal) / reflection.dot(via.normal);
    if !t.is_finite() {
      continue;
    }
    let bounce = member.center + reflection * t;
    let back = reflect(via.normal, -reflection);

    let seen = culler.locate(bounce);
    let range = (seen.range + member.spherical.range + bounce.distance(member.center)) / 2.0;
    let noise = config.range_noise.sample(rng);
    let pdf = config.range_noise.scaled_pdf(noise);

    let r1 = member.reflection(config.water_impedance);
    // Unclamped: a member whose echo leaves `via` away from the sensor
    // subtracts intensity.
    let cos = back.dot(via.incident);
    let value = r1 * r1 * r2 * r2 * cos * pdf;

    let range_bin = config.range.index(range + noise);
    let azimuth_bin = config.azimuth.index(seen.azimuth);
    out.push((output_index(config, range_bin, azimuth_bin), value));
  }
  out
}

/// Add multipath echoes of the shadowed, accumulated `bins` to `acc`.
#[tracing::instrument(skip_all, name = "sonar::multipath")]
pub fn add_multipath(
  config: &SonarConfig,
  mp: &MultipathConfig,
  culler: &BeamCuller,
  bins: &[Vec<LeafHit>],
  acc: &mut ImageAccumulator,
  rng: &mut StdRng,
) -> MultipathStats {
  let map = surface_map(bins);
  let clusters = clusters(config, mp, &map);
  let seeds: Vec<u64> = clusters.iter().map(|_| rng.random()).collect();

  let results: Vec<Option<Vec<(usize, f64)>>> = clusters
    .par_iter()
    .zip(seeds)
    .map(|(cluster, seed)| {
      let via = trace_seed(config, mp, culler, &map, &cluster[0])?;
      let mut rng = StdRng::seed_from_u64(seed);
      Some(echoes(config, culler, cluster, via, &mut rng))
    })
    .collect();

  let mut stats = MultipathStats {
    clusters: clusters.len(),
    valid: 0,
  };
  for contributions in results.into_iter().flatten() {
    stats.valid += 1;
    for (idx, value) in contributions {
      acc.add(idx, value, false);
    }
  }
  stats
}
