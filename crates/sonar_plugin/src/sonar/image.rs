//! Image formation: bin accumulation, normalization and noise.
//!
//! Output layouts:
//!
//! ```text
//! imaging / profiling   [range][azimuth]   RangeBins * AzimuthBins
//! sidescan              [range]            port half mirrored, starboard half
//! singlebeam            [range]
//! ```

use rand::Rng;

use super::collect::LeafHit;
use super::config::{BeamShape, SonarConfig, SonarKind, StreakMode};
use crate::constants::{PERFECT_NORMAL_ANGLE, STREAK_THRESHOLD};

/// Dense per-capture accumulators.
#[derive(Clone, Debug, Default)]
pub struct ImageAccumulator {
  intensity: Vec<f64>,
  count: Vec<u32>,
  perfect: Vec<u32>,
}

impl ImageAccumulator {
  pub fn new(len: usize) -> Self {
    Self {
      intensity: vec![0.0; len],
      count: vec![0; len],
      perfect: vec![0; len],
    }
  }

  pub fn reset(&mut self) {
    self.intensity.fill(0.0);
    self.count.fill(0);
    self.perfect.fill(0);
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.count.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.count.is_empty()
  }

  #[inline]
  pub fn add(&mut self, idx: usize, value: f64, perfect: bool) {
    self.intensity[idx] += value;
    self.count[idx] += 1;
    if perfect {
      self.perfect[idx] += 1;
    }
  }

  #[inline]
  pub fn count(&self, idx: usize) -> u32 {
    self.count[idx]
  }

  #[inline]
  pub fn intensity(&self, idx: usize) -> f64 {
    self.intensity[idx]
  }

  /// Total returns in all cells.
  pub fn total_count(&self) -> u64 {
    self.count.iter().map(|&c| u64::from(c)).sum()
  }
}

/// Output cell for a hit whose `range_bin` and `azimuth_bin` are set.
pub fn output_index(config: &SonarConfig, range_bin: usize, azimuth_bin: usize) -> usize {
  let bins = config.range.bins;
  match config.kind {
    SonarKind::Imaging | SonarKind::Profiling => range_bin * config.azimuth.bins + azimuth_bin,
    SonarKind::Sidescan => {
      let half = (bins / 2) as isize;
      let r = (range_bin / 2) as isize;
      let idx = if azimuth_bin > config.azimuth.bins / 2 {
        half - r - 1
      } else {
        half + r
      };
      idx.clamp(0, bins as isize - 1) as usize
    }
    SonarKind::Singlebeam => range_bin,
  }
}

/// Add every shadow-surviving hit to the accumulators.
///
/// Sets each hit's `range_bin` from its range plus an exponential range-noise
/// sample. Imaging kinds also weight the value by the sample's density.
#[tracing::instrument(skip_all, name = "sonar::accumulate")]
pub fn accumulate(config: &SonarConfig, bins: &mut [Vec<LeafHit>], acc: &mut ImageAccumulator, rng: &mut impl Rng) {
  let perfect_cos = PERFECT_NORMAL_ANGLE.to_radians().cos();
  let weight_by_pdf = config.kind.is_imaging();
  for hit in bins.iter_mut().flatten() {
    let noise = config.range_noise.sample(rng);
    if weight_by_pdf {
      hit.value *= config.range_noise.scaled_pdf(noise);
    }
    hit.range_bin = config.range.index(hit.spherical.range + noise);
    let idx = output_index(config, hit.range_bin, hit.azimuth_bin);
    acc.add(idx, hit.value, hit.cos > perfect_cos);
  }
}

/// Average each cell, apply multiplicative and additive noise and write the
/// result to `out`.
#[tracing::instrument(skip_all, name = "sonar::normalize")]
pub fn normalize(config: &SonarConfig, acc: &ImageAccumulator, rng: &mut impl Rng, out: &mut [f32]) {
  if config.kind.is_imaging() {
    normalize_image(config, acc, rng, out);
  } else {
    for (i, v) in out.iter_mut().enumerate() {
      let count = acc.count(i);
      let mut value = 0.0;
      if count > 0 {
        value = acc.intensity(i) * (1.0 + config.mult_noise.sample(rng)) / f64::from(count);
      }
      value += config.add_noise.rayleigh(rng);
      *v = value as f32;
    }
  }
}

fn normalize_image(config: &SonarConfig, acc: &ImageAccumulator, rng: &mut impl Rng, out: &mut [f32]) {
  let width = config.azimuth.bins;
  let span = match config.beam {
    BeamShape::Fan { azimuth, .. } => azimuth,
    BeamShape::Cone { .. } => 360.0,
  };
  let lobe = span / 64.0;
  for i in 0..config.range.bins {
    let scale_range = (i as f64 * config.range.res / config.range_max).powi(2);
    for j in 0..width {
      let scale_total = if config.scale_noise {
        let azimuth = config.azimuth.edge(j);
        scale_range * (1.0 + (-azimuth * azimuth / lobe).exp() * 0.5)
      } else {
        1.0
      };

      let idx = i * width + j;
      let count = acc.count(idx);
      let mut value = 0.0;
      if count > 0 {
        value = acc.intensity(idx) * (0.5 + config.mult_noise.sample(rng)) / f64::from(count);
      }
      value += config.add_noise.rayleigh(rng) * scale_total;
      out[idx] = value as f32;
    }
  }
}

/// Square (or complement-square) range rows dominated by returns hitting a
/// surface head-on.
pub fn apply_streaks(config: &SonarConfig, acc: &ImageAccumulator, out: &mut [f32]) {
  if config.streaks == StreakMode::Off || !config.kind.is_imaging() {
    return;
  }
  let width = config.azimuth.bins;
  for (row, values) in out.chunks_mut(width).enumerate() {
    let cells = row * width..(row + 1) * width;
    let perfect: u64 = cells.clone().map(|i| u64::from(acc.perfect[i])).sum();
    let total: u64 = cells.map(|i| u64::from(acc.count[i])).sum();
    if total == 0 || (perfect as f64 / total as f64) < STREAK_THRESHOLD {
      continue;
    }
    for v in values {
      *v = match config.streaks {
        StreakMode::Suppress => *v * *v,
        StreakMode::Emphasize => 1.0 - (1.0 - *v) * (1.0 - *v),
        StreakMode::Off => *v,
      };
    }
  }
}

#[cfg(test)]
#[path = "image_test.rs"]
mod image_test;
