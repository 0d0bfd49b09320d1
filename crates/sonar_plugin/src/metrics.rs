//! Engine-agnostic per-sensor capture statistics.
//!
//! Feature-gated and runtime-toggled; recording is a no-op unless the crate
//! is built with `--features metrics` and [`COLLECT_METRICS`] is set.
//!
//! # Usage
//!
//! ```ignore
//! use sonar_plugin::metrics::COLLECT_METRICS;
//!
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let m = sonar.metrics();
//! println!("{:.1} us per capture, {:.0}% leaves visible", m.avg_capture_us(), 100.0 * m.visible_ratio());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Captures kept per sensor.
pub const HISTORY_LEN: usize = 128;

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Counters of a single capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
  /// Cache cells searched.
  pub cells: usize,
  /// Agent trees searched.
  pub agents: usize,
  /// Sensor-facing leaves inside the beam.
  pub leaves: usize,
  /// Leaves left after shadowing.
  pub visible: usize,
  pub clusters: usize,
  pub valid_clusters: usize,
  pub elapsed_us: u64,
}

/// The last [`HISTORY_LEN`] captures of one sensor, oldest first.
#[derive(Debug, Clone)]
pub struct SonarMetrics {
  history: VecDeque<CaptureStats>,
  capacity: usize,
  /// Captures recorded this session, including evicted ones.
  pub total_captures: u64,
}

impl Default for SonarMetrics {
  fn default() -> Self {
    Self::with_capacity(HISTORY_LEN)
  }
}

impl SonarMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      history: VecDeque::with_capacity(capacity),
      capacity: capacity.max(1),
      total_captures: 0,
    }
  }

  pub fn record_capture(&mut self, stats: &CaptureStats) {
    if !is_enabled() {
      return;
    }
    if self.history.len() >= self.capacity {
      self.history.pop_front();
    }
    self.history.push_back(*stats);
    self.total_captures += 1;
  }

  pub fn history(&self) -> impl Iterator<Item = &CaptureStats> {
    self.history.iter()
  }

  pub fn last(&self) -> Option<&CaptureStats> {
    self.history.back()
  }

  pub fn len(&self) -> usize {
    self.history.len()
  }

  pub fn is_empty(&self) -> bool {
    self.history.is_empty()
  }

  pub fn avg_capture_us(&self) -> f64 {
    if self.history.is_empty() {
      return 0.0;
    }
    let total: u64 = self.history.iter().map(|s| s.elapsed_us).sum();
    total as f64 / self.history.len() as f64
  }

  /// Fastest and slowest capture in the window.
  pub fn capture_us_range(&self) -> Option<(u64, u64)> {
    let min = self.history.iter().map(|s| s.elapsed_us).min()?;
    let max = self.history.iter().map(|s| s.elapsed_us).max()?;
    Some((min, max))
  }

  /// Share of collected leaves surviving shadowing.
  pub fn visible_ratio(&self) -> f64 {
    ratio(self.history.iter().map(|s| (s.visible, s.leaves)))
  }

  /// Share of multipath clusters that produced an echo.
  pub fn multipath_ratio(&self) -> f64 {
    ratio(self.history.iter().map(|s| (s.valid_clusters, s.clusters)))
  }

  /// Clear the window; `total_captures` is cumulative and kept.
  pub fn reset(&mut self) {
    self.history.clear();
  }
}

fn ratio(pairs: impl Iterator<Item = (usize, usize)>) -> f64 {
  let (part, whole) = pairs.fold((0usize, 0usize), |(p, w), (a, b)| (p + a, w + b));
  match whole {
    0 => 0.0,
    whole => part as f64 / whole as f64,
  }
}
