//! Sensor front end: tick scheduling, generator state and the capture
//! pipeline.
//!
//! ```text
//! cull -> collect leaves -> bin -> shadow -> accumulate -> multipath
//!      -> normalize + noise -> streaks -> overlay
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};
use web_time::Instant;

use super::collect::find_leaves;
use super::config::{SonarConfig, SonarKind};
use super::culling::BeamCuller;
use super::debug::DebugOverlay;
use super::image::{accumulate, apply_streaks, normalize, ImageAccumulator};
use super::multipath::{add_multipath, MultipathStats};
use super::shadow::{bin_hits, resolve_shadows};
use crate::error::Result;
use crate::index::EnvironmentIndex;
use crate::metrics::{CaptureStats, SonarMetrics};
use crate::octree::OctreeConfig;
use crate::oracle::ActorId;
use crate::pose::SensorPose;

/// A simulated sensor driven by the host once per simulation step.
pub trait SonarSensor: Send {
  fn kind(&self) -> SonarKind;

  /// Replace the settings from a JSON payload. Resets generators and the
  /// tick counter.
  fn configure(&mut self, json: &str, octree: &OctreeConfig) -> Result<()>;

  /// Advance one simulation step. Returns the new image on capture ticks.
  fn tick(&mut self, index: &mut EnvironmentIndex, pose: &SensorPose, dt: f64) -> Option<&[f32]>;

  /// Most recent image; zeros before the first capture.
  fn image(&self) -> &[f32];
}

/// Main and multipath generators, both derived from one master seed.
fn generators(seed: Option<u64>) -> (StdRng, StdRng) {
  let mut master = match seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_os_rng(),
  };
  let main = StdRng::from_rng(&mut master);
  let multipath = StdRng::from_rng(&mut master);
  (main, multipath)
}

/// Sonar sensor of any [`SonarKind`].
pub struct Sonar {
  config: SonarConfig,
  owner: Option<ActorId>,
  rng: StdRng,
  multipath_rng: StdRng,
  acc: ImageAccumulator,
  image: Vec<f32>,
  ticks: u64,
  primed: bool,
  dt: f64,
  last: CaptureStats,
  overlay: Option<DebugOverlay>,
  metrics: SonarMetrics,
}

impl Sonar {
  /// Parse `json` settings for `kind` against the index's octree sizes.
  pub fn new(kind: SonarKind, json: &str, octree: &OctreeConfig) -> Result<Self> {
    Ok(Self::from_config(SonarConfig::from_json(json, kind, octree.min_size)?))
  }

  pub fn from_config(config: SonarConfig) -> Self {
    let (rng, multipath_rng) = generators(config.seed);
    let len = config.image_len();
    info!(
      kind = ?config.kind,
      range_bins = config.range.bins,
      azimuth_bins = config.azimuth.bins,
      elevation_bins = config.elevation.bins,
      multipath = config.multipath.is_some(),
      "sonar configured"
    );
    Self {
      config,
      owner: None,
      rng,
      multipath_rng,
      acc: ImageAccumulator::new(len),
      image: vec![0.0; len],
      ticks: 0,
      primed: false,
      dt: 0.0,
      last: CaptureStats::default(),
      overlay: None,
      metrics: SonarMetrics::new(),
    }
  }

  /// Attach the sensor to an agent; that agent's tree is never observed.
  pub fn with_owner(mut self, owner: ActorId) -> Self {
    self.owner = Some(owner);
    self
  }

  pub fn config(&self) -> &SonarConfig {
    &self.config
  }

  /// Counters of the most recent capture.
  pub fn last_capture(&self) -> &CaptureStats {
    &self.last
  }

  /// Debug geometry of the most recent capture, if enabled.
  pub fn debug_overlay(&self) -> Option<&DebugOverlay> {
    self.overlay.as_ref()
  }

  pub fn metrics(&self) -> &SonarMetrics {
    &self.metrics
  }

  /// Run one full capture regardless of the tick schedule.
  #[tracing::instrument(skip_all, name = "sonar::capture", fields(kind = ?self.config.kind))]
  pub fn capture(&mut self, index: &mut EnvironmentIndex, pose: &SensorPose) -> &[f32] {
    let start = Instant::now();
    let config = &self.config;
    let culler = BeamCuller::new(config, pose);

    let collected = find_leaves(index, &culler, self.owner);
    let leaves = collected.hits.len();
    let mut bins = bin_hits(config, collected.hits);
    resolve_shadows(&mut bins, config.water_impedance, config.shadow_epsilon);
    let visible = bins.iter().map(Vec::len).sum();

    self.acc.reset();
    accumulate(config, &mut bins, &mut self.acc, &mut self.rng);
    let multipath = match &config.multipath {
      Some(mp) => add_multipath(config, mp, &culler, &bins, &mut self.acc, &mut self.multipath_rng),
      None => MultipathStats::default(),
    };
    normalize(config, &self.acc, &mut self.rng, &mut self.image);
    apply_streaks(config, &self.acc, &mut self.image);
    self.overlay = DebugOverlay::for_capture(config, pose, &bins, self.dt);

    self.last = CaptureStats {
      cells: collected.cells,
      agents: collected.agents,
      leaves,
      visible,
      clusters: multipath.clusters,
      valid_clusters: multipath.valid,
      elapsed_us: start.elapsed().as_micros() as u64,
    };
    self.metrics.record_capture(&self.last);
    debug!(
      cells = self.last.cells,
      agents = self.last.agents,
      leaves,
      visible,
      clusters = multipath.clusters,
      valid_clusters = multipath.valid,
      elapsed_us = self.last.elapsed_us,
      "sonar capture"
    );
    &self.image
  }
}

impl SonarSensor for Sonar {
  fn kind(&self) -> SonarKind {
    self.config.kind
  }

  fn configure(&mut self, json: &str, octree: &OctreeConfig) -> Result<()> {
    let config = SonarConfig::from_json(json, self.config.kind, octree.min_size)?;
    let owner = self.owner;
    *self = Self::from_config(config);
    self.owner = owner;
    Ok(())
  }

  fn tick(&mut self, index: &mut EnvironmentIndex, pose: &SensorPose, dt: f64) -> Option<&[f32]> {
    if !self.primed {
      self.primed = true;
      index.prebuild(pose.position, self.config.init_octree_range);
    }
    self.dt = dt;
    self.ticks += 1;
    if self.ticks % u64::from(self.config.ticks_per_capture) != 0 {
      return None;
    }
    Some(self.capture(index, pose))
  }

  fn image(&self) -> &[f32] {
    &self.image
  }
}

#[cfg(test)]
#[path = "sensor_test.rs"]
mod sensor_test;
