//! OctreeConfig - node sizing, lattice math and cache locations.
//!
//! Node sizes are power-of-two multiples of the minimum size:
//!
//! ```text
//! size(level) = min_size * 2^level
//! ```
//!
//! Every node center lies on a lattice with spacing `min_size / 2`, so
//! centers are stored as integer lattice coordinates and converted to world
//! space in one multiplication. A child center is its parent's
//! `± 2^(level - 1)` lattice units per axis.

use std::path::PathBuf;

use glam::DVec3;

use super::{DAabb3, NodeKey};
use crate::constants::{
  CORNER_EPSILON_FRACTION, DEFAULT_ENVIRONMENT_HALF_EXTENT, DEFAULT_MAX_NODE_SIZE,
  DEFAULT_MIN_NODE_SIZE, ROOTS_FILE,
};
use crate::error::{Result, SonarError};

/// On-disk cache location for one map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheLocation {
  /// Directory holding one subdirectory per map.
  pub root: PathBuf,
  /// Map (level) name.
  pub map: String,
}

/// Configuration shared by the index, the agent trees and every sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeConfig {
  /// Edge length of leaf nodes.
  pub min_size: f64,

  /// Requested cache granularity; rounded up to a power-of-two multiple of
  /// `min_size`.
  pub max_size: f64,

  /// Static environment volume.
  pub bounds: DAabb3,

  /// Half extent of interior-test probe boxes.
  pub corner_epsilon: f64,

  /// Where cells are persisted. `None` disables caching.
  pub cache: Option<CacheLocation>,
}

impl OctreeConfig {
  pub fn new(min_size: f64, max_size: f64, bounds: DAabb3) -> Self {
    Self {
      min_size,
      max_size,
      bounds,
      corner_epsilon: min_size * CORNER_EPSILON_FRACTION,
      cache: None,
    }
  }

  pub fn with_cache(mut self, root: impl Into<PathBuf>, map: impl Into<String>) -> Self {
    self.cache = Some(CacheLocation {
      root: root.into(),
      map: map.into(),
    });
    self
  }

  pub fn with_bounds(mut self, bounds: DAabb3) -> Self {
    self.bounds = bounds;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.min_size.is_finite() && self.min_size > 0.0) {
      return Err(SonarError::InvalidOctree(format!(
        "min_size must be positive, got {}",
        self.min_size
      )));
    }
    if !(self.max_size.is_finite() && self.max_size > 0.0) {
      return Err(SonarError::InvalidOctree(format!(
        "max_size must be positive, got {}",
        self.max_size
      )));
    }
    if !self.bounds.is_valid() {
      return Err(SonarError::InvalidOctree(format!(
        "environment bounds are degenerate: {:?}",
        self.bounds
      )));
    }
    if !(self.corner_epsilon > 0.0 && self.corner_epsilon < self.min_size * 0.5) {
      return Err(SonarError::InvalidOctree(format!(
        "corner_epsilon must be in (0, min_size / 2), got {}",
        self.corner_epsilon
      )));
    }
    Ok(())
  }

  /// Edge length of nodes at `level`.
  #[inline]
  pub fn size_at(&self, level: u32) -> f64 {
    self.min_size * (1u64 << level) as f64
  }

  /// World-space spacing of the center lattice.
  #[inline]
  pub fn lattice_unit(&self) -> f64 {
    self.min_size * 0.5
  }

  /// Smallest level whose size is at least `size`.
  pub fn level_covering(&self, size: f64) -> u32 {
    let mut level = 0;
    while self.size_at(level) < size && level < 62 {
      level += 1;
    }
    level
  }

  /// Level of cache cells (the unit of load/unload and persistence).
  #[inline]
  pub fn cache_level(&self) -> u32 {
    self.level_covering(self.max_size)
  }

  /// Edge length of cache cells.
  #[inline]
  pub fn cache_size(&self) -> f64 {
    self.size_at(self.cache_level())
  }

  /// World-space center of a node.
  #[inline]
  pub fn key_center(&self, key: &NodeKey) -> DVec3 {
    DVec3::new(key.x as f64, key.y as f64, key.z as f64) * self.lattice_unit()
  }

  /// Nearest lattice point to `point`.
  pub fn snap(&self, point: DVec3) -> [i64; 3] {
    let p = (point / self.lattice_unit()).round();
    [p.x as i64, p.y as i64, p.z as i64]
  }

  /// Key of a cube that covers `bounds` and is centered on the lattice.
  ///
  /// The level is never below `min_level`.
  pub fn covering_key(&self, bounds: &DAabb3, min_level: u32) -> NodeKey {
    let [x, y, z] = self.snap(bounds.center());
    let center = DVec3::new(x as f64, y as f64, z as f64) * self.lattice_unit();
    let needed = 2.0 * bounds.cube_half_extent_from(center);
    let level = self.level_covering(needed).max(min_level);
    NodeKey::new(x, y, z, level)
  }

  /// Key of the environment root.
  #[inline]
  pub fn root_key(&self) -> NodeKey {
    self.covering_key(&self.bounds, self.cache_level())
  }

  /// `{root}/{map}/{min}_{max}`, if caching is enabled.
  pub fn cache_dir(&self) -> Option<PathBuf> {
    self.cache.as_ref().map(|c| {
      c.root
        .join(&c.map)
        .join(format!("{}_{}", self.min_size, self.cache_size()))
    })
  }

  /// File of a cache cell. `None` for nodes that are not cells.
  pub fn cell_path(&self, key: &NodeKey) -> Option<PathBuf> {
    if key.level != self.cache_level() {
      return None;
    }
    self
      .cache_dir()
      .map(|dir| dir.join(format!("{}_{}_{}.json", key.x, key.y, key.z)))
  }

  /// File holding the index structure above the cells.
  pub fn roots_path(&self) -> Option<PathBuf> {
    self.cache_dir().map(|dir| dir.join(ROOTS_FILE))
  }
}

impl Default for OctreeConfig {
  fn default() -> Self {
    Self::new(
      DEFAULT_MIN_NODE_SIZE,
      DEFAULT_MAX_NODE_SIZE,
      DAabb3::from_center_half_extents(DVec3::ZERO, DVec3::splat(DEFAULT_ENVIRONMENT_HALF_EXTENT)),
    )
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
