//! Test utilities shared by the octree, index and sonar tests.
//!
//! Provides analytic scenes and an owning build fixture.

use glam::DVec3;

use crate::material::MaterialTable;
use crate::octree::{BuildContext, DAabb3, OctreeConfig};
use crate::oracle::ActorFilter;
use crate::shapes::{Geometry, SceneOracle, SceneShape};

// =============================================================================
// Scenes
// =============================================================================

/// Seafloor height used by the floor scenes. Deliberately off the node
/// lattice so no leaf face coincides with the surface.
pub const FLOOR_Z: f64 = -0.03;

/// Rock/sand materials used throughout the tests.
pub fn materials() -> MaterialTable {
  MaterialTable::new()
    .with_material("rock", 2600.0, 4000.0)
    .with_material("sand", 1900.0, 1650.0)
}

/// Flat sand seafloor at [`FLOOR_Z`].
pub fn floor_scene() -> SceneOracle {
  SceneOracle::new().with_shape(SceneShape::new(Geometry::floor(FLOOR_Z), "sand"))
}

/// 0.1 m leaves, 0.4 m cells, environment of +-0.8 m.
pub fn small_config() -> OctreeConfig {
  OctreeConfig::new(
    0.1,
    0.4,
    DAabb3::from_center_half_extents(DVec3::ZERO, DVec3::splat(0.8)),
  )
}

// =============================================================================
// Build fixture
// =============================================================================

/// Owns everything a [`BuildContext`] borrows.
pub struct BuildFixture {
  pub config: OctreeConfig,
  pub oracle: SceneOracle,
  pub materials: MaterialTable,
  pub filter: ActorFilter,
}

impl BuildFixture {
  pub fn new(config: OctreeConfig, oracle: SceneOracle) -> Self {
    Self {
      config,
      oracle,
      materials: materials(),
      filter: ActorFilter::default(),
    }
  }

  pub fn floor() -> Self {
    Self::new(small_config(), floor_scene())
  }

  pub fn with_filter(mut self, filter: ActorFilter) -> Self {
    self.filter = filter;
    self
  }

  pub fn ctx(&self) -> BuildContext<'_> {
    BuildContext {
      config: &self.config,
      oracle: &self.oracle,
      materials: &self.materials,
      filter: &self.filter,
    }
  }
}
