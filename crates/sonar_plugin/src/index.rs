//! EnvironmentIndex - static environment octree plus agent-local octrees.
//!
//! The environment is built once per map, ignoring every dynamic body. Each
//! body instead gets a small, fully built [`AgentOctree`] that follows the
//! body rigidly:
//!
//! ```text
//! world = current_pose * build_pose⁻¹ * (tree as built)
//! ```
//!
//! so agent trees never need to be rebuilt from occupancy queries.

use std::sync::Arc;

use glam::{DAffine3, DVec3};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::error::Result;
use crate::material::MaterialTable;
use crate::octree::cache::{read_record, write_record};
use crate::octree::{BuildContext, DAabb3, OctreeConfig, SpatialNode};
use crate::oracle::{ActorFilter, ActorId, AgentBody, AgentRegistry, OccupancyOracle};
use crate::pose::Pose;

// =============================================================================
// AgentOctree
// =============================================================================

/// Fully built octree around one dynamic body.
#[derive(Clone, Debug)]
pub struct AgentOctree {
  pub id: ActorId,
  pub root: SpatialNode,
  build_pose: Pose,
  current_pose: Pose,
}

impl AgentOctree {
  /// Build the tree around `body` at its current pose.
  ///
  /// Returns None if the body has no geometry inside its bounding volume.
  pub fn build(body: &AgentBody, config: &OctreeConfig, oracle: &dyn OccupancyOracle, materials: &MaterialTable) -> Option<Self> {
    // World-aligned box around the rotated bounding volume.
    let rot = glam::DMat3::from_quat(body.pose.rotation);
    let abs = glam::DMat3::from_cols(rot.x_axis.abs(), rot.y_axis.abs(), rot.z_axis.abs());
    let half = abs * body.half_extents;
    let bounds = DAabb3::from_center_half_extents(body.pose.position, half);

    let key = config.covering_key(&bounds, 0);
    let filter = ActorFilter::targeting(body.id);
    let ctx = BuildContext {
      config,
      oracle,
      materials,
      filter: &filter,
    };
    let mut root = SpatialNode::build(key, &ctx)?;
    root.mark_agent();
    Some(Self {
      id: body.id,
      root,
      build_pose: body.pose,
      current_pose: body.pose,
    })
  }

  pub fn set_pose(&mut self, pose: Pose) {
    self.current_pose = pose;
  }

  pub fn pose(&self) -> Pose {
    self.current_pose
  }

  /// Maps the tree as built to its current world placement.
  pub fn transform(&self) -> DAffine3 {
    self.current_pose.to_affine() * self.build_pose.to_affine().inverse()
  }
}

// =============================================================================
// IndexBuilder
// =============================================================================

/// Builds an [`EnvironmentIndex`].
pub struct IndexBuilder {
  config: OctreeConfig,
  oracle: Arc<dyn OccupancyOracle>,
  materials: Arc<MaterialTable>,
  bodies: Vec<AgentBody>,
}

impl IndexBuilder {
  pub fn new(config: OctreeConfig, oracle: impl OccupancyOracle + 'static, materials: MaterialTable) -> Self {
    Self::from_shared(config, Arc::new(oracle), Arc::new(materials))
  }

  pub fn from_shared(config: OctreeConfig, oracle: Arc<dyn OccupancyOracle>, materials: Arc<MaterialTable>) -> Self {
    Self {
      config,
      oracle,
      materials,
      bodies: Vec::new(),
    }
  }

  /// Register dynamic bodies: excluded from the environment, given their own trees.
  pub fn with_agents(mut self, registry: &(impl AgentRegistry + ?Sized)) -> Self {
    self.bodies = registry.agents();
    self
  }

  pub fn build(self) -> Result<EnvironmentIndex> {
    self.config.validate()?;
    let start = Instant::now();

    let filter = ActorFilter::ignoring(self.bodies.iter().map(|b| b.id).collect());
    let mut index = EnvironmentIndex {
      config: self.config,
      oracle: self.oracle,
      materials: self.materials,
      filter,
      root: None,
      agents: Vec::new(),
    };
    index.root = index.build_root();
    for body in &self.bodies {
      index.add_agent(body);
    }

    info!(
      cells = index.cells().len(),
      agents = index.agents.len(),
      root_level = index.config.root_key().level,
      cache_level = index.config.cache_level(),
      elapsed_ms = start.elapsed().as_millis() as u64,
      "environment index ready"
    );
    Ok(index)
  }
}

// =============================================================================
// EnvironmentIndex
// =============================================================================

/// Root structure of the static environment plus agent-local trees.
pub struct EnvironmentIndex {
  config: OctreeConfig,
  oracle: Arc<dyn OccupancyOracle>,
  materials: Arc<MaterialTable>,
  filter: ActorFilter,
  root: Option<SpatialNode>,
  agents: Vec<AgentOctree>,
}

impl EnvironmentIndex {
  fn ctx(&self) -> BuildContext<'_> {
    BuildContext {
      config: &self.config,
      oracle: &*self.oracle,
      materials: &self.materials,
      filter: &self.filter,
    }
  }

  /// Read the structure above the cells from roots.json, or build and save it.
  fn build_root(&self) -> Option<SpatialNode> {
    let key = self.config.root_key();
    let cache_level = self.config.cache_level();
    let path = self.config.roots_path();

    if let Some(record) = path.as_deref().and_then(read_record) {
      if record.p == key.coords() {
        match SpatialNode::from_record(&record, key.level, &self.config, &self.materials) {
          Ok(root) => {
            debug!("loaded index structure from cache");
            return Some(root);
          }
          Err(reason) => warn!(%reason, "corrupt index structure, rebuilding"),
        }
      } else {
        warn!("index structure does not match the environment bounds, rebuilding");
      }
    }

    let root = SpatialNode::build_until(key, &self.ctx(), cache_level);
    if let (Some(root), Some(path)) = (&root, &path) {
      if let Err(err) = write_record(path, &root.to_record()) {
        warn!(%err, "failed to persist index structure");
      }
    }
    root
  }

  fn add_agent(&mut self, body: &AgentBody) {
    match AgentOctree::build(body, &self.config, &*self.oracle, &self.materials) {
      Some(tree) => {
        debug!(agent = body.id.0, leaves = tree.root.surface_leaf_count(), "built agent octree");
        self.agents.push(tree);
      }
      None => debug!(agent = body.id.0, "agent has no geometry, skipping"),
    }
  }

  pub fn config(&self) -> &OctreeConfig {
    &self.config
  }

  pub fn materials(&self) -> &MaterialTable {
    &self.materials
  }

  pub fn root(&self) -> Option<&SpatialNode> {
    self.root.as_ref()
  }

  pub fn agents(&self) -> &[AgentOctree] {
    &self.agents
  }

  /// Update agent poses from the registry, building trees for new bodies and
  /// dropping trees of bodies that disappeared.
  ///
  /// New bodies are not removed from the static environment; register every
  /// body up front with [`IndexBuilder::with_agents`].
  pub fn refresh_agents(&mut self, registry: &(impl AgentRegistry + ?Sized)) {
    let bodies = registry.agents();
    self.agents.retain(|a| bodies.iter().any(|b| b.id == a.id));
    for body in &bodies {
      match self.agents.iter_mut().find(|a| a.id == body.id) {
        Some(tree) => tree.set_pose(body.pose),
        None => self.add_agent(body),
      }
    }
  }

  /// All cache cells of the environment.
  pub fn cells(&self) -> Vec<&SpatialNode> {
    fn walk<'a>(node: &'a SpatialNode, level: u32, out: &mut Vec<&'a SpatialNode>) {
      if node.key.level == level {
        out.push(node);
      } else if node.key.level > level {
        for child in &node.children {
          walk(child, level, out);
        }
      }
    }
    let mut out = Vec::new();
    if let Some(root) = &self.root {
      walk(root, self.config.cache_level(), &mut out);
    }
    out
  }

  /// Split borrows for the leaf collector.
  pub(crate) fn parts_mut(&mut self) -> (Option<&mut SpatialNode>, &mut [AgentOctree], BuildContext<'_>) {
    let ctx = BuildContext {
      config: &self.config,
      oracle: &*self.oracle,
      materials: &self.materials,
      filter: &self.filter,
    };
    (self.root.as_mut(), &mut self.agents, ctx)
  }

  /// Build and cache every not-yet-cached cell within `range` of `position`
  /// (padded by half a cell diagonal). Returns the number of cells built.
  pub fn prebuild(&mut self, position: DVec3, range: f64) -> usize {
    let reach = range + self.config.cache_size() * 3f64.sqrt() * 0.5;
    let (root, _, ctx) = self.parts_mut();
    let Some(root) = root else {
      return 0;
    };
    if ctx.config.cache.is_none() {
      debug!("caching disabled, nothing to prebuild");
      return 0;
    }

    let mut pending = Vec::new();
    collect_uncached(root, ctx.config, position, reach, &mut pending);
    let count = pending.len();
    let start = Instant::now();
    pending.into_par_iter().for_each(|cell| {
      cell.load(&ctx);
      cell.unload(ctx.config);
    });
    if count > 0 {
      info!(
        cells = count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "prebuilt octree cells"
      );
    }
    count
  }

  /// Prebuild every uncached cell of the environment.
  pub fn prebuild_all(&mut self) -> usize {
    let center = self.config.bounds.center();
    let reach = self.config.bounds.size().length();
    self.prebuild(center, reach)
  }
}

fn collect_uncached<'a>(
  node: &'a mut SpatialNode,
  config: &OctreeConfig,
  position: DVec3,
  reach: f64,
  out: &mut Vec<&'a mut SpatialNode>,
) {
  let cache_level = config.cache_level();
  if node.key.level == cache_level {
    let uncached = config.cell_path(&node.key).is_some_and(|p| !p.exists());
    if uncached && !node.is_loaded() && node.center.distance(position) <= reach {
      out.push(node);
    }
  } else if node.key.level > cache_level {
    for child in &mut node.children {
      collect_uncached(child, config, position, reach, out);
    }
  }
}

#[cfg(test)]
#[path = "index_test.rs"]
mod index_test;
