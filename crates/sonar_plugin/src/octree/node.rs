//! SpatialNode - owned octree node built from occupancy queries.
//!
//! Nodes are addressed by [`NodeKey`]: lattice coordinates of the center in
//! units of `min_size / 2` plus the level (0 = leaf size, higher = coarser).
//!
//! A node is exactly one of:
//! - **empty**: no children, no surface (not loaded, or nothing below)
//! - **branch**: one or more children, each exactly one level finer
//! - **leaf**: level 0 with a recorded surface
//!
//! Cubes that are entirely inside solid geometry are never materialized.

use glam::DVec3;
use rayon::prelude::*;
use tracing::warn;

use super::OctreeConfig;
use crate::material::MaterialTable;
use crate::oracle::{ActorFilter, OccupancyOracle, Precision, SurfaceHit};

/// Octree node address - immutable value type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeKey {
  /// Lattice X of the center
  pub x: i64,
  /// Lattice Y of the center
  pub y: i64,
  /// Lattice Z of the center
  pub z: i64,
  /// Level (0 = leaf size, higher = coarser)
  pub level: u32,
}

impl NodeKey {
  pub fn new(x: i64, y: i64, z: i64, level: u32) -> Self {
    Self { x, y, z, level }
  }

  /// Get child key (one level finer).
  ///
  /// Octant: 0-7 where bits select the positive half per axis:
  /// - bit 0: X
  /// - bit 1: Y
  /// - bit 2: Z
  ///
  /// Returns None at level 0.
  pub fn get_child(&self, octant: u8) -> Option<Self> {
    if self.level == 0 {
      return None;
    }
    let step = 1i64 << (self.level - 1);
    let offset = |bit: u8| if (octant >> bit) & 1 == 1 { step } else { -step };
    Some(Self {
      x: self.x + offset(0),
      y: self.y + offset(1),
      z: self.z + offset(2),
      level: self.level - 1,
    })
  }

  /// True if `other` is one of this key's eight children.
  pub fn is_parent_of(&self, other: &NodeKey) -> bool {
    if self.level == 0 || other.level + 1 != self.level {
      return false;
    }
    let step = 1i64 << other.level;
    (other.x - self.x).abs() == step && (other.y - self.y).abs() == step && (other.z - self.z).abs() == step
  }

  #[inline]
  pub fn coords(&self) -> [i64; 3] {
    [self.x, self.y, self.z]
  }
}

/// Surface recorded on a leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
  /// Unit outward normal.
  pub normal: DVec3,
  /// Material identifier.
  pub material: String,
  /// Acoustic impedance resolved from the material table.
  pub impedance: f64,
}

/// Everything node construction needs besides the node itself.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
  pub config: &'a OctreeConfig,
  pub oracle: &'a dyn OccupancyOracle,
  pub materials: &'a MaterialTable,
  pub filter: &'a ActorFilter,
}

/// Owned octree node.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialNode {
  pub key: NodeKey,
  pub center: DVec3,
  /// Edge length.
  pub size: f64,
  pub children: Vec<SpatialNode>,
  /// Present on leaves only.
  pub surface: Option<Surface>,
  pub(crate) agent: bool,
  pub(crate) loaded: bool,
}

impl SpatialNode {
  pub(crate) fn stub(key: NodeKey, config: &OctreeConfig) -> Self {
    Self {
      key,
      center: config.key_center(&key),
      size: config.size_at(key.level),
      children: Vec::new(),
      surface: None,
      agent: false,
      loaded: false,
    }
  }

  /// Build the full subtree at `key` down to leaf size.
  ///
  /// Returns None if the cube is empty or entirely interior.
  pub fn build(key: NodeKey, ctx: &BuildContext) -> Option<Self> {
    Self::build_until(key, ctx, 0)
  }

  /// Build the subtree at `key`, leaving nodes at `stop_level` as unloaded
  /// stubs (unless `stop_level` is 0).
  pub fn build_until(key: NodeKey, ctx: &BuildContext, stop_level: u32) -> Option<Self> {
    let mut node = Self::stub(key, ctx.config);
    let half = node.size * 0.5;

    let precision = if key.level == 0 || ctx.filter.target.is_some() {
      Precision::Precise
    } else {
      Precision::Approximate
    };
    let hit = ctx.oracle.occupancy(node.center, half, precision, ctx.filter)?;
    if ctx.filter.target.is_some() && hit.actor != ctx.filter.target {
      return None;
    }
    if is_interior(node.center, half, ctx) {
      return None;
    }

    if key.level == 0 {
      node.surface = Some(Surface {
        normal: repaired_normal(&hit, node.center),
        impedance: ctx.materials.impedance(&hit.material),
        material: hit.material,
      });
      node.loaded = true;
    } else if key.level > stop_level {
      node.children = build_children(&key, ctx, stop_level);
      node.loaded = true;
    }
    Some(node)
  }

  #[inline]
  pub fn half_size(&self) -> f64 {
    self.size * 0.5
  }

  #[inline]
  pub fn is_min(&self) -> bool {
    self.key.level == 0
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.key.level == 0 && self.surface.is_some()
  }

  #[inline]
  pub fn is_agent(&self) -> bool {
    self.agent
  }

  #[inline]
  pub fn is_loaded(&self) -> bool {
    self.loaded
  }

  /// 1 for a node without children, else 1 + the children's counts.
  pub fn num_leaves(&self) -> usize {
    if self.children.is_empty() {
      1
    } else {
      1 + self.children.iter().map(SpatialNode::num_leaves).sum::<usize>()
    }
  }

  /// Visit every leaf (level 0 node with a surface), depth first.
  pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a SpatialNode)) {
    if self.is_leaf() {
      f(self);
    }
    for child in &self.children {
      child.for_each_leaf(f);
    }
  }

  /// Number of surface leaves below (and including) this node.
  pub fn surface_leaf_count(&self) -> usize {
    let mut count = 0;
    self.for_each_leaf(&mut |_| count += 1);
    count
  }

  /// Tag the subtree as agent-local: never unloaded.
  pub(crate) fn mark_agent(&mut self) {
    self.agent = true;
    for child in &mut self.children {
      child.mark_agent();
    }
  }
}

/// Build the non-empty children of `key`, in octant order.
pub(crate) fn build_children(key: &NodeKey, ctx: &BuildContext, stop_level: u32) -> Vec<SpatialNode> {
  // Coarse levels fan out across workers; cells below are built per task.
  if key.level > ctx.config.cache_level() {
    (0u8..8)
      .into_par_iter()
      .filter_map(|octant| key.get_child(octant))
      .filter_map(|child| SpatialNode::build_until(child, ctx, stop_level))
      .collect()
  } else {
    (0u8..8)
      .filter_map(|octant| key.get_child(octant))
      .filter_map(|child| SpatialNode::build_until(child, ctx, stop_level))
      .collect()
  }
}

/// All 6 face midpoints and 8 corners, just inside the cube, are blocked.
fn is_interior(center: DVec3, half: f64, ctx: &BuildContext) -> bool {
  let eps = ctx.config.corner_epsilon;
  let dist = half - eps;

  const FACES: [DVec3; 6] = [
    DVec3::X,
    DVec3::NEG_X,
    DVec3::Y,
    DVec3::NEG_Y,
    DVec3::Z,
    DVec3::NEG_Z,
  ];
  let corners = (0u8..8).map(|c| {
    DVec3::new(
      if c & 1 == 1 { 1.0 } else { -1.0 },
      if c & 2 == 2 { 1.0 } else { -1.0 },
      if c & 4 == 4 { 1.0 } else { -1.0 },
    )
  });

  FACES
    .iter()
    .copied()
    .chain(corners)
    .all(|dir| ctx.oracle.is_blocked(center + dir * dist, eps, ctx.filter))
}

/// Replace NaN normal components with the sign of the center offset from the
/// hit location, then renormalize.
fn repaired_normal(hit: &SurfaceHit, center: DVec3) -> DVec3 {
  let mut normal = hit.normal;
  if normal.is_nan() {
    let offset = center - hit.location;
    for axis in 0..3 {
      if normal[axis].is_nan() {
        normal[axis] = if offset[axis] < 0.0 { -1.0 } else { 1.0 };
      }
    }
    warn!(material = %hit.material, ?center, "repaired NaN surface normal");
  }
  normal.try_normalize().unwrap_or(DVec3::Z)
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
