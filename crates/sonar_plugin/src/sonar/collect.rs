//! Leaf collection: every surface leaf inside the beam facing the sensor.
//!
//! Two phases per capture:
//!
//! 1. Walk the environment structure down to cache cells, keeping cells the
//!    padded beam touches and unloading everything it misses. Agent trees
//!    (other than the sensor owner's) are appended with their current
//!    transform.
//! 2. In parallel over those units, load each cell and descend to leaf size.
//!    Every task owns its output list; lists are concatenated in unit order so
//!    the result is deterministic.

use glam::{DAffine3, DVec3};
use rayon::prelude::*;

use super::angles::Spherical;
use super::culling::BeamCuller;
use crate::index::EnvironmentIndex;
use crate::octree::{OctreeConfig, SpatialNode};
use crate::oracle::ActorId;

/// One surface leaf as seen by the current capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafHit {
  /// World-space leaf center.
  pub center: DVec3,
  /// World-space unit outward normal.
  pub normal: DVec3,
  pub impedance: f64,
  pub spherical: Spherical,
  /// Unit direction from the leaf toward the sensor.
  pub incident: DVec3,
  /// `normal . incident`, always positive.
  pub cos: f64,
  /// Reflected intensity, set by shadowing.
  pub value: f64,
  pub range_bin: usize,
  pub azimuth_bin: usize,
  pub elevation_bin: usize,
}

impl LeafHit {
  /// Pressure reflection coefficient against water.
  #[inline]
  pub fn reflection(&self, water_impedance: f64) -> f64 {
    (self.impedance - water_impedance) / (self.impedance + water_impedance)
  }
}

/// Result of leaf collection.
#[derive(Debug, Default)]
pub struct Collected {
  pub hits: Vec<LeafHit>,
  /// Environment cells searched.
  pub cells: usize,
  /// Agent trees searched.
  pub agents: usize,
}

enum Unit<'a> {
  Cell(&'a mut SpatialNode),
  Agent(&'a SpatialNode, DAffine3),
}

#[inline]
fn probe_size(node: &SpatialNode) -> Option<f64> {
  (!node.is_min()).then_some(node.size)
}

/// Collect every in-beam leaf of `index` facing the sensor.
///
/// The agent tree of `owner` (the body carrying the sensor) is skipped.
#[tracing::instrument(skip_all, name = "sonar::find_leaves")]
pub fn find_leaves(index: &mut EnvironmentIndex, culler: &BeamCuller, owner: Option<ActorId>) -> Collected {
  let (root, agents, ctx) = index.parts_mut();

  let mut units = Vec::new();
  if let Some(root) = root {
    let _span = tracing::debug_span!("select_cells").entered();
    select_cells(root, ctx.config, culler, &mut units);
  }
  let cells = units.len();
  for agent in agents.iter().filter(|a| Some(a.id) != owner) {
    units.push(Unit::Agent(&agent.root, agent.transform()));
  }
  let agent_units = units.len() - cells;

  let lists: Vec<Vec<LeafHit>> = units
    .into_par_iter()
    .map(|unit| {
      let mut out = Vec::new();
      match unit {
        Unit::Cell(cell) => {
          cell.load(&ctx);
          descend(cell, None, culler, &mut out);
        }
        Unit::Agent(root, transform) => descend(root, Some(&transform), culler, &mut out),
      }
      out
    })
    .collect();

  Collected {
    hits: lists.into_iter().flatten().collect(),
    cells,
    agents: agent_units,
  }
}

/// Phase 1: keep in-beam cells, unload the rest at or above cell level.
fn select_cells<'a>(node: &'a mut SpatialNode, config: &OctreeConfig, culler: &BeamCuller, out: &mut Vec<Unit<'a>>) {
  let cache_level = config.cache_level();
  if culler.in_range(node.center, probe_size(node)).is_some() {
    if node.key.level <= cache_level {
      out.push(Unit::Cell(node));
    } else {
      for child in &mut node.children {
        select_cells(child, config, culler, out);
      }
    }
  } else if node.key.level >= cache_level {
    node.unload(config);
  }
}

/// Phase 2: descend to leaf size, emitting sensor-facing leaves.
fn descend(node: &SpatialNode, transform: Option<&DAffine3>, culler: &BeamCuller, out: &mut Vec<LeafHit>) {
  let center = match transform {
    Some(t) => t.transform_point3(node.center),
    None => node.center,
  };
  let Some(spherical) = culler.in_range(center, probe_size(node)) else {
    return;
  };

  if node.is_min() {
    let Some(surface) = &node.surface else {
      return;
    };
    let normal = match transform {
      Some(t) => t.transform_vector3(surface.normal).normalize_or_zero(),
      None => surface.normal,
    };
    let incident = (culler.origin() - center).normalize_or_zero();
    let cos = normal.dot(incident);
    if cos > 0.0 {
      out.push(LeafHit {
        center,
        normal,
        impedance: surface.impedance,
        spherical,
        incident,
        cos,
        value: 0.0,
        range_bin: 0,
        azimuth_bin: 0,
        elevation_bin: 0,
      });
    }
    return;
  }

  for child in &node.children {
    descend(child, transform, culler, out);
  }
}
