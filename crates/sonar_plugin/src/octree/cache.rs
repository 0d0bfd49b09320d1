//! Disk-backed cells: JSON records, load and unload.
//!
//! One file per cache cell holds the cell's subtree:
//!
//! ```text
//! { "p": [x, y, z],                 lattice coordinates
//!   "l": [ { "p": ..., "l": ... },  children (omitted when empty)
//!          { "p": ..., "n": [nx, ny, nz], "m": "rock" } ] }   leaf
//! ```
//!
//! Writers go through a temporary file and a rename, so concurrent builders of
//! the same cell race harmlessly: the last rename wins and every candidate is
//! a complete, identical file.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::node::{build_children, BuildContext, NodeKey, SpatialNode, Surface};
use super::OctreeConfig;
use crate::error::{Result, SonarError};
use crate::material::MaterialTable;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Serialized form of one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
  pub p: [i64; 3],
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub l: Vec<NodeRecord>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub n: Option<[f64; 3]>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub m: Option<String>,
}

impl SpatialNode {
  /// Restore (or build and persist) the subtree below this node.
  ///
  /// No-op for leaves and for nodes that are already loaded.
  pub fn load(&mut self, ctx: &BuildContext) {
    if self.loaded || self.is_min() {
      return;
    }

    let path = ctx.config.cell_path(&self.key);
    if let Some(path) = &path {
      if let Some(children) = read_cell(path, &self.key, ctx.config, ctx.materials) {
        self.children = children;
        self.loaded = true;
        return;
      }
    }

    self.children = build_children(&self.key, ctx, 0);
    self.loaded = true;

    if let Some(path) = path {
      if let Err(err) = write_record(&path, &self.to_record()) {
        warn!(%err, "failed to persist octree cell");
      }
    }
  }

  /// Free the detail below cache cells of this subtree.
  ///
  /// Agent-local nodes and nodes finer than a cell are left untouched.
  pub fn unload(&mut self, config: &OctreeConfig) {
    if self.agent {
      return;
    }
    let cache_level = config.cache_level();
    if self.key.level == cache_level {
      self.children = Vec::new();
      self.loaded = false;
    } else if self.key.level > cache_level {
      for child in &mut self.children {
        child.unload(config);
      }
    }
  }

  pub fn to_record(&self) -> NodeRecord {
    NodeRecord {
      p: self.key.coords(),
      l: self.children.iter().map(SpatialNode::to_record).collect(),
      n: self.surface.as_ref().map(|s| s.normal.to_array()),
      m: self.surface.as_ref().map(|s| s.material.clone()),
    }
  }

  /// Rebuild a node from its record at a known level.
  ///
  /// Validates that every child is one level finer and positioned as one of
  /// the eight octants, and that surfaces only appear on leaves.
  pub fn from_record(
    record: &NodeRecord,
    level: u32,
    config: &OctreeConfig,
    materials: &MaterialTable,
  ) -> std::result::Result<Self, String> {
    let key = NodeKey::new(record.p[0], record.p[1], record.p[2], level);
    let mut node = SpatialNode::stub(key, config);
    node.loaded = level != config.cache_level();

    if level == 0 {
      if !record.l.is_empty() {
        return Err(format!("leaf {:?} has children", record.p));
      }
      let (Some(n), Some(m)) = (record.n, record.m.as_ref()) else {
        return Err(format!("leaf {:?} is missing its surface", record.p));
      };
      let normal = DVec3::from_array(n);
      if !normal.is_finite() {
        return Err(format!("leaf {:?} has a non-finite normal", record.p));
      }
      node.surface = Some(Surface {
        normal,
        material: m.clone(),
        impedance: materials.impedance(m),
      });
      node.loaded = true;
      return Ok(node);
    }

    if record.n.is_some() || record.m.is_some() {
      return Err(format!("non-leaf {:?} carries a surface", record.p));
    }
    node.children = record
      .l
      .iter()
      .map(|child| {
        let child_node = SpatialNode::from_record(child, level - 1, config, materials)?;
        if !key.is_parent_of(&child_node.key) {
          return Err(format!("{:?} is not a child of {:?}", child.p, record.p));
        }
        Ok(child_node)
      })
      .collect::<std::result::Result<_, String>>()?;
    Ok(node)
  }
}

/// Read a cell's children from disk. None on a miss or any corruption.
fn read_cell(
  path: &Path,
  key: &NodeKey,
  config: &OctreeConfig,
  materials: &MaterialTable,
) -> Option<Vec<SpatialNode>> {
  let record = read_record(path)?;
  if record.p != key.coords() {
    warn!(path = %path.display(), "cache cell position mismatch, rebuilding");
    return None;
  }
  match SpatialNode::from_record(&record, key.level, config, materials) {
    Ok(node) => Some(node.children),
    Err(reason) => {
      warn!(path = %path.display(), %reason, "corrupt cache cell, rebuilding");
      None
    }
  }
}

pub(crate) fn read_record(path: &Path) -> Option<NodeRecord> {
  let text = match std::fs::read_to_string(path) {
    Ok(text) => text,
    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
      debug!(path = %path.display(), "cache miss");
      return None;
    }
    Err(err) => {
      warn!(path = %path.display(), %err, "unreadable cache file, rebuilding");
      return None;
    }
  };
  match serde_json::from_str(&text) {
    Ok(record) => Some(record),
    Err(err) => {
      warn!(path = %path.display(), %err, "unparsable cache file, rebuilding");
      None
    }
  }
}

/// Write `record` to `path` atomically (temp file + rename).
pub(crate) fn write_record(path: &Path, record: &NodeRecord) -> Result<()> {
  if let Some(dir) = path.parent() {
    std::fs::create_dir_all(dir).map_err(|e| SonarError::io(dir, e))?;
  }
  let json = serde_json::to_string(record).map_err(|e| SonarError::io(path, std::io::Error::other(e)))?;

  let tmp = path.with_extension(format!(
    "json.{}.{}.tmp",
    std::process::id(),
    TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed)
  ));
  std::fs::write(&tmp, json).map_err(|e| SonarError::io(&tmp, e))?;
  std::fs::rename(&tmp, path).map_err(|e| SonarError::io(path, e))?;
  Ok(())
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
