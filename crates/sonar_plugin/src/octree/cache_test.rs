use super::*;
use crate::test_utils::{floor_scene, small_config, BuildFixture};
use tempfile::TempDir;

fn cached_fixture(dir: &TempDir) -> BuildFixture {
  BuildFixture::new(small_config().with_cache(dir.path(), "floor"), floor_scene())
}

/// Unloaded cell stub at the origin.
fn origin_stub(fx: &BuildFixture) -> SpatialNode {
  SpatialNode::stub(NodeKey::new(0, 0, 0, fx.config.cache_level()), &fx.config)
}

// =========================================================================
// Batch 1: load / unload
// =========================================================================

/// First load builds the cell and writes its file.
#[test]
fn test_load_builds_and_persists() {
  let dir = TempDir::new().unwrap();
  let fx = cached_fixture(&dir);
  let mut cell = origin_stub(&fx);

  cell.load(&fx.ctx());

  assert!(cell.is_loaded());
  assert_eq!(cell.surface_leaf_count(), 16);
  let path = fx.config.cell_path(&cell.key).unwrap();
  assert!(path.exists(), "cell file should exist at {}", path.display());
}

/// load; unload; load yields an identical tree.
#[test]
fn test_load_unload_load_is_identical() {
  let dir = TempDir::new().unwrap();
  let fx = cached_fixture(&dir);
  let mut cell = origin_stub(&fx);

  cell.load(&fx.ctx());
  let first = cell.clone();

  cell.unload(&fx.config);
  assert!(cell.children.is_empty());
  assert!(!cell.is_loaded());

  cell.load(&fx.ctx());
  assert_eq!(cell, first, "reloaded cell must match the built cell");
}

/// The file left by load + unload equals a fresh build's file.
#[test]
fn test_file_after_unload_matches_fresh_build() {
  let dir_a = TempDir::new().unwrap();
  let dir_b = TempDir::new().unwrap();
  let fx_a = cached_fixture(&dir_a);
  let fx_b = cached_fixture(&dir_b);

  let mut cell = origin_stub(&fx_a);
  cell.load(&fx_a.ctx());
  cell.unload(&fx_a.config);
  cell.load(&fx_a.ctx());
  cell.unload(&fx_a.config);

  let mut fresh = origin_stub(&fx_b);
  fresh.load(&fx_b.ctx());

  let a = std::fs::read(fx_a.config.cell_path(&cell.key).unwrap()).unwrap();
  let b = std::fs::read(fx_b.config.cell_path(&fresh.key).unwrap()).unwrap();
  assert_eq!(a, b);
}

/// Loading a second time is a no-op.
#[test]
fn test_load_is_idempotent() {
  let fx = BuildFixture::floor();
  let mut cell = origin_stub(&fx);
  cell.load(&fx.ctx());
  let first = cell.clone();
  cell.load(&fx.ctx());
  assert_eq!(cell, first);
}

/// Agent-local nodes survive unload.
#[test]
fn test_unload_skips_agent_nodes() {
  let fx = BuildFixture::floor();
  let mut cell = SpatialNode::build(NodeKey::new(0, 0, 0, fx.config.cache_level()), &fx.ctx()).unwrap();
  cell.mark_agent();
  let before = cell.surface_leaf_count();

  cell.unload(&fx.config);
  assert_eq!(cell.surface_leaf_count(), before);
}

/// Unloading above cell level frees the cells but keeps the structure.
#[test]
fn test_unload_above_cells_keeps_structure() {
  let fx = BuildFixture::floor();
  let root_key = fx.config.root_key();
  let mut root = SpatialNode::build(root_key, &fx.ctx()).unwrap();
  let structure_children = root.children.len();
  assert!(root.surface_leaf_count() > 0);

  root.unload(&fx.config);
  assert_eq!(root.children.len(), structure_children);
  assert_eq!(root.surface_leaf_count(), 0);
}

// =========================================================================
// Batch 2: Self-healing cache
// =========================================================================

/// Garbage in a cell file is replaced by a rebuild.
#[test]
fn test_corrupt_file_is_rebuilt() {
  let dir = TempDir::new().unwrap();
  let fx = cached_fixture(&dir);
  let mut reference = origin_stub(&fx);
  reference.load(&fx.ctx());

  let path = fx.config.cell_path(&reference.key).unwrap();
  std::fs::write(&path, "{ not json").unwrap();

  let mut cell = origin_stub(&fx);
  cell.load(&fx.ctx());
  assert_eq!(cell, reference);

  let text = std::fs::read_to_string(&path).unwrap();
  assert!(serde_json::from_str::<NodeRecord>(&text).is_ok(), "file should be rewritten");
}

/// A file whose children are not octants of the cell is rejected.
#[test]
fn test_structurally_invalid_file_is_rebuilt() {
  let dir = TempDir::new().unwrap();
  let fx = cached_fixture(&dir);
  let stub = origin_stub(&fx);
  let path = fx.config.cell_path(&stub.key).unwrap();

  let bogus = NodeRecord {
    p: stub.key.coords(),
    l: vec![NodeRecord {
      p: [7, 7, 7],
      l: Vec::new(),
      n: None,
      m: None,
    }],
    n: None,
    m: None,
  };
  write_record(&path, &bogus).unwrap();

  let mut cell = origin_stub(&fx);
  cell.load(&fx.ctx());
  assert_eq!(cell.surface_leaf_count(), 16);
}

/// A file for a different position is ignored.
#[test]
fn test_position_mismatch_is_rebuilt() {
  let dir = TempDir::new().unwrap();
  let fx = cached_fixture(&dir);
  let stub = origin_stub(&fx);
  let path = fx.config.cell_path(&stub.key).unwrap();

  let wrong = NodeRecord {
    p: [8, 8, 8],
    l: Vec::new(),
    n: None,
    m: None,
  };
  write_record(&path, &wrong).unwrap();

  let mut cell = origin_stub(&fx);
  cell.load(&fx.ctx());
  assert_eq!(cell.surface_leaf_count(), 16);
}

// =========================================================================
// Batch 3: Record format
// =========================================================================

/// Leaves carry "n" and "m"; branches carry "l"; empty lists are omitted.
#[test]
fn test_record_json_shape() {
  let fx = BuildFixture::floor();
  let cell = SpatialNode::build(NodeKey::new(0, 0, 0, 2), &fx.ctx()).unwrap();
  let json = serde_json::to_value(cell.to_record()).unwrap();

  assert!(json.get("l").is_some());
  assert!(json.get("n").is_none());

  let lower = json["l"]
    .as_array()
    .unwrap()
    .iter()
    .find(|c| c.get("l").is_some())
    .expect("a branch with leaves");
  let leaf = &lower["l"][0];
  assert_eq!(leaf["m"], "sand");
  assert_eq!(leaf["n"], serde_json::json!([0.0, 0.0, 1.0]));
  assert!(leaf.get("l").is_none());
}

/// Leaves without a surface are rejected on read.
#[test]
fn test_from_record_rejects_bare_leaf() {
  let fx = BuildFixture::floor();
  let record = NodeRecord {
    p: [1, 1, 1],
    l: Vec::new(),
    n: None,
    m: Some("sand".into()),
  };
  assert!(SpatialNode::from_record(&record, 0, &fx.config, &fx.materials).is_err());
}
