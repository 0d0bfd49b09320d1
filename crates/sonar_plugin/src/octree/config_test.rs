use super::*;

// =========================================================================
// Batch 1: Sizing
// =========================================================================

/// Size doubles with each level starting from the minimum size.
#[test]
fn test_size_doubles_per_level() {
  let config = OctreeConfig::default();

  assert_eq!(config.size_at(0), 0.1, "level 0 is the minimum size");
  assert_eq!(config.size_at(1), 0.2, "level 1 should be 2x level 0");
  assert_eq!(config.size_at(5), 0.1 * 32.0, "level 5 should be 32x level 0");
}

/// Cache granularity is the smallest power-of-two multiple >= max_size.
#[test]
fn test_cache_level_rounds_up() {
  let config = OctreeConfig::default();

  // 0.1 * 2^6 = 6.4 is the first multiple >= 5.0
  assert_eq!(config.cache_level(), 6);
  assert_eq!(config.cache_size(), 6.4);

  let exact = OctreeConfig::new(0.5, 4.0, config.bounds);
  assert_eq!(exact.cache_level(), 3, "exact multiples are not doubled again");
}

/// max_size below min_size makes every leaf its own cell.
#[test]
fn test_cache_level_floor_is_zero() {
  let config = OctreeConfig::new(1.0, 0.25, OctreeConfig::default().bounds);
  assert_eq!(config.cache_level(), 0);
}

// =========================================================================
// Batch 2: Lattice and root placement
// =========================================================================

/// Centers are lattice coordinates times half the minimum size.
#[test]
fn test_key_center_uses_half_min_lattice() {
  let config = OctreeConfig::default();
  let key = NodeKey::new(3, -4, 10, 0);
  let center = config.key_center(&key);
  assert!(
    (center - DVec3::new(0.15, -0.2, 0.5)).length() < 1e-12,
    "unexpected center {center}"
  );
}

/// The root covers the default -10..10 bounds and is at least cache level.
#[test]
fn test_root_covers_bounds() {
  let config = OctreeConfig::default();
  let root = config.root_key();

  let half = config.size_at(root.level) * 0.5;
  let center = config.key_center(&root);
  assert!((center - config.bounds.min).max_element() <= half);
  assert!((config.bounds.max - center).max_element() <= half);
  // 0.1 * 2^8 = 25.6 is the first size >= 20
  assert_eq!(root.level, 8);
}

/// An off-lattice environment center is snapped and the root grows to compensate.
#[test]
fn test_root_snaps_off_lattice_center() {
  let bounds = DAabb3::new(DVec3::new(0.02, 0.0, 0.0), DVec3::new(6.42, 6.4, 6.4));
  let config = OctreeConfig::new(0.1, 1.0, bounds);
  let root = config.root_key();
  let center = config.key_center(&root);
  let half = config.size_at(root.level) * 0.5;

  assert!(bounds.cube_half_extent_from(center) <= half, "root must cover bounds");
  assert_eq!(root.level, 7, "6.4 + snapping slack needs 12.8");
}

/// A root smaller than a cache cell is lifted to cache level.
#[test]
fn test_root_never_below_cache_level() {
  let bounds = DAabb3::from_center_half_extents(DVec3::ZERO, DVec3::splat(0.5));
  let config = OctreeConfig::new(0.1, 5.0, bounds);
  assert_eq!(config.root_key().level, config.cache_level());
}

// =========================================================================
// Batch 3: Cache paths
// =========================================================================

/// Cache layout is {root}/{map}/{min}_{max}/{x}_{y}_{z}.json.
#[test]
fn test_cell_path_layout() {
  let config = OctreeConfig::default().with_cache("/tmp/cache", "harbor");
  let cell = NodeKey::new(64, -64, 0, config.cache_level());

  let path = config.cell_path(&cell).expect("cells have files");
  assert_eq!(
    path,
    PathBuf::from("/tmp/cache/harbor/0.1_6.4/64_-64_0.json")
  );
  assert_eq!(
    config.roots_path(),
    Some(PathBuf::from("/tmp/cache/harbor/0.1_6.4/roots.json"))
  );
}

/// Only cache-level nodes map to files, and only when caching is enabled.
#[test]
fn test_cell_path_only_for_cells() {
  let config = OctreeConfig::default().with_cache("/tmp/cache", "harbor");
  assert!(config.cell_path(&NodeKey::new(0, 0, 0, 0)).is_none());

  let uncached = OctreeConfig::default();
  assert!(uncached
    .cell_path(&NodeKey::new(0, 0, 0, uncached.cache_level()))
    .is_none());
}

// =========================================================================
// Batch 4: Validation
// =========================================================================

#[test]
fn test_validate_rejects_bad_sizes() {
  let bounds = OctreeConfig::default().bounds;
  assert!(OctreeConfig::default().validate().is_ok());
  assert!(OctreeConfig::new(0.0, 5.0, bounds).validate().is_err());
  assert!(OctreeConfig::new(0.1, -1.0, bounds).validate().is_err());
  assert!(OctreeConfig::new(f64::NAN, 5.0, bounds).validate().is_err());

  let mut bad_eps = OctreeConfig::default();
  bad_eps.corner_epsilon = 0.1;
  assert!(bad_eps.validate().is_err());
}
