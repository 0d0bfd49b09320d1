use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::*;
use crate::oracle::ActorId;
use crate::shapes::{Geometry, SceneOracle, SceneShape};
use crate::test_utils::{small_config, BuildFixture, FLOOR_Z};

/// Cell centered at the origin in the small test config (0.4 m, level 2).
fn origin_cell() -> NodeKey {
  NodeKey::new(0, 0, 0, 2)
}

// =========================================================================
// Batch 1: NodeKey
// =========================================================================

/// Equal keys must produce equal hashes (HashMap invariant).
#[test]
fn test_key_hash_consistency() {
  let a = NodeKey::new(10, -20, 30, 4);
  let b = NodeKey::new(10, -20, 30, 4);

  let hash = |k: &NodeKey| {
    let mut hasher = DefaultHasher::new();
    k.hash(&mut hasher);
    hasher.finish()
  };

  assert_eq!(a, b);
  assert_eq!(hash(&a), hash(&b), "Equal keys must have equal hashes");
  assert_ne!(a, NodeKey::new(10, -20, 30, 5));
}

/// All 8 octants step 2^(level - 1) lattice units along each axis.
///
/// Octant bits: X (bit 0), Y (bit 1), Z (bit 2); a set bit is the + side.
#[test]
fn test_get_child_all_8_octants() {
  let parent = NodeKey::new(8, -8, 0, 3);

  for octant in 0u8..8 {
    let child = parent
      .get_child(octant)
      .unwrap_or_else(|| panic!("Octant {} should return a child", octant));

    let sign = |bit: u8| if (octant >> bit) & 1 == 1 { 1 } else { -1 };
    assert_eq!(child.x, parent.x + 4 * sign(0), "Octant {} X mismatch", octant);
    assert_eq!(child.y, parent.y + 4 * sign(1), "Octant {} Y mismatch", octant);
    assert_eq!(child.z, parent.z + 4 * sign(2), "Octant {} Z mismatch", octant);
    assert_eq!(child.level, 2, "Octant {} level mismatch", octant);
    assert!(parent.is_parent_of(&child));
  }
}

/// Leaves cannot subdivide.
#[test]
fn test_get_child_at_level_0_returns_none() {
  let leaf = NodeKey::new(1, 1, 1, 0);
  for octant in 0u8..8 {
    assert!(leaf.get_child(octant).is_none());
  }
}

/// Children's world cubes tile the parent exactly.
#[test]
fn test_children_tile_parent() {
  let config = small_config();
  let parent = NodeKey::new(4, 4, -4, 2);
  let parent_center = config.key_center(&parent);
  let quarter = config.size_at(2) / 4.0;

  for octant in 0u8..8 {
    let child = parent.get_child(octant).unwrap();
    let offset = config.key_center(&child) - parent_center;
    assert!(
      (offset.abs() - DVec3::splat(quarter)).abs().max_element() < 1e-12,
      "octant {} offset {}",
      octant,
      offset
    );
  }
}

/// Wrong level or wrong offset is not a parent relation.
#[test]
fn test_is_parent_of_rejects_non_children() {
  let parent = NodeKey::new(0, 0, 0, 2);
  assert!(!parent.is_parent_of(&NodeKey::new(2, 2, 2, 0)));
  assert!(!parent.is_parent_of(&NodeKey::new(2, 2, 0, 1)));
  assert!(!parent.is_parent_of(&NodeKey::new(2, 2, 6, 1)));
  assert!(parent.is_parent_of(&NodeKey::new(-2, 2, -2, 1)));
}

// =========================================================================
// Batch 2: Construction over a seafloor
// =========================================================================

/// Only the leaf layer straddling the floor survives: 4 x 4 leaves.
#[test]
fn test_floor_cell_has_single_leaf_layer() {
  let fx = BuildFixture::floor();
  let cell = SpatialNode::build(origin_cell(), &fx.ctx()).expect("cell straddles the floor");

  assert_eq!(cell.surface_leaf_count(), 16);
  cell.for_each_leaf(&mut |leaf| {
    let bottom = leaf.center.z - leaf.half_size();
    let top = leaf.center.z + leaf.half_size();
    assert!(bottom <= FLOOR_Z && FLOOR_Z <= top, "leaf {} misses floor", leaf.center);

    let surface = leaf.surface.as_ref().unwrap();
    assert_eq!(surface.normal, DVec3::Z);
    assert_eq!(surface.material, "sand");
    assert_eq!(surface.impedance, 1900.0 * 1650.0);
  });
}

/// num_leaves counts every node without children plus one per branch.
#[test]
fn test_num_leaves_counts_structure() {
  let fx = BuildFixture::floor();
  let cell = SpatialNode::build(origin_cell(), &fx.ctx()).unwrap();

  // cell + 4 childless upper octants + 4 lower octants with 4 leaves each
  assert_eq!(cell.num_leaves(), 1 + 4 + 4 * (1 + 4));
  assert_eq!(cell.children.len(), 8);
}

/// Every child is exactly half its parent's size.
#[test]
fn test_child_size_is_half_parent() {
  fn check(node: &SpatialNode) {
    for child in &node.children {
      assert_eq!(child.size * 2.0, node.size, "child of {:?}", node.key);
      assert!(node.key.is_parent_of(&child.key));
      check(child);
    }
  }
  let fx = BuildFixture::floor();
  let cell = SpatialNode::build(origin_cell(), &fx.ctx()).unwrap();
  check(&cell);
}

/// Cubes deep inside the floor are interior and never materialized.
#[test]
fn test_interior_cube_returns_none() {
  let fx = BuildFixture::floor();
  let deep = NodeKey::new(0, 0, -16, 2); // center z = -0.8
  assert!(SpatialNode::build(deep, &fx.ctx()).is_none());
}

/// Cubes in open water return None.
#[test]
fn test_open_water_returns_none() {
  let fx = BuildFixture::floor();
  let high = NodeKey::new(0, 0, 16, 2); // center z = +0.8
  assert!(SpatialNode::build(high, &fx.ctx()).is_none());
}

/// Identical inputs produce identical trees.
#[test]
fn test_build_is_deterministic() {
  let fx = BuildFixture::floor();
  let a = SpatialNode::build(origin_cell(), &fx.ctx()).unwrap();
  let b = SpatialNode::build(origin_cell(), &fx.ctx()).unwrap();
  assert_eq!(a, b);
}

/// build_until stops at the requested level with unloaded stubs.
#[test]
fn test_build_until_leaves_stubs() {
  let fx = BuildFixture::floor();
  let root = fx.config.root_key();
  let tree = SpatialNode::build_until(root, &fx.ctx(), fx.config.cache_level()).unwrap();

  fn check(node: &SpatialNode, stop: u32) {
    if node.key.level == stop {
      assert!(node.children.is_empty());
      assert!(!node.is_loaded());
    } else {
      assert!(node.is_loaded());
      for child in &node.children {
        check(child, stop);
      }
    }
  }
  check(&tree, fx.config.cache_level());
  assert_eq!(tree.surface_leaf_count(), 0);
}

// =========================================================================
// Batch 3: Normals and actor targeting
// =========================================================================

/// A NaN normal is repaired from the center offset and renormalized.
#[test]
fn test_nan_normal_repaired() {
  let leaf_center = DVec3::splat(0.05);
  let oracle = SceneOracle::new().with_shape(SceneShape::new(
    Geometry::Sphere {
      center: leaf_center,
      radius: 0.02,
    },
    "rock",
  ));
  let fx = BuildFixture::new(small_config(), oracle);
  let parent = NodeKey::new(2, 2, 2, 1);
  let node = SpatialNode::build(parent, &fx.ctx()).expect("pebble is not interior");

  assert_eq!(node.surface_leaf_count(), 1);
  let mut normal = DVec3::ZERO;
  node.for_each_leaf(&mut |leaf| normal = leaf.surface.as_ref().unwrap().normal);
  assert!(normal.is_finite());
  assert!((normal - DVec3::splat(1.0 / 3f64.sqrt())).length() < 1e-12);
}

/// With a target actor only that actor's geometry produces leaves.
#[test]
fn test_target_actor_restricts_geometry() {
  let oracle = SceneOracle::new()
    .with_shape(
      SceneShape::new(
        Geometry::Aabb {
          min: DVec3::new(-0.17, -0.17, -0.17),
          max: DVec3::new(-0.03, 0.17, 0.17),
        },
        "rock",
      )
      .with_actor(ActorId(1)),
    )
    .with_shape(
      SceneShape::new(
        Geometry::Aabb {
          min: DVec3::new(0.03, -0.17, -0.17),
          max: DVec3::new(0.17, 0.17, 0.17),
        },
        "rock",
      )
      .with_actor(ActorId(2)),
    );

  let both = BuildFixture::new(small_config(), oracle.clone());
  let only_one = BuildFixture::new(small_config(), oracle).with_filter(ActorFilter::targeting(ActorId(1)));

  let all = SpatialNode::build(origin_cell(), &both.ctx()).unwrap();
  let targeted = SpatialNode::build(origin_cell(), &only_one.ctx()).unwrap();

  assert!(targeted.surface_leaf_count() > 0);
  assert!(targeted.surface_leaf_count() < all.surface_leaf_count());
  targeted.for_each_leaf(&mut |leaf| {
    assert!(leaf.center.x < 0.0, "leaf {} belongs to actor 2", leaf.center);
  });
}
