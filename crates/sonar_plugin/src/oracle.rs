//! Interfaces to the host scene: occupancy queries and dynamic bodies.
//!
//! Octree construction never sees host geometry directly. It asks an
//! [`OccupancyOracle`] whether axis-aligned boxes are occupied and by which
//! surface, and asks an [`AgentRegistry`] which dynamic bodies exist.

use std::sync::Arc;

use glam::DVec3;

use crate::pose::Pose;

/// Opaque identifier of a scene actor (static mesh or dynamic body).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ActorId(pub u64);

/// Query precision.
///
/// `Approximate` may report occupancy for boxes that only come near a surface
/// (e.g. a bounding-sphere overlap) but must never miss a real overlap.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Precision {
  Precise,
  Approximate,
}

/// Filter applied to occupancy queries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActorFilter {
  /// Actors that must be ignored entirely (dynamic bodies during the static
  /// environment build).
  pub ignored: Vec<ActorId>,
  /// When set, only this actor's geometry counts as occupied.
  pub target: Option<ActorId>,
}

impl ActorFilter {
  pub fn ignoring(ignored: Vec<ActorId>) -> Self {
    Self {
      ignored,
      target: None,
    }
  }

  pub fn targeting(actor: ActorId) -> Self {
    Self {
      ignored: Vec::new(),
      target: Some(actor),
    }
  }

  #[inline]
  pub fn is_ignored(&self, actor: Option<ActorId>) -> bool {
    actor.is_some_and(|a| self.ignored.contains(&a))
  }

  /// Whether geometry owned by `actor` may satisfy a query.
  #[inline]
  pub fn admits(&self, actor: Option<ActorId>) -> bool {
    if self.is_ignored(actor) {
      return false;
    }
    match self.target {
      Some(target) => actor == Some(target),
      None => true,
    }
  }
}

/// Surface found by an occupancy query.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceHit {
  /// Point on (or inside) the surface closest to the query box.
  pub location: DVec3,
  /// Outward surface normal at `location`. May contain NaN for degenerate
  /// geometry; octree construction repairs it.
  pub normal: DVec3,
  /// Material identifier resolved through the material table.
  pub material: String,
  /// Owning actor, if the host tracks one.
  pub actor: Option<ActorId>,
}

/// Scene occupancy queries.
///
/// Must be `Send + Sync`: octree cells are built from rayon workers.
pub trait OccupancyOracle: Send + Sync {
  /// Return the first surface overlapping the cube `center ± half_extent`
  /// whose owner passes [`ActorFilter::admits`].
  fn occupancy(
    &self,
    center: DVec3,
    half_extent: f64,
    precision: Precision,
    filter: &ActorFilter,
  ) -> Option<SurfaceHit>;

  /// Blocking test for a small probe box, used by the interior check.
  fn is_blocked(&self, center: DVec3, half_extent: f64, filter: &ActorFilter) -> bool {
    self
      .occupancy(center, half_extent, Precision::Precise, filter)
      .is_some()
  }
}

impl<T: OccupancyOracle + ?Sized> OccupancyOracle for Box<T> {
  fn occupancy(
    &self,
    center: DVec3,
    half_extent: f64,
    precision: Precision,
    filter: &ActorFilter,
  ) -> Option<SurfaceHit> {
    (**self).occupancy(center, half_extent, precision, filter)
  }

  fn is_blocked(&self, center: DVec3, half_extent: f64, filter: &ActorFilter) -> bool {
    (**self).is_blocked(center, half_extent, filter)
  }
}

impl<T: OccupancyOracle + ?Sized> OccupancyOracle for Arc<T> {
  fn occupancy(
    &self,
    center: DVec3,
    half_extent: f64,
    precision: Precision,
    filter: &ActorFilter,
  ) -> Option<SurfaceHit> {
    (**self).occupancy(center, half_extent, precision, filter)
  }

  fn is_blocked(&self, center: DVec3, half_extent: f64, filter: &ActorFilter) -> bool {
    (**self).is_blocked(center, half_extent, filter)
  }
}

/// A dynamic body that gets its own agent-local octree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentBody {
  pub id: ActorId,
  pub pose: Pose,
  /// Half extents of the body's bounding volume.
  pub half_extents: DVec3,
}

/// Enumerates dynamic bodies in the scene.
pub trait AgentRegistry {
  fn agents(&self) -> Vec<AgentBody>;
}

impl AgentRegistry for [AgentBody] {
  fn agents(&self) -> Vec<AgentBody> {
    self.to_vec()
  }
}

impl AgentRegistry for Vec<AgentBody> {
  fn agents(&self) -> Vec<AgentBody> {
    self.clone()
  }
}
