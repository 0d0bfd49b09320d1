//! Rigid poses for sensors and dynamic bodies.

use glam::{DAffine3, DQuat, DVec3};

/// Position + orientation in world space.
///
/// Local frame convention: +X forward, +Y lateral, +Z up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
  pub position: DVec3,
  pub rotation: DQuat,
}

/// Pose of a sensor at the time of a tick.
pub type SensorPose = Pose;

impl Pose {
  pub fn new(position: DVec3, rotation: DQuat) -> Self {
    Self { position, rotation }
  }

  pub fn from_position(position: DVec3) -> Self {
    Self::new(position, DQuat::IDENTITY)
  }

  pub fn with_rotation(mut self, rotation: DQuat) -> Self {
    self.rotation = rotation;
    self
  }

  /// Unit forward direction (local +X) in world space.
  #[inline]
  pub fn forward(&self) -> DVec3 {
    self.rotation * DVec3::X
  }

  /// Express a world-space point in this pose's local frame.
  #[inline]
  pub fn world_to_local(&self, point: DVec3) -> DVec3 {
    self.rotation.inverse() * (point - self.position)
  }

  /// Express a local point in world space.
  #[inline]
  pub fn local_to_world(&self, point: DVec3) -> DVec3 {
    self.rotation * point + self.position
  }

  #[inline]
  pub fn to_affine(&self) -> DAffine3 {
    DAffine3::from_rotation_translation(self.rotation, self.position)
  }
}

impl Default for Pose {
  fn default() -> Self {
    Self::from_position(DVec3::ZERO)
  }
}
