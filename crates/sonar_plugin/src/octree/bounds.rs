//! Environment bounds.

use glam::DVec3;

/// Axis-aligned box in world space, corners inclusive.
///
/// The index root is the smallest lattice cube covering it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
  pub min: DVec3,
  pub max: DVec3,
}

impl DAabb3 {
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(min.cmple(max).all(), "inverted bounds {min} .. {max}");
    Self { min, max }
  }

  pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
    Self::new(center - half_extents, center + half_extents)
  }

  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Half edge of the smallest cube around `center` enclosing the box.
  #[inline]
  pub fn cube_half_extent_from(&self, center: DVec3) -> f64 {
    (self.max - center).max(center - self.min).max_element()
  }

  /// Finite corners with `min <= max`.
  pub fn is_valid(&self) -> bool {
    self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
  }
}
