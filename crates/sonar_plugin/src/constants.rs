//! Physical constants and pipeline defaults.
//!
//! All lengths are in meters, all angles in degrees unless a name says
//! otherwise.

/// Seawater density in kg/m³.
pub const WATER_DENSITY: f64 = 997.0;

/// Speed of sound in seawater in m/s.
pub const WATER_SPEED_OF_SOUND: f64 = 1480.0;

/// Acoustic impedance assigned to surfaces whose material is unknown.
///
/// Large enough that the reflection coefficient is effectively 1.
pub const UNKNOWN_MATERIAL_IMPEDANCE: f64 = 1.0e12;

/// Default minimum (leaf) node edge length.
pub const DEFAULT_MIN_NODE_SIZE: f64 = 0.1;

/// Default requested cache granularity before power-of-two rounding.
pub const DEFAULT_MAX_NODE_SIZE: f64 = 5.0;

/// Default environment half extent per axis around the origin.
pub const DEFAULT_ENVIRONMENT_HALF_EXTENT: f64 = 10.0;

/// Half extent of the probe boxes used by the interior test, relative to the
/// minimum node size.
pub const CORNER_EPSILON_FRACTION: f64 = 0.01;

/// Returns within this angle of the surface normal count as "perfect".
pub const PERFECT_NORMAL_ANGLE: f64 = 8.0;

/// Fraction of perfect returns in a range row that triggers streak correction.
pub const STREAK_THRESHOLD: f64 = 0.08;

/// Default multipath clustering neighbourhood, in bins per axis.
pub const DEFAULT_CLUSTER_SIZE: usize = 5;

/// Minimum normal agreement for two returns to share a multipath cluster.
pub const CLUSTER_NORMAL_THRESHOLD: f64 = 0.965;

/// Steps the multipath raymarch skips before testing for hits.
pub const MULTIPATH_START_STEPS: usize = 30;

/// Shadow epsilon default for beam sonars, in multiples of the minimum node size.
pub const SHADOW_EPSILON_NODES: f64 = 4.0;

/// File holding the index structure above cache granularity.
pub const ROOTS_FILE: &str = "roots.json";
