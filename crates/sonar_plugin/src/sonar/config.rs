//! Sonar settings: the raw JSON payload and its validated, resolved form.
//!
//! Every key is optional. Bin counts and resolutions derive each other
//! (`bins` wins over `res`); anything left unset falls back to the per-kind
//! defaults below.
//!
//! | kind | RangeMin | RangeMax | Azimuth | Elevation |
//! |---|---|---|---|---|
//! | imaging | 0.1 | 10 | 120 | 20 |
//! | profiling | 0.5 | 75 | 120 | 1 |
//! | sidescan | 0.5 | 35 | 170 | 0.25 |
//! | singlebeam | 0.5 | 10 | 360 (central) | 30 (`OpeningAngle`) |

use std::f64::consts::PI;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{
  CLUSTER_NORMAL_THRESHOLD, DEFAULT_CLUSTER_SIZE, MULTIPATH_START_STEPS, SHADOW_EPSILON_NODES, WATER_DENSITY,
  WATER_SPEED_OF_SOUND,
};
use crate::error::{Result, SonarError};

use super::noise::{GaussianNoise, RangeNoise};

// =============================================================================
// SonarKind
// =============================================================================

/// Sensor variant: selects beam geometry, output layout and defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SonarKind {
  /// Forward-looking range x azimuth image.
  Imaging,
  /// Imaging geometry with a thin elevation fan and long range.
  Profiling,
  /// Port/starboard range profile.
  Sidescan,
  /// Conical beam, range profile only.
  Singlebeam,
}

impl SonarKind {
  pub const ALL: [SonarKind; 4] = [Self::Imaging, Self::Profiling, Self::Sidescan, Self::Singlebeam];

  /// Imaging and profiling produce 2D images and support multipath.
  #[inline]
  pub fn is_imaging(self) -> bool {
    matches!(self, Self::Imaging | Self::Profiling)
  }

  fn default_range(self) -> (f64, f64) {
    match self {
      Self::Imaging => (0.1, 10.0),
      Self::Profiling => (0.5, 75.0),
      Self::Sidescan => (0.5, 35.0),
      Self::Singlebeam => (0.5, 10.0),
    }
  }

  fn default_azimuth(self) -> f64 {
    match self {
      Self::Imaging | Self::Profiling => 120.0,
      Self::Sidescan => 170.0,
      Self::Singlebeam => 360.0,
    }
  }

  fn default_elevation(self) -> f64 {
    match self {
      Self::Imaging => 20.0,
      Self::Profiling => 1.0,
      Self::Sidescan => 0.25,
      Self::Singlebeam => 30.0,
    }
  }
}

// =============================================================================
// SonarParams
// =============================================================================

/// Raw settings payload. Lengths in meters, angles in degrees.
///
/// Integer keys also accept integral floats (`"RangeBins": 64.0`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SonarParams {
  // Geometry
  pub range_min: Option<f64>,
  pub range_max: Option<f64>,
  pub azimuth: Option<f64>,
  pub elevation: Option<f64>,
  pub opening_angle: Option<f64>,

  // Binning
  #[serde(deserialize_with = "integral")]
  pub range_bins: Option<usize>,
  pub range_res: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub azimuth_bins: Option<usize>,
  pub azimuth_res: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub elevation_bins: Option<usize>,
  pub elevation_res: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub opening_angle_bins: Option<usize>,
  pub opening_angle_res: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub central_angle_bins: Option<usize>,
  pub central_angle_res: Option<f64>,

  // Noise
  pub add_sigma: Option<f64>,
  pub add_cov: Option<f64>,
  pub mult_sigma: Option<f64>,
  pub mult_cov: Option<f64>,
  pub range_sigma: Option<f64>,
  pub scale_noise: Option<bool>,
  #[serde(deserialize_with = "integral")]
  pub azimuth_streaks: Option<i32>,

  // Multipath
  pub multi_path: Option<bool>,
  #[serde(deserialize_with = "integral")]
  pub cluster_size: Option<usize>,
  pub cluster_normal_threshold: Option<f64>,
  pub multi_path_step_size: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub multi_path_iterations: Option<usize>,
  #[serde(deserialize_with = "integral")]
  pub multi_path_start_steps: Option<usize>,

  // Performance and misc
  pub shadow_epsilon: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub ticks_per_capture: Option<u32>,
  pub init_octree_range: Option<f64>,
  pub water_density: Option<f64>,
  pub water_speed_sound: Option<f64>,
  #[serde(deserialize_with = "integral")]
  pub seed: Option<u64>,

  // Visualization
  pub view_region: Option<bool>,
  #[serde(deserialize_with = "integral")]
  pub view_octree: Option<i64>,
}

impl SonarParams {
  /// Parse a JSON object. An empty or whitespace-only payload means "all
  /// defaults".
  pub fn from_json(json: &str) -> Result<Self> {
    if json.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_json::from_str(json)?)
  }
}

/// Integer setting written as any JSON number without a fractional part.
fn integral<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: TryFrom<i128>,
{
  let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
    return Ok(None);
  };
  let whole = if let Some(i) = number.as_i64() {
    i128::from(i)
  } else if let Some(u) = number.as_u64() {
    i128::from(u)
  } else {
    match number.as_f64() {
      Some(f) if f.is_finite() && f.fract() == 0.0 => f as i128,
      _ => return Err(de::Error::custom(format!("expected an integer, got {number}"))),
    }
  };
  T::try_from(whole)
    .map(Some)
    .map_err(|_| de::Error::custom(format!("integer {number} out of range")))
}

// =============================================================================
// Resolved configuration
// =============================================================================

/// One binned dimension: `index = floor((value - min) / res)`, clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinAxis {
  pub min: f64,
  pub res: f64,
  pub bins: usize,
}

impl BinAxis {
  /// Bin holding `value`. Out-of-range values land in the edge bins.
  #[inline]
  pub fn index(&self, value: f64) -> usize {
    let i = ((value - self.min) / self.res).floor();
    if i <= 0.0 {
      0
    } else {
      (i as usize).min(self.bins - 1)
    }
  }

  /// Lower edge of bin `i`.
  #[inline]
  pub fn edge(&self, i: usize) -> f64 {
    self.min + i as f64 * self.res
  }
}

/// How a dimension is sized when neither bins nor resolution is given.
enum AxisDefault {
  Bins(usize),
  Res(f64),
}

fn resolve_axis(
  bins_key: &'static str,
  res_key: &'static str,
  min: f64,
  span: f64,
  bins: Option<usize>,
  res: Option<f64>,
  default: impl FnOnce() -> AxisDefault,
) -> Result<BinAxis> {
  let from_res = |key: &'static str, res: f64| -> Result<BinAxis> {
    if !(res > 0.0) {
      return Err(SonarError::invalid(key, format!("must be positive, got {res}")));
    }
    let bins = (span / res) as usize;
    if bins == 0 {
      return Err(SonarError::invalid(key, format!("{res} is wider than the {span} span")));
    }
    Ok(BinAxis { min, res, bins })
  };
  let from_bins = |key: &'static str, bins: usize| -> Result<BinAxis> {
    if bins == 0 {
      return Err(SonarError::invalid(key, "must be at least 1"));
    }
    Ok(BinAxis {
      min,
      res: span / bins as f64,
      bins,
    })
  };

  match (bins, res) {
    (Some(bins), _) => from_bins(bins_key, bins),
    (None, Some(res)) => from_res(res_key, res),
    (None, None) => match default() {
      AxisDefault::Bins(bins) => from_bins(bins_key, bins),
      AxisDefault::Res(res) => from_res(res_key, res),
    },
  }
}

/// Beam geometry in the sensor frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BeamShape {
  /// Rectangular fan: azimuth span around +Z, elevation span around the
  /// horizontal plane.
  Fan { azimuth: f64, elevation: f64 },
  /// Cone around +X with the given full opening angle.
  Cone { opening: f64 },
}

/// Row-streak post-processing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreakMode {
  #[default]
  Off,
  /// Square rows dominated by perfect returns.
  Suppress,
  /// Complement-square those rows.
  Emphasize,
}

/// Multipath raymarch settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultipathConfig {
  /// Neighbourhood in bins per axis.
  pub cluster_size: usize,
  pub normal_threshold: f64,
  pub step_size: f64,
  pub iterations: usize,
  pub start_steps: usize,
}

/// Validated sensor configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SonarConfig {
  pub kind: SonarKind,
  pub beam: BeamShape,
  pub range_min: f64,
  pub range_max: f64,
  pub range: BinAxis,
  /// Azimuth (fan) or central angle (cone).
  pub azimuth: BinAxis,
  /// Elevation (fan) or opening angle (cone).
  pub elevation: BinAxis,
  /// Azimuth bins merged per shadow bin.
  pub azimuth_bin_scale: usize,
  /// Sine of half the narrowest beam angle, used to pad coarse nodes.
  pub sin_offset: f64,
  pub add_noise: GaussianNoise,
  pub mult_noise: GaussianNoise,
  pub range_noise: RangeNoise,
  pub scale_noise: bool,
  pub streaks: StreakMode,
  /// None when disabled or unsupported by the kind.
  pub multipath: Option<MultipathConfig>,
  pub shadow_epsilon: f64,
  pub ticks_per_capture: u32,
  pub init_octree_range: f64,
  pub water_impedance: f64,
  pub seed: Option<u64>,
  pub view_region: bool,
  /// `-1` shows every retained leaf, `n >= 0` only azimuth bin `n`.
  pub view_octree: Option<i64>,
}

fn positive(key: &'static str, value: f64) -> Result<f64> {
  if value > 0.0 && value.is_finite() {
    Ok(value)
  } else {
    Err(SonarError::invalid(key, format!("must be positive, got {value}")))
  }
}

fn non_negative(key: &'static str, value: Option<f64>) -> Result<Option<f64>> {
  match value {
    Some(v) if !(v >= 0.0) => Err(SonarError::invalid(key, format!("must not be negative, got {v}"))),
    other => Ok(other),
  }
}

impl SonarConfig {
  /// Apply defaults for `kind` and validate. `min_size` is the octree leaf
  /// size, which several defaults scale with.
  pub fn resolve(params: &SonarParams, kind: SonarKind, min_size: f64) -> Result<Self> {
    let (default_min, default_max) = kind.default_range();
    let range_min = params.range_min.unwrap_or(default_min);
    let range_max = positive("RangeMax", params.range_max.unwrap_or(default_max))?;
    if !(range_min >= 0.0) || range_min >= range_max {
      return Err(SonarError::invalid(
        "RangeMin",
        format!("must be in [0, RangeMax), got {range_min}"),
      ));
    }
    let span = range_max - range_min;

    let (beam, range, azimuth, elevation) = match kind {
      SonarKind::Singlebeam => {
        let opening = positive("OpeningAngle", params.opening_angle.unwrap_or(kind.default_elevation()))?;
        if opening > 180.0 {
          return Err(SonarError::invalid("OpeningAngle", "must not exceed 180 degrees"));
        }
        let range = resolve_axis("RangeBins", "RangeRes", range_min, span, params.range_bins, params.range_res, || {
          AxisDefault::Bins(200)
        })?;
        let central = resolve_axis(
          "CentralAngleBins",
          "CentralAngleRes",
          -180.0,
          360.0,
          params.central_angle_bins,
          params.central_angle_res,
          || AxisDefault::Bins(((range_min * 360.0 * PI / 180.0 / min_size) as usize).max(6)),
        )?;
        let opening_axis = resolve_axis(
          "OpeningAngleBins",
          "OpeningAngleRes",
          0.0,
          opening,
          params.opening_angle_bins,
          params.opening_angle_res,
          || AxisDefault::Bins(((range_min * opening * PI / 180.0 / min_size) as usize).max(1)),
        )?;
        (BeamShape::Cone { opening }, range, central, opening_axis)
      }
      _ => {
        let az_span = positive("Azimuth", params.azimuth.unwrap_or(kind.default_azimuth()))?;
        let el_span = positive("Elevation", params.elevation.unwrap_or(kind.default_elevation()))?;
        if az_span > 360.0 {
          return Err(SonarError::invalid("Azimuth", "must not exceed 360 degrees"));
        }
        if el_span > 180.0 {
          return Err(SonarError::invalid("Elevation", "must not exceed 180 degrees"));
        }

        let range = resolve_axis("RangeBins", "RangeRes", range_min, span, params.range_bins, params.range_res, || {
          match kind {
            SonarKind::Sidescan => AxisDefault::Res(0.05),
            SonarKind::Profiling => AxisDefault::Bins(750),
            _ => AxisDefault::Bins(512),
          }
        })?;
        let azimuth = resolve_axis(
          "AzimuthBins",
          "AzimuthRes",
          -az_span / 2.0,
          az_span,
          params.azimuth_bins,
          params.azimuth_res,
          || match kind {
            SonarKind::Sidescan => AxisDefault::Res(180.0 * min_size / (PI * (range_min + 0.1 * span))),
            SonarKind::Profiling => AxisDefault::Bins(480),
            _ => AxisDefault::Bins(512),
          },
        )?;
        // Shadow bins should be about one leaf wide where the beam starts.
        let shadow_dist = match kind {
          SonarKind::Sidescan => range_min,
          _ => span / 8.0 + range_min,
        };
        let elevation = resolve_axis(
          "ElevationBins",
          "ElevationRes",
          90.0 - el_span / 2.0,
          el_span,
          params.elevation_bins,
          params.elevation_res,
          || AxisDefault::Bins(((shadow_dist * el_span * PI / 180.0 / min_size) as usize).max(1)),
        )?;
        if kind == SonarKind::Sidescan && range_min * el_span * PI / 180.0 / min_size < 1.0 {
          warn!(
            recommended_elevation = min_size * 180.0 / (range_min * PI),
            recommended_min_size = range_min * el_span * PI / 180.0,
            "sidescan elevation is narrower than one octree leaf at minimum range"
          );
        }
        (
          BeamShape::Fan {
            azimuth: az_span,
            elevation: el_span,
          },
          range,
          azimuth,
          elevation,
        )
      }
    };

    let azimuth_bin_scale = if kind.is_imaging() {
      let dist = span / 8.0 + range_min;
      let mut scale = 1usize;
      while min_size >= dist * azimuth.res * PI / 180.0 * scale as f64 && scale < azimuth.bins {
        scale *= 2;
      }
      scale.min(azimuth.bins)
    } else {
      1
    };

    let sin_offset = match beam {
      BeamShape::Fan { azimuth, elevation } => (azimuth.min(elevation) / 2.0).to_radians().sin(),
      BeamShape::Cone { opening } => (opening.min(360.0) / 2.0).to_radians().sin(),
    };

    let add_noise = GaussianNoise::from_settings(
      non_negative("AddSigma", params.add_sigma)?,
      non_negative("AddCov", params.add_cov)?,
    );
    let mult_noise = GaussianNoise::from_settings(
      non_negative("MultSigma", params.mult_sigma)?,
      non_negative("MultCov", params.mult_cov)?,
    );
    let range_noise = RangeNoise::new(non_negative("RangeSigma", params.range_sigma)?.unwrap_or(0.0));

    let streaks = match params.azimuth_streaks.unwrap_or(0) {
      0 => StreakMode::Off,
      -1 => StreakMode::Suppress,
      1 => StreakMode::Emphasize,
      other => {
        return Err(SonarError::invalid(
          "AzimuthStreaks",
          format!("must be -1, 0 or 1, got {other}"),
        ))
      }
    };

    let multipath = match params.multi_path.unwrap_or(false) {
      true if kind.is_imaging() => {
        let normal_threshold = params.cluster_normal_threshold.unwrap_or(CLUSTER_NORMAL_THRESHOLD);
        if !(-1.0..=1.0).contains(&normal_threshold) {
          return Err(SonarError::invalid("ClusterNormalThreshold", "must be in [-1, 1]"));
        }
        Some(MultipathConfig {
          cluster_size: params.cluster_size.unwrap_or(DEFAULT_CLUSTER_SIZE),
          normal_threshold,
          step_size: positive("MultiPathStepSize", params.multi_path_step_size.unwrap_or(min_size))?,
          iterations: params
            .multi_path_iterations
            .unwrap_or((range_max / min_size) as usize),
          start_steps: params.multi_path_start_steps.unwrap_or(MULTIPATH_START_STEPS),
        })
      }
      true => {
        warn!(?kind, "multipath is only simulated for imaging sonars, ignoring");
        None
      }
      false => None,
    };

    let default_epsilon = match kind {
      SonarKind::Singlebeam => min_size,
      _ => SHADOW_EPSILON_NODES * min_size,
    };
    let shadow_epsilon = positive("ShadowEpsilon", params.shadow_epsilon.unwrap_or(default_epsilon))?;

    let ticks_per_capture = params.ticks_per_capture.unwrap_or(1);
    if ticks_per_capture == 0 {
      return Err(SonarError::invalid("TicksPerCapture", "must be at least 1"));
    }
    let init_octree_range = match params.init_octree_range {
      Some(r) if r > 0.0 => r,
      _ => range_max,
    };

    let water_density = positive("WaterDensity", params.water_density.unwrap_or(WATER_DENSITY))?;
    let water_speed = positive("WaterSpeedSound", params.water_speed_sound.unwrap_or(WATER_SPEED_OF_SOUND))?;

    Ok(Self {
      kind,
      beam,
      range_min,
      range_max,
      range,
      azimuth,
      elevation,
      azimuth_bin_scale,
      sin_offset,
      add_noise,
      mult_noise,
      range_noise,
      scale_noise: params.scale_noise.unwrap_or(false),
      streaks,
      multipath,
      shadow_epsilon,
      ticks_per_capture,
      init_octree_range,
      water_impedance: water_density * water_speed,
      seed: params.seed,
      view_region: params.view_region.unwrap_or(false),
      view_octree: params.view_octree.filter(|v| *v >= -1),
    })
  }

  /// Parse the JSON payload and resolve it in one step.
  pub fn from_json(json: &str, kind: SonarKind, min_size: f64) -> Result<Self> {
    Self::resolve(&SonarParams::from_json(json)?, kind, min_size)
  }

  /// Output image width: azimuth bins for imaging kinds, 1 otherwise.
  #[inline]
  pub fn image_width(&self) -> usize {
    if self.kind.is_imaging() {
      self.azimuth.bins
    } else {
      1
    }
  }

  /// Number of `f32` values per capture.
  #[inline]
  pub fn image_len(&self) -> usize {
    self.range.bins * self.image_width()
  }

  /// Shadow columns along azimuth after merging.
  #[inline]
  pub fn shadow_columns(&self) -> usize {
    self.azimuth.bins.div_ceil(self.azimuth_bin_scale)
  }

  #[inline]
  pub fn shadow_bins(&self) -> usize {
    self.shadow_columns() * self.elevation.bins
  }

  /// Shadow bin for an (azimuth, elevation) bin pair.
  #[inline]
  pub fn shadow_index(&self, azimuth: usize, elevation: usize) -> usize {
    elevation * self.shadow_columns() + azimuth / self.azimuth_bin_scale
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
