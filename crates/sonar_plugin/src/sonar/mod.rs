//! Acoustic image formation.
//!
//! Each capture walks the environment index with the sensor's beam, keeps
//! the sensor-facing surface leaves, resolves shadowing per angular bin and
//! bins the reflected intensity by range (and azimuth for imaging kinds).
//!
//! # Module Structure
//!
//! - `angles`: fast atan2 and the sensor-frame spherical convention
//! - `config`: JSON settings, per-kind defaults and binning
//! - `culling`: padded beam tests for coarse nodes
//! - `collect`: parallel leaf collection over cells and agent trees
//! - `shadow`: nearest-surface truncation per angular bin
//! - `image`: accumulation, normalization, noise and streaks
//! - `multipath`: clustered second-bounce echoes
//! - `noise`: Gaussian, Rayleigh and exponential range noise
//! - `debug`: beam outline and leaf points for hosts to draw
//! - `sensor`: the [`SonarSensor`] trait and the [`Sonar`] pipeline
//! - `registry`: named sensors ticked together

pub mod angles;
pub mod collect;
pub mod config;
pub mod culling;
pub mod debug;
pub mod image;
pub mod multipath;
pub mod noise;
pub mod registry;
pub mod sensor;
pub mod shadow;

pub use angles::Spherical;
pub use collect::{Collected, LeafHit};
pub use config::{BeamShape, BinAxis, MultipathConfig, SonarConfig, SonarKind, SonarParams, StreakMode};
pub use culling::BeamCuller;
pub use debug::DebugOverlay;
pub use image::ImageAccumulator;
pub use multipath::MultipathStats;
pub use noise::{GaussianNoise, RangeNoise};
pub use registry::SensorRegistry;
pub use sensor::{Sonar, SonarSensor};
