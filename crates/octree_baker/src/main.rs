//! Octree cache baker and offline sonar capture tool.
//!
//! `bake` builds every cache cell of a scene so later runs start warm.
//! `capture` ticks the scene's sensors and writes their images:
//!
//! - `{name}.f32`: raw little-endian `f32`, `range_bins` rows of `width`
//! - `{name}.json`: layout and geometry of the image
//!
//! Logging follows `RUST_LOG` when set, else `info` (`debug` with `--verbose`).

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sonar_plugin::{
  ActorId, EnvironmentIndex, IndexBuilder, MaterialTable, SensorPose, SensorRegistry, Sonar, SonarKind,
};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use config::Config;

/// Scene octree baker and sonar capture tool.
#[derive(Parser, Debug)]
#[command(name = "octree_baker")]
#[command(about = "Bakes scene octree caches and runs offline sonar captures")]
struct Args {
  /// Path to the scene TOML file.
  #[arg(short, long)]
  scene: PathBuf,

  /// Log at debug level (ignored when `RUST_LOG` is set).
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Build and cache every octree cell of the scene.
  Bake,
  /// Tick the scene's sensors and write their last images.
  Capture {
    /// Output directory.
    #[arg(short, long, default_value = "captures")]
    output: PathBuf,

    /// Ticks to simulate.
    #[arg(short, long, default_value_t = 1)]
    ticks: u32,

    /// Seconds per tick.
    #[arg(long, default_value_t = 1.0 / 30.0)]
    dt: f64,

    /// Only run the named sensor.
    #[arg(long)]
    sensor: Option<String>,
  },
}

/// Sidecar written next to each image.
#[derive(Debug, Serialize)]
struct ImageHeader<'a> {
  name: &'a str,
  kind: SonarKind,
  range_bins: usize,
  width: usize,
  range_min: f64,
  range_max: f64,
  ticks: u32,
}

fn main() -> Result<()> {
  let args = Args::parse();
  let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
  tracing_subscriber::fmt()
    .with_env_filter(log_filter(rust_log.as_deref(), args.verbose))
    .with_target(false)
    .init();

  let base = args.scene.parent().unwrap_or(Path::new(".")).to_path_buf();
  let config = Config::load(&args.scene)?;
  let materials = config.material_table(&base)?;
  let mut index = build_index(&config, &base, materials)?;

  match args.command {
    Command::Bake => bake(&config, &mut index)?,
    Command::Capture {
      output,
      ticks,
      dt,
      sensor,
    } => capture(&config, &mut index, &output, ticks, dt, sensor.as_deref())?,
  }

  if let Some(csv) = &config.materials_csv {
    let path = base.join(csv);
    let added = index
      .materials()
      .append_curation_records(&path)
      .with_context(|| format!("Failed to append curation records: {}", path.display()))?;
    if added > 0 {
      warn!(added, path = %path.display(), "recorded unknown materials for curation");
    }
  }
  Ok(())
}

/// `RUST_LOG` directives when they parse, else the `--verbose` level.
fn log_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
  let level = if verbose { Level::DEBUG } else { Level::INFO };
  rust_log
    .and_then(|directives| EnvFilter::try_new(directives).ok())
    .unwrap_or_else(|| EnvFilter::new(level.to_string()))
}

fn build_index(config: &Config, base: &Path, materials: MaterialTable) -> Result<EnvironmentIndex> {
  let octree = config.octree_config(base);
  let agents = config.agent_bodies();
  info!(
    map = %config.map,
    shapes = config.shapes.len(),
    agents = agents.len(),
    cache_size = octree.cache_size(),
    "building environment index"
  );
  IndexBuilder::new(octree, config.oracle(), materials)
    .with_agents(&agents)
    .build()
    .context("Failed to build environment index")
}

fn bake(config: &Config, index: &mut EnvironmentIndex) -> Result<()> {
  if config.cache_dir.is_none() {
    bail!("scene `{}` has no cache_dir, nothing to bake", config.map);
  }
  let built = index.prebuild_all();
  info!(cells = built, total = index.cells().len(), "bake finished");
  Ok(())
}

fn capture(
  config: &Config,
  index: &mut EnvironmentIndex,
  output: &Path,
  ticks: u32,
  dt: f64,
  only: Option<&str>,
) -> Result<()> {
  let mut registry = SensorRegistry::new();
  let mut layouts = Vec::new();
  for sensor in config.sensors.iter().filter(|s| only.is_none_or(|name| s.name == name)) {
    let json = sensor.settings_json()?;
    let mut sonar = Sonar::new(sensor.kind, &json, index.config())
      .with_context(|| format!("Invalid settings for sensor `{}`", sensor.name))?;
    if let Some(owner) = sensor.owner {
      sonar = sonar.with_owner(ActorId(owner));
    }
    let c = sonar.config();
    layouts.push((sensor.name.as_str(), c.range.bins, c.image_width(), c.range_min, c.range_max));
    registry.add(sensor.name.clone(), Box::new(sonar));
  }
  if registry.is_empty() {
    bail!("no sensors to capture");
  }

  let poses: Vec<(&str, SensorPose)> = config.sensors.iter().map(|s| (s.name.as_str(), s.pose.to_pose())).collect();
  let pose_of = |name: &str| poses.iter().find(|(n, _)| *n == name).map(|(_, p)| *p);
  for tick in 0..ticks {
    let captured = registry.tick_all(index, pose_of, dt);
    tracing::debug!(tick, ?captured, "tick");
  }

  std::fs::create_dir_all(output).with_context(|| format!("Failed to create output dir: {}", output.display()))?;
  for (name, range_bins, width, range_min, range_max) in layouts {
    let Some(sensor) = registry.get(name) else {
      continue;
    };
    let bytes: Vec<u8> = sensor.image().iter().flat_map(|v| v.to_le_bytes()).collect();
    let image_path = output.join(format!("{name}.f32"));
    std::fs::write(&image_path, bytes).with_context(|| format!("Failed to write: {}", image_path.display()))?;

    let header = ImageHeader {
      name,
      kind: sensor.kind(),
      range_bins,
      width,
      range_min,
      range_max,
      ticks,
    };
    let header_path = output.join(format!("{name}.json"));
    std::fs::write(&header_path, serde_json::to_string_pretty(&header)?)
      .with_context(|| format!("Failed to write: {}", header_path.display()))?;
    info!(sensor = name, path = %image_path.display(), "wrote capture");
  }
  Ok(())
}
