//! Scene description for baking and offline captures.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{DQuat, DVec3, EulerRot};
use serde::Deserialize;
use sonar_plugin::{
  ActorId, AgentBody, DAabb3, Geometry, MaterialTable, OctreeConfig, Pose, SceneOracle, SceneShape, SonarKind,
};

/// Root scene configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
  /// Map name, used as the cache subdirectory.
  pub map: String,
  /// Cache root, relative to the scene file. Caching is off when unset.
  pub cache_dir: Option<PathBuf>,
  pub octree: OctreeSection,
  /// Material CSV, relative to the scene file. Unknown ids are appended to it
  /// as blank curation records.
  pub materials_csv: Option<PathBuf>,
  #[serde(default)]
  pub materials: Vec<MaterialConfig>,
  #[serde(default)]
  pub shapes: Vec<ShapeConfig>,
  #[serde(default)]
  pub agents: Vec<AgentConfig>,
  #[serde(default)]
  pub sensors: Vec<SensorConfig>,
}

/// Octree sizes and environment bounds.
#[derive(Debug, Deserialize)]
pub struct OctreeSection {
  pub min_size: f64,
  pub max_size: f64,
  #[serde(default)]
  pub center: [f64; 3],
  pub half_extent: [f64; 3],
}

#[derive(Debug, Deserialize)]
pub struct MaterialConfig {
  pub name: String,
  pub density: f64,
  pub speed_of_sound: f64,
}

/// Analytic shape with its material and optional owning agent.
#[derive(Debug, Deserialize)]
pub struct ShapeConfig {
  #[serde(flatten)]
  pub geometry: GeometryConfig,
  pub material: String,
  pub actor: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeometryConfig {
  /// Horizontal seafloor at height `z`.
  Floor { z: f64 },
  Sphere { center: [f64; 3], radius: f64 },
  Box { min: [f64; 3], max: [f64; 3] },
}

/// Position and yaw/pitch/roll in degrees. Positive pitch looks down.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PoseConfig {
  #[serde(default)]
  pub position: [f64; 3],
  #[serde(default)]
  pub yaw: f64,
  #[serde(default)]
  pub pitch: f64,
  #[serde(default)]
  pub roll: f64,
}

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
  pub id: u64,
  #[serde(flatten)]
  pub pose: PoseConfig,
  pub half_extents: [f64; 3],
}

#[derive(Debug, Deserialize)]
pub struct SensorConfig {
  pub name: String,
  pub kind: SonarKind,
  #[serde(flatten)]
  pub pose: PoseConfig,
  /// Agent carrying the sensor.
  pub owner: Option<u64>,
  /// Sonar settings, PascalCase keys as in the JSON payload.
  #[serde(default)]
  pub settings: toml::Table,
}

impl Config {
  /// Load a scene file.
  pub fn load(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read scene: {}", path.display()))?;
    Self::parse(&content).with_context(|| format!("Failed to parse scene: {}", path.display()))
  }

  pub fn parse(content: &str) -> Result<Self> {
    Ok(toml::from_str(content)?)
  }

  pub fn octree_config(&self, base: &Path) -> OctreeConfig {
    let o = &self.octree;
    let bounds = DAabb3::from_center_half_extents(DVec3::from_array(o.center), DVec3::from_array(o.half_extent));
    let config = OctreeConfig::new(o.min_size, o.max_size, bounds);
    match &self.cache_dir {
      Some(dir) => config.with_cache(base.join(dir), self.map.clone()),
      None => config,
    }
  }

  /// CSV table (if any) extended by the inline materials.
  pub fn material_table(&self, base: &Path) -> Result<MaterialTable> {
    let mut table = match &self.materials_csv {
      Some(csv) => {
        let path = base.join(csv);
        MaterialTable::load(&path).with_context(|| format!("Failed to load materials: {}", path.display()))?
      }
      None => MaterialTable::new(),
    };
    for m in &self.materials {
      table.insert(m.name.clone(), m.density, m.speed_of_sound);
    }
    Ok(table)
  }

  pub fn oracle(&self) -> SceneOracle {
    let mut oracle = SceneOracle::new();
    for shape in &self.shapes {
      let geometry = match shape.geometry {
        GeometryConfig::Floor { z } => Geometry::floor(z),
        GeometryConfig::Sphere { center, radius } => Geometry::Sphere {
          center: DVec3::from_array(center),
          radius,
        },
        GeometryConfig::Box { min, max } => Geometry::Aabb {
          min: DVec3::from_array(min),
          max: DVec3::from_array(max),
        },
      };
      let mut scene_shape = SceneShape::new(geometry, shape.material.clone());
      if let Some(actor) = shape.actor {
        scene_shape = scene_shape.with_actor(ActorId(actor));
      }
      oracle = oracle.with_shape(scene_shape);
    }
    oracle
  }

  pub fn agent_bodies(&self) -> Vec<AgentBody> {
    self
      .agents
      .iter()
      .map(|a| AgentBody {
        id: ActorId(a.id),
        pose: a.pose.to_pose(),
        half_extents: DVec3::from_array(a.half_extents),
      })
      .collect()
  }
}

impl PoseConfig {
  pub fn to_pose(self) -> Pose {
    let rotation = DQuat::from_euler(
      EulerRot::ZYX,
      self.yaw.to_radians(),
      self.pitch.to_radians(),
      self.roll.to_radians(),
    );
    Pose::new(DVec3::from_array(self.position), rotation)
  }
}

impl SensorConfig {
  /// Settings as the JSON payload the library parses.
  pub fn settings_json(&self) -> Result<String> {
    serde_json::to_string(&self.settings).with_context(|| format!("Failed to encode settings of `{}`", self.name))
  }
}
