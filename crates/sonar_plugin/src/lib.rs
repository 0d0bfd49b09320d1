//! sonar_plugin - Framework/engine independent underwater sonar simulation
//!
//! Static scene geometry is converted into a disk-backed octree of reflective
//! surface cells. Every sensor capture casts a volumetric beam through that
//! index and synthesizes an acoustic image with shadowing, multipath
//! reflections and sensor noise.
//!
//! # Features
//!
//! - **Octree Index**: lazily loaded cells cached per map as JSON, built from
//!   an abstract occupancy oracle
//! - **Agent Octrees**: small trees around dynamic bodies, moved rigidly with
//!   the body instead of being rebuilt
//! - **Image Formation**: imaging, profiling, sidescan and single-beam sonar
//!   variants sharing one parameterized pipeline
//! - **Multipath**: clustered secondary reflections raymarched through the
//!   returns of the current capture
//!
//! # Example
//!
//! ```ignore
//! use sonar_plugin::{IndexBuilder, OctreeConfig, Sonar, SonarKind, SensorPose};
//!
//! let mut index = IndexBuilder::new(OctreeConfig::default(), oracle, materials).build()?;
//! let mut sonar = Sonar::new(SonarKind::Imaging, r#"{"RangeMax": 20}"#, index.config())?;
//!
//! if let Some(image) = sonar.tick(&mut index, &SensorPose::default(), 1.0 / 60.0) {
//!   println!("{} bins", image.len());
//! }
//! ```

pub mod constants;
pub mod error;
pub mod material;
pub mod oracle;
pub mod pose;
pub mod shapes;

pub use error::{Result, SonarError};
pub use material::MaterialTable;
pub use oracle::{ActorFilter, ActorId, AgentBody, AgentRegistry, OccupancyOracle, Precision, SurfaceHit};
pub use pose::{Pose, SensorPose};
pub use shapes::{Geometry, SceneOracle, SceneShape};

// Octree module with disk-backed cells
pub mod octree;
pub use octree::{BuildContext, DAabb3, NodeKey, OctreeConfig, SpatialNode};

// Environment index and agent-local octrees
pub mod index;
pub use index::{AgentOctree, EnvironmentIndex, IndexBuilder};

// Sonar image-formation pipeline
pub mod sonar;
pub use sonar::{
  DebugOverlay, SensorRegistry, Sonar, SonarConfig, SonarKind, SonarParams, SonarSensor,
};

pub mod metrics;

#[cfg(test)]
pub mod test_utils;
