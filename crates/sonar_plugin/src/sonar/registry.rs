//! Named sensors ticked together against one environment.

use tracing::debug;

use super::sensor::SonarSensor;
use crate::index::EnvironmentIndex;
use crate::pose::SensorPose;

struct Entry {
  name: String,
  sensor: Box<dyn SonarSensor>,
}

/// Explicit collection of sensors owned by the host.
#[derive(Default)]
pub struct SensorRegistry {
  entries: Vec<Entry>,
}

impl SensorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `sensor` under `name`, replacing any sensor of the same name.
  pub fn add(&mut self, name: impl Into<String>, sensor: Box<dyn SonarSensor>) {
    let name = name.into();
    match self.entries.iter_mut().find(|e| e.name == name) {
      Some(entry) => {
        debug!(%name, "replacing sensor");
        entry.sensor = sensor;
      }
      None => self.entries.push(Entry { name, sensor }),
    }
  }

  pub fn remove(&mut self, name: &str) -> Option<Box<dyn SonarSensor>> {
    let i = self.entries.iter().position(|e| e.name == name)?;
    Some(self.entries.remove(i).sensor)
  }

  pub fn get(&self, name: &str) -> Option<&dyn SonarSensor> {
    self.entries.iter().find(|e| e.name == name).map(|e| &*e.sensor)
  }

  pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn SonarSensor + 'static)> {
    self.entries.iter_mut().find(|e| e.name == name).map(|e| &mut *e.sensor)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|e| e.name.as_str())
  }

  /// Tick every sensor in registration order. `pose_of` supplies each
  /// sensor's pose by name; sensors without one are not ticked.
  ///
  /// Returns the names of the sensors that produced a new image.
  pub fn tick_all(
    &mut self,
    index: &mut EnvironmentIndex,
    mut pose_of: impl FnMut(&str) -> Option<SensorPose>,
    dt: f64,
  ) -> Vec<String> {
    let mut captured = Vec::new();
    for entry in &mut self.entries {
      let Some(pose) = pose_of(&entry.name) else {
        continue;
      };
      if entry.sensor.tick(index, &pose, dt).is_some() {
        captured.push(entry.name.clone());
      }
    }
    captured
  }
}
