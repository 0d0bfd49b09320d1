//! Surface material table.
//!
//! Maps surface/material identifiers to acoustic impedance
//! (`density * speed_of_sound`). The table is loaded once from a small CSV
//! file:
//!
//! ```text
//! # name, density (kg/m³), speed of sound (m/s)
//! rock,2600,4000
//! sand,1900,1650
//! cardboard,,
//! ```
//!
//! Rows with blank values are curation placeholders and resolve like unknown
//! materials. Unknown identifiers are logged once each, remembered, and
//! assigned [`UNKNOWN_MATERIAL_IMPEDANCE`].

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::constants::UNKNOWN_MATERIAL_IMPEDANCE;
use crate::error::{Result, SonarError};

/// Acoustic properties of one material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialEntry {
  pub density: f64,
  pub speed_of_sound: f64,
}

impl MaterialEntry {
  #[inline]
  pub fn impedance(&self) -> f64 {
    self.density * self.speed_of_sound
  }
}

/// Material id -> impedance table, safe to query from build workers.
#[derive(Debug, Default)]
pub struct MaterialTable {
  entries: HashMap<String, MaterialEntry>,
  /// Ids listed without values (already awaiting curation).
  placeholders: BTreeSet<String>,
  /// Ids queried but not present, in first-seen order of name.
  unknown: Mutex<BTreeSet<String>>,
}

impl MaterialTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_material(mut self, name: impl Into<String>, density: f64, speed_of_sound: f64) -> Self {
    self.insert(name, density, speed_of_sound);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, density: f64, speed_of_sound: f64) {
    let name = name.into();
    self.placeholders.remove(&name);
    self.entries.insert(
      name,
      MaterialEntry {
        density,
        speed_of_sound,
      },
    );
  }

  /// Parse the CSV form shown in the module docs.
  pub fn from_csv_str(text: &str) -> Result<Self> {
    let mut table = Self::new();
    for (i, raw) in text.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let fields: Vec<&str> = line.split(',').map(str::trim).collect();
      if fields.len() != 3 {
        return Err(SonarError::MaterialTable {
          line: i + 1,
          reason: format!("expected 3 fields, found {}", fields.len()),
        });
      }
      let name = fields[0];
      if name.is_empty() {
        return Err(SonarError::MaterialTable {
          line: i + 1,
          reason: "missing material name".into(),
        });
      }
      if fields[1].is_empty() || fields[2].is_empty() {
        table.placeholders.insert(name.to_string());
        continue;
      }
      let parse = |s: &str| {
        s.parse::<f64>().map_err(|e| SonarError::MaterialTable {
          line: i + 1,
          reason: format!("`{s}`: {e}"),
        })
      };
      let density = parse(fields[1])?;
      let speed = parse(fields[2])?;
      table.insert(name, density, speed);
    }
    debug!(
      materials = table.entries.len(),
      placeholders = table.placeholders.len(),
      "loaded material table"
    );
    Ok(table)
  }

  /// Load the table from a CSV file.
  pub fn load(path: &Path) -> Result<Self> {
    let text = std::fs::read_to_string(path).map_err(|e| SonarError::io(path, e))?;
    Self::from_csv_str(&text)
  }

  pub fn get(&self, id: &str) -> Option<&MaterialEntry> {
    self.entries.get(id)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Impedance of `id`, falling back to [`UNKNOWN_MATERIAL_IMPEDANCE`].
  pub fn impedance(&self, id: &str) -> f64 {
    if let Some(entry) = self.entries.get(id) {
      return entry.impedance();
    }
    let mut unknown = self.unknown.lock().unwrap_or_else(|p| p.into_inner());
    if unknown.insert(id.to_string()) {
      warn!(material = id, "unknown material, using high impedance");
    }
    UNKNOWN_MATERIAL_IMPEDANCE
  }

  /// Ids queried so far that have no values in the table.
  pub fn unknown_materials(&self) -> Vec<String> {
    let unknown = self.unknown.lock().unwrap_or_else(|p| p.into_inner());
    unknown.iter().cloned().collect()
  }

  /// Append a blank `name,,` record for every unknown id not already listed
  /// in the file. Returns the number of records written.
  pub fn append_curation_records(&self, path: &Path) -> Result<usize> {
    let pending: Vec<String> = self
      .unknown_materials()
      .into_iter()
      .filter(|id| !self.placeholders.contains(id))
      .collect();
    if pending.is_empty() {
      return Ok(0);
    }

    let mut file = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .map_err(|e| SonarError::io(path, e))?;
    for id in &pending {
      writeln!(file, "{id},,").map_err(|e| SonarError::io(path, e))?;
    }
    Ok(pending.len())
  }
}
