//! Error types for index construction and sensor configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers of the library.
///
/// Cache misses and corrupt cache files are not errors: they are logged and
/// the affected cell is rebuilt.
#[derive(Debug, Error)]
pub enum SonarError {
  /// The sensor settings payload is not valid JSON or has mistyped values.
  #[error("failed to parse sonar settings: {0}")]
  Settings(#[from] serde_json::Error),

  /// A setting parsed but is out of range.
  #[error("invalid sonar setting `{key}`: {reason}")]
  InvalidSetting { key: &'static str, reason: String },

  /// Octree sizes or environment bounds are unusable.
  #[error("invalid octree configuration: {0}")]
  InvalidOctree(String),

  /// Filesystem failure outside the self-healing cache paths.
  #[error("i/o error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Material table text could not be parsed.
  #[error("material table line {line}: {reason}")]
  MaterialTable { line: usize, reason: String },
}

impl SonarError {
  pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidSetting {
      key,
      reason: reason.into(),
    }
  }

  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

pub type Result<T> = std::result::Result<T, SonarError>;
