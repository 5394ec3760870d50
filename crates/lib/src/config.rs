//! Runtime settings consumed by the build core.
//!
//! Settings are resolved once and passed around explicitly; nothing in the
//! library reads them from ambient process state at encode time.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults (build key version 2)
//! 2. JSON settings file (`ENVSTORE_CONFIG` or `<config_dir>/settings.json`)
//! 3. `ENVSTORE_BUILD_KEY_VERSION`

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::build::key::{BuildKeyCodec, BuildKeyVersion};
use crate::consts::{BUILD_KEY_VERSION_ENV, CONFIG_PATH_ENV, SETTINGS_FILENAME};
use crate::platform::paths::config_dir;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid build key version: {0}, expected: (1, 2, 3)")]
  InvalidBuildKeyVersion(String),

  #[error("failed to read settings file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse settings file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  build_key_version: BuildKeyVersion,
}

impl Settings {
  pub fn build_key_version(&self) -> BuildKeyVersion {
    self.build_key_version
  }

  /// Validates and sets the active build key version.
  ///
  /// Invalid values are rejected here so they never reach key derivation.
  pub fn set_build_key_version(&mut self, value: i64) -> Result<(), ConfigError> {
    self.build_key_version = BuildKeyVersion::try_from(value)?;
    Ok(())
  }

  pub fn with_build_key_version(mut self, version: BuildKeyVersion) -> Self {
    self.build_key_version = version;
    self
  }

  /// Codec configured with the active build key version.
  pub fn codec(&self) -> BuildKeyCodec {
    BuildKeyCodec::new(self.build_key_version)
  }

  /// Path of the settings file, honoring `ENVSTORE_CONFIG`.
  pub fn default_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
      return PathBuf::from(path);
    }
    config_dir().join(SETTINGS_FILENAME)
  }

  /// Reads settings from a JSON file.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Resolves settings from the default file (if present) and the environment.
  pub fn load() -> Result<Self, ConfigError> {
    let path = Self::default_path();
    let mut settings = if path.exists() {
      debug!(path = %path.display(), "loading settings file");
      Self::from_file(&path)?
    } else {
      Self::default()
    };
    settings.apply_env()?;
    Ok(settings)
  }

  /// Applies environment overrides on top of the current values.
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var(BUILD_KEY_VERSION_ENV) {
      let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidBuildKeyVersion(raw.clone()))?;
      self.set_build_key_version(value)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn default_is_version_two() {
    assert_eq!(Settings::default().build_key_version(), BuildKeyVersion::V2);
  }

  #[test]
  fn set_valid_versions() {
    let mut settings = Settings::default();
    for value in [1, 2, 3] {
      settings.set_build_key_version(value).unwrap();
      assert_eq!(settings.build_key_version().number(), value as u8);
      assert_eq!(settings.codec().current_version().number(), value as u8);
    }
  }

  #[test]
  fn set_invalid_version_fails_with_message() {
    let mut settings = Settings::default();
    for value in [0, 4, -1] {
      let err = settings.set_build_key_version(value).unwrap_err();
      assert_eq!(
        err.to_string(),
        format!("invalid build key version: {}, expected: (1, 2, 3)", value)
      );
    }
    // Rejected values leave the previous setting untouched.
    assert_eq!(settings.build_key_version(), BuildKeyVersion::V2);
  }

  #[test]
  fn settings_file_is_validated_on_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");

    std::fs::write(&path, r#"{"build_key_version": 1}"#).unwrap();
    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.build_key_version(), BuildKeyVersion::V1);

    std::fs::write(&path, r#"{"build_key_version": 7}"#).unwrap();
    let err = Settings::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("invalid build key version: 7, expected: (1, 2, 3)"));
  }

  #[test]
  fn missing_field_uses_default() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, "{}").unwrap();
    assert_eq!(Settings::from_file(&path).unwrap(), Settings::default());
  }

  #[test]
  #[serial]
  fn env_overrides_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{"build_key_version": 1}"#).unwrap();

    temp_env::with_vars(
      [
        (CONFIG_PATH_ENV, Some(path.to_str().unwrap())),
        (BUILD_KEY_VERSION_ENV, Some("3")),
      ],
      || {
        let settings = Settings::load().unwrap();
        assert_eq!(settings.build_key_version(), BuildKeyVersion::V3);
      },
    );
  }

  #[test]
  #[serial]
  fn invalid_env_value_fails_at_load() {
    temp_env::with_vars(
      [
        (CONFIG_PATH_ENV, Some("/nonexistent/envstore/settings.json")),
        (BUILD_KEY_VERSION_ENV, Some("latest")),
      ],
      || {
        let err = Settings::load().unwrap_err();
        assert_eq!(
          err.to_string(),
          "invalid build key version: latest, expected: (1, 2, 3)"
        );
      },
    );
  }
}
