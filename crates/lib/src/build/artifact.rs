//! Build artifacts and their storage keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::build::BuildId;
use crate::platform::Platform;

/// Kinds of output a build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
  Lockfile,
  Logs,
  Yaml,
  CondaPack,
  ConstructorInstaller,
}

impl ArtifactType {
  pub const ALL: [ArtifactType; 5] = [
    ArtifactType::Lockfile,
    ArtifactType::Logs,
    ArtifactType::Yaml,
    ArtifactType::CondaPack,
    ArtifactType::ConstructorInstaller,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ArtifactType::Lockfile => "LOCKFILE",
      ArtifactType::Logs => "LOGS",
      ArtifactType::Yaml => "YAML",
      ArtifactType::CondaPack => "CONDA_PACK",
      ArtifactType::ConstructorInstaller => "CONSTRUCTOR_INSTALLER",
    }
  }

  fn prefix(&self) -> &'static str {
    match self {
      ArtifactType::Lockfile => "lockfile/",
      ArtifactType::Logs => "logs/",
      ArtifactType::Yaml => "yaml/",
      ArtifactType::CondaPack => "archive/",
      ArtifactType::ConstructorInstaller => "installer/",
    }
  }

  fn suffix(&self, platform: Platform) -> String {
    match self {
      ArtifactType::Lockfile | ArtifactType::Yaml => ".yml".to_string(),
      ArtifactType::Logs => ".log".to_string(),
      ArtifactType::CondaPack => ".tar.gz".to_string(),
      ArtifactType::ConstructorInstaller => format!(".{}", platform.installer_extension()),
    }
  }

  /// Storage key for an artifact of this type (e.g., `lockfile/<build_key>.yml`).
  pub fn key_for(&self, build_key: &str, platform: Platform) -> String {
    format!("{}{}{}", self.prefix(), build_key, self.suffix(platform))
  }

  /// Extracts the build key embedded in a storage key of this type.
  pub fn build_key_of<'a>(&self, artifact_key: &'a str, platform: Platform) -> Option<&'a str> {
    artifact_key
      .strip_prefix(self.prefix())?
      .strip_suffix(self.suffix(platform).as_str())
      .filter(|key| !key.is_empty())
  }
}

impl fmt::Display for ArtifactType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for ArtifactType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ArtifactType::ALL
      .into_iter()
      .find(|t| t.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("unknown artifact type: {}", s))
  }
}

/// Record of one produced artifact. Immutable once committed.
///
/// An empty `key` marks a legacy build that predates keyed storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
  pub build_id: BuildId,
  pub artifact_type: ArtifactType,
  pub key: String,
}

impl BuildArtifact {
  pub fn new(build_id: BuildId, artifact_type: ArtifactType, key: impl Into<String>) -> Self {
    Self {
      build_id,
      artifact_type,
      key: key.into(),
    }
  }

  pub fn is_legacy(&self) -> bool {
    self.key.is_empty()
  }
}
