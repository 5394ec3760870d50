use serde::{Deserialize, Serialize};

use crate::util::hash::Hashable;

/// A user-submitted environment specification.
///
/// Only the fields the build core consumes are modelled; parsing and
/// validation of the full format happen upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
  pub name: String,
  #[serde(default)]
  pub channels: Vec<String>,
  #[serde(default)]
  pub dependencies: Vec<Dependency>,
}

/// A conda match spec or a block of pip requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
  Conda(String),
  Pip { pip: Vec<String> },
}

impl Hashable for EnvironmentSpec {}

impl EnvironmentSpec {
  pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(text)
  }

  pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(self)
  }

  /// Conda match specs, in declaration order.
  pub fn conda_dependencies(&self) -> Vec<&str> {
    self
      .dependencies
      .iter()
      .filter_map(|d| match d {
        Dependency::Conda(spec) => Some(spec.as_str()),
        Dependency::Pip { .. } => None,
      })
      .collect()
  }

  /// Pip requirements from every pip block, in declaration order.
  pub fn pip_dependencies(&self) -> Vec<&str> {
    self
      .dependencies
      .iter()
      .flat_map(|d| match d {
        Dependency::Conda(_) => &[][..],
        Dependency::Pip { pip } => pip.as_slice(),
      })
      .map(String::as_str)
      .collect()
  }
}
