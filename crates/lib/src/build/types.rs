use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::build::artifact::ArtifactType;
use crate::build::key::BuildKeyCodec;
use crate::platform::Platform;
use crate::util::hash::ContentHash;

/// Monotonically assigned, unique build identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildId(pub u64);

impl fmt::Display for BuildId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One attempt to materialize an environment specification.
///
/// `scheduled_on` is fixed when the build is scheduled and feeds key
/// derivation, so it must never change afterwards. Timestamps are naive and
/// interpreted as UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
  pub id: BuildId,
  pub namespace: String,
  pub name: String,
  pub content_hash: ContentHash,
  pub scheduled_on: NaiveDateTime,
}

impl Build {
  /// Build key under the codec's active version.
  pub fn build_key(&self, codec: &BuildKeyCodec) -> String {
    codec.encode(self)
  }

  /// Storage key of the given artifact type for this build.
  pub fn artifact_key(&self, artifact_type: ArtifactType, codec: &BuildKeyCodec, platform: Platform) -> String {
    artifact_type.key_for(&self.build_key(codec), platform)
  }
}

/// A named environment within a namespace, pointing at its current build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
  pub namespace: String,
  pub name: String,
  pub current_build_id: Option<BuildId>,
}
