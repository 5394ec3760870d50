//! Builds, their keys, and the artifacts they produce.
//!
//! A build is one attempt to materialize an environment specification. Each
//! build gets a storage key derived from its identity through the active
//! [`BuildKeyVersion`]; every artifact key embeds that build key.
//!
//! # Submodules
//!
//! - [`key`] - Versioned build key codec
//! - [`artifact`] - Artifact types and their storage keys

pub mod artifact;
pub mod key;
mod types;

pub use artifact::{ArtifactType, BuildArtifact};
pub use key::{BuildKeyCodec, BuildKeyError, BuildKeyVersion};
pub use types::*;

use tracing::debug;

use crate::action::ActionReport;
use crate::platform::Platform;
use crate::store::{BuildStore, StoreError};

/// Records an artifact for `build` under the key the active codec derives.
///
/// Fails with [`StoreError::ArtifactExists`] if the build already has one
/// of this type; artifact keys never change once committed.
pub fn register_artifact<S: BuildStore + ?Sized>(
  store: &S,
  build: &Build,
  artifact_type: ArtifactType,
  codec: &BuildKeyCodec,
  platform: Platform,
) -> Result<BuildArtifact, StoreError> {
  let artifact = BuildArtifact::new(build.id, artifact_type, build.artifact_key(artifact_type, codec, platform));
  store.add_artifact(artifact.clone())?;
  debug!(build_id = %build.id, artifact_type = %artifact_type, key = %artifact.key, "registered artifact");
  Ok(artifact)
}

/// Appends an action's captured output to the build log.
pub fn persist_action_log<S: BuildStore + ?Sized, T>(
  store: &S,
  build_id: BuildId,
  report: &ActionReport<T>,
) -> Result<(), StoreError> {
  store.append_log(build_id, &report.stdout)?;
  if !report.stderr.is_empty() {
    store.append_log(build_id, &report.stderr)?;
  }
  Ok(())
}
