//! Persistent build metadata, consumed through [`BuildStore`].
//!
//! The core only needs simple CRUD-style accessors: builds by id,
//! environments by namespace and name, and the artifacts and packages
//! recorded for a build. [`MemoryStore`] is the in-process implementation.

mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

use crate::build::{ArtifactType, Build, BuildArtifact, BuildId, Environment};
use crate::conda::PackageRecord;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("build not found: {0}")]
  BuildNotFound(BuildId),

  #[error("artifact {artifact_type} already recorded for build {build_id}")]
  ArtifactExists {
    build_id: BuildId,
    artifact_type: ArtifactType,
  },

  #[error("store lock poisoned")]
  Poisoned,
}

/// Accessors the build core needs from the metadata store.
///
/// Writes must become visible atomically: readers observe either the whole
/// record or nothing.
pub trait BuildStore: Send + Sync {
  fn get_build(&self, id: BuildId) -> Result<Option<Build>, StoreError>;

  fn get_environment(&self, namespace: &str, name: &str) -> Result<Option<Environment>, StoreError>;

  fn list_artifacts(&self, build_id: BuildId) -> Result<Vec<BuildArtifact>, StoreError>;

  fn get_artifact(&self, build_id: BuildId, artifact_type: ArtifactType) -> Result<Option<BuildArtifact>, StoreError> {
    Ok(
      self
        .list_artifacts(build_id)?
        .into_iter()
        .find(|a| a.artifact_type == artifact_type),
    )
  }

  fn list_packages(&self, build_id: BuildId) -> Result<Vec<PackageRecord>, StoreError>;

  /// Commits an artifact record. Fails if one already exists for its type.
  fn add_artifact(&self, artifact: BuildArtifact) -> Result<(), StoreError>;

  fn add_packages(&self, build_id: BuildId, packages: Vec<PackageRecord>) -> Result<(), StoreError>;

  /// Appends captured action output to the build log.
  fn append_log(&self, build_id: BuildId, text: &str) -> Result<(), StoreError>;

  /// Reverse lookup for keys that do not embed the build id.
  fn find_build_by_key(&self, key: &str) -> Result<Option<BuildId>, StoreError>;
}
