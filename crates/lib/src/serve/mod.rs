//! Artifact resolution for fetch endpoints.
//!
//! Given a build and an artifact type, [`ArtifactResolver`] decides whether
//! to redirect to the artifact's storage key or to serve an inline payload.
//! Builds recorded before versioned keys existed carry an empty key; their
//! lockfile is synthesized from the recorded package list.

mod response;

pub use response::ArtifactResponse;

use thiserror::Error;
use tracing::{debug, warn};

use crate::build::{ArtifactType, Build, BuildArtifact, BuildId, BuildKeyCodec, BuildKeyVersion};
use crate::platform::Platform;
use crate::store::{BuildStore, StoreError};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("no {artifact_type} artifact recorded for build {build_id}")]
  ArtifactNotFound {
    build_id: BuildId,
    artifact_type: ArtifactType,
  },

  #[error("build {build_id} not found in environment {namespace}/{name}")]
  BuildNotFound {
    namespace: String,
    name: String,
    build_id: BuildId,
  },

  #[error("stored artifact key {stored} does not match expected key {expected}")]
  KeyMismatch { stored: String, expected: String },

  #[error("artifact key is not a valid location: {0:?}")]
  InvalidLocation(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Turns artifact records into fetch responses.
pub struct ArtifactResolver<'a, S: BuildStore + ?Sized> {
  store: &'a S,
  codec: BuildKeyCodec,
  platform: Platform,
}

impl<'a, S: BuildStore + ?Sized> ArtifactResolver<'a, S> {
  pub fn new(store: &'a S, codec: BuildKeyCodec, platform: Platform) -> Self {
    Self { store, codec, platform }
  }

  /// Response for `artifact_type` of `build`.
  pub fn resolve(&self, build: &Build, artifact_type: ArtifactType) -> Result<ArtifactResponse, ResolveError> {
    let artifact = self
      .store
      .get_artifact(build.id, artifact_type)?
      .ok_or(ResolveError::ArtifactNotFound {
        build_id: build.id,
        artifact_type,
      })?;

    match artifact_type {
      ArtifactType::Lockfile if artifact.is_legacy() => {
        debug!(build_id = %build.id, "serving legacy lockfile");
        Ok(ArtifactResponse::inline_text(self.explicit_lockfile(build.id)?))
      }
      _ if artifact.is_legacy() => Err(ResolveError::ArtifactNotFound {
        build_id: build.id,
        artifact_type,
      }),
      ArtifactType::Lockfile | ArtifactType::ConstructorInstaller => {
        self.verify_key(build, &artifact)?;
        ArtifactResponse::redirect(&artifact.key)
      }
      ArtifactType::Logs | ArtifactType::Yaml | ArtifactType::CondaPack => ArtifactResponse::redirect(&artifact.key),
    }
  }

  /// Like [`resolve`](Self::resolve), for a build addressed through its
  /// environment. The build must belong to that environment.
  pub fn resolve_for_environment(
    &self,
    namespace: &str,
    name: &str,
    build_id: BuildId,
    artifact_type: ArtifactType,
  ) -> Result<ArtifactResponse, ResolveError> {
    let not_found = || ResolveError::BuildNotFound {
      namespace: namespace.to_string(),
      name: name.to_string(),
      build_id,
    };

    self.store.get_environment(namespace, name)?.ok_or_else(not_found)?;
    let build = self
      .store
      .get_build(build_id)?
      .filter(|b| b.namespace == namespace && b.name == name)
      .ok_or_else(not_found)?;
    self.resolve(&build, artifact_type)
  }

  /// The stored key must be the one this build derives under the version
  /// its shape reveals; anything else would redirect to another build.
  fn verify_key(&self, build: &Build, artifact: &BuildArtifact) -> Result<(), ResolveError> {
    let version = artifact
      .artifact_type
      .build_key_of(&artifact.key, self.platform)
      .and_then(|build_key| BuildKeyVersion::detect(build_key).ok());
    let expected = match version {
      Some(version) => artifact.artifact_type.key_for(&version.encode(build), self.platform),
      None => build.artifact_key(artifact.artifact_type, &self.codec, self.platform),
    };

    if expected != artifact.key {
      warn!(build_id = %build.id, stored = %artifact.key, expected = %expected, "artifact key mismatch");
      return Err(ResolveError::KeyMismatch {
        stored: artifact.key.clone(),
        expected,
      });
    }
    Ok(())
  }

  /// Explicit pinned-package list built from the recorded packages.
  ///
  /// Every entry is rendered as a `.tar.bz2` URL (see
  /// [`PackageRecord::filename`](crate::conda::PackageRecord::filename)), so
  /// a package recorded from a `.conda` archive points at the tarball while
  /// its md5 fragment is still that of the `.conda` file. Installers that
  /// verify the fragment will reject those lines.
  fn explicit_lockfile(&self, build_id: BuildId) -> Result<String, ResolveError> {
    let packages = self.store.list_packages(build_id)?;
    let mut lines = vec![format!("#platform: {}", self.platform.subdir()), "@EXPLICIT".to_string()];
    lines.extend(packages.iter().map(|p| p.explicit_url()));
    Ok(lines.join("\n"))
  }
}
