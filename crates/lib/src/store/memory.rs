use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::build::{ArtifactType, Build, BuildArtifact, BuildId, BuildKeyVersion, Environment};
use crate::conda::PackageRecord;
use crate::store::{BuildStore, StoreError};
use crate::util::hash::ContentHash;

#[derive(Default)]
struct Inner {
  next_id: u64,
  builds: BTreeMap<BuildId, Build>,
  environments: BTreeMap<(String, String), Environment>,
  artifacts: BTreeMap<(BuildId, ArtifactType), BuildArtifact>,
  packages: BTreeMap<BuildId, Vec<PackageRecord>>,
  logs: BTreeMap<BuildId, String>,
}

/// In-process [`BuildStore`] guarded by a single `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
    self.inner.read().map_err(|_| StoreError::Poisoned)
  }

  fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
    self.inner.write().map_err(|_| StoreError::Poisoned)
  }

  /// Schedules a new build with the next id and makes it the environment's
  /// current build.
  pub fn create_build(
    &self,
    namespace: &str,
    name: &str,
    content_hash: ContentHash,
    scheduled_on: NaiveDateTime,
  ) -> Result<Build, StoreError> {
    let mut inner = self.write()?;
    inner.next_id += 1;
    let build = Build {
      id: BuildId(inner.next_id),
      namespace: namespace.to_string(),
      name: name.to_string(),
      content_hash,
      scheduled_on,
    };
    Self::register(&mut inner, build.clone());
    debug!(build_id = %build.id, namespace, name, "scheduled build");
    Ok(build)
  }

  /// Inserts a build with a caller-chosen id.
  pub fn insert_build(&self, build: Build) -> Result<Build, StoreError> {
    let mut inner = self.write()?;
    inner.next_id = inner.next_id.max(build.id.0);
    Self::register(&mut inner, build.clone());
    Ok(build)
  }

  fn register(inner: &mut Inner, build: Build) {
    let env_key = (build.namespace.clone(), build.name.clone());
    inner.environments.insert(
      env_key,
      Environment {
        namespace: build.namespace.clone(),
        name: build.name.clone(),
        current_build_id: Some(build.id),
      },
    );
    inner.builds.insert(build.id, build);
  }

  pub fn build_log(&self, build_id: BuildId) -> Result<String, StoreError> {
    Ok(self.read()?.logs.get(&build_id).cloned().unwrap_or_default())
  }
}

impl BuildStore for MemoryStore {
  fn get_build(&self, id: BuildId) -> Result<Option<Build>, StoreError> {
    Ok(self.read()?.builds.get(&id).cloned())
  }

  fn get_environment(&self, namespace: &str, name: &str) -> Result<Option<Environment>, StoreError> {
    let key = (namespace.to_string(), name.to_string());
    Ok(self.read()?.environments.get(&key).cloned())
  }

  fn list_artifacts(&self, build_id: BuildId) -> Result<Vec<BuildArtifact>, StoreError> {
    Ok(
      self
        .read()?
        .artifacts
        .range((build_id, ArtifactType::ALL[0])..)
        .take_while(|((id, _), _)| *id == build_id)
        .map(|(_, artifact)| artifact.clone())
        .collect(),
    )
  }

  fn list_packages(&self, build_id: BuildId) -> Result<Vec<PackageRecord>, StoreError> {
    Ok(self.read()?.packages.get(&build_id).cloned().unwrap_or_default())
  }

  fn add_artifact(&self, artifact: BuildArtifact) -> Result<(), StoreError> {
    let mut inner = self.write()?;
    if !inner.builds.contains_key(&artifact.build_id) {
      return Err(StoreError::BuildNotFound(artifact.build_id));
    }
    let key = (artifact.build_id, artifact.artifact_type);
    if inner.artifacts.contains_key(&key) {
      return Err(StoreError::ArtifactExists {
        build_id: artifact.build_id,
        artifact_type: artifact.artifact_type,
      });
    }
    debug!(build_id = %artifact.build_id, artifact_type = %artifact.artifact_type, key = %artifact.key, "recorded artifact");
    inner.artifacts.insert(key, artifact);
    Ok(())
  }

  fn add_packages(&self, build_id: BuildId, packages: Vec<PackageRecord>) -> Result<(), StoreError> {
    let mut inner = self.write()?;
    if !inner.builds.contains_key(&build_id) {
      return Err(StoreError::BuildNotFound(build_id));
    }
    inner.packages.entry(build_id).or_default().extend(packages);
    Ok(())
  }

  fn append_log(&self, build_id: BuildId, text: &str) -> Result<(), StoreError> {
    let mut inner = self.write()?;
    if !inner.builds.contains_key(&build_id) {
      return Err(StoreError::BuildNotFound(build_id));
    }
    inner.logs.entry(build_id).or_default().push_str(text);
    Ok(())
  }

  fn find_build_by_key(&self, key: &str) -> Result<Option<BuildId>, StoreError> {
    let inner = self.read()?;
    let by_artifact = inner
      .artifacts
      .values()
      .find(|a| !a.key.is_empty() && a.key.contains(key))
      .map(|a| a.build_id);
    if by_artifact.is_some() {
      return Ok(by_artifact);
    }
    Ok(
      inner
        .builds
        .values()
        .find(|b| BuildKeyVersion::ALL.iter().any(|v| v.encode(b) == key))
        .map(|b| b.id),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  fn scheduled() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
  }

  fn hash() -> ContentHash {
    ContentHash("ab".repeat(32))
  }

  #[test]
  fn ids_are_monotonic() {
    let store = MemoryStore::new();
    let a = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    let b = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    assert!(b.id > a.id);

    let env = store.get_environment("ns", "env").unwrap().unwrap();
    assert_eq!(env.current_build_id, Some(b.id));
  }

  #[test]
  fn insert_build_advances_ids() {
    let store = MemoryStore::new();
    let mut build = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    build.id = BuildId(100);
    store.insert_build(build).unwrap();
    let next = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    assert_eq!(next.id, BuildId(101));
  }

  #[test]
  fn artifacts_are_immutable() {
    let store = MemoryStore::new();
    let build = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    store
      .add_artifact(BuildArtifact::new(build.id, ArtifactType::Lockfile, "lockfile/a.yml"))
      .unwrap();
    let err = store
      .add_artifact(BuildArtifact::new(build.id, ArtifactType::Lockfile, "lockfile/b.yml"))
      .unwrap_err();
    assert!(matches!(err, StoreError::ArtifactExists { .. }));

    let stored = store.get_artifact(build.id, ArtifactType::Lockfile).unwrap().unwrap();
    assert_eq!(stored.key, "lockfile/a.yml");
  }

  #[test]
  fn artifacts_are_listed_per_build() {
    let store = MemoryStore::new();
    let a = store.create_build("ns", "a", hash(), scheduled()).unwrap();
    let b = store.create_build("ns", "b", hash(), scheduled()).unwrap();
    store.add_artifact(BuildArtifact::new(a.id, ArtifactType::Logs, "logs/a.log")).unwrap();
    store.add_artifact(BuildArtifact::new(a.id, ArtifactType::Lockfile, "")).unwrap();
    store.add_artifact(BuildArtifact::new(b.id, ArtifactType::Logs, "logs/b.log")).unwrap();

    let listed = store.list_artifacts(a.id).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|artifact| artifact.build_id == a.id));
    assert!(store.get_artifact(b.id, ArtifactType::Lockfile).unwrap().is_none());
  }

  #[test]
  fn writes_require_existing_build() {
    let store = MemoryStore::new();
    let err = store.append_log(BuildId(9), "text").unwrap_err();
    assert!(matches!(err, StoreError::BuildNotFound(BuildId(9))));
  }

  #[test]
  fn logs_accumulate() {
    let store = MemoryStore::new();
    let build = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    store.append_log(build.id, "one\n").unwrap();
    store.append_log(build.id, "two\n").unwrap();
    assert_eq!(store.build_log(build.id).unwrap(), "one\ntwo\n");
  }

  #[test]
  fn find_by_key_uses_artifacts_then_builds() {
    let store = MemoryStore::new();
    let build = store.create_build("ns", "env", hash(), scheduled()).unwrap();
    let digest = BuildKeyVersion::V3.encode(&build);
    assert_eq!(store.find_build_by_key(&digest).unwrap(), Some(build.id));

    let other = store.create_build("ns", "other", hash(), scheduled()).unwrap();
    store
      .add_artifact(BuildArtifact::new(other.id, ArtifactType::Lockfile, "lockfile/custom.yml"))
      .unwrap();
    assert_eq!(store.find_build_by_key("custom").unwrap(), Some(other.id));
    assert_eq!(store.find_build_by_key("missing").unwrap(), None);
  }
}
