//! Build keys: versioned, content-addressed identifiers for builds.
//!
//! Every version stays decodable forever; the active version only selects
//! how new keys are encoded.
//!
//! | Version | Layout |
//! |---------|--------|
//! | 1 | `<sha256>-<YYYYMMDD>-<HHMMSS>-<micros>-<id>-<name>` |
//! | 2 | `<sha256[..8]>-<unix seconds>-<id>-<name>` |
//! | 3 | `<sha256("<sha256>-<unix seconds>-<id>-<name>")[..32]>` |
//!
//! The environment name is always the last field and is never escaped, so
//! decoding never looks past the last fixed field. Version 3 keys carry no
//! recoverable structure and can only be mapped back to a build through a
//! store lookup ([`BuildKeyCodec::resolve_via_lookup`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::build::{Build, BuildId};
use crate::config::ConfigError;
use crate::consts::{CONTENT_HASH_LEN, DIGEST_KEY_LEN, SHORT_HASH_LEN};
use crate::store::{BuildStore, StoreError};
use crate::util::hash::{hash_bytes, is_lower_hex};

#[derive(Debug, Error)]
pub enum BuildKeyError {
  #[error("malformed build key: {key}")]
  Malformed { key: String },

  #[error("build key {key} does not match any build")]
  NotFound { key: String },

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl BuildKeyError {
  fn malformed(key: &str) -> Self {
    BuildKeyError::Malformed { key: key.to_string() }
  }
}

/// The immutable set of build key versions ever supported.
pub const fn versions() -> (u8, u8, u8) {
  (1, 2, 3)
}

/// Build key format version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum BuildKeyVersion {
  /// Long form with the full hash and broken-out calendar timestamp.
  V1,
  /// Short hash prefix and epoch seconds.
  #[default]
  V2,
  /// Opaque digest; experimental.
  V3,
}

impl BuildKeyVersion {
  pub const ALL: [BuildKeyVersion; 3] = [BuildKeyVersion::V1, BuildKeyVersion::V2, BuildKeyVersion::V3];

  pub fn number(self) -> u8 {
    match self {
      BuildKeyVersion::V1 => 1,
      BuildKeyVersion::V2 => 2,
      BuildKeyVersion::V3 => 3,
    }
  }

  pub fn encode(self, build: &Build) -> String {
    match self {
      BuildKeyVersion::V1 => v1::encode(build),
      BuildKeyVersion::V2 => v2::encode(build),
      BuildKeyVersion::V3 => v3::encode(build),
    }
  }

  /// Recovers the build id from a key of this version.
  ///
  /// Returns `Ok(None)` for well-formed version 3 keys, which do not embed
  /// the id.
  pub fn decode(self, key: &str) -> Result<Option<BuildId>, BuildKeyError> {
    match self {
      BuildKeyVersion::V1 => v1::decode(key).map(Some),
      BuildKeyVersion::V2 => v2::decode(key).map(Some),
      BuildKeyVersion::V3 => v3::decode(key).map(|_| None),
    }
  }

  /// Determines a key's version from its structural shape.
  pub fn detect(key: &str) -> Result<Self, BuildKeyError> {
    match key.split_once('-') {
      None if key.len() == DIGEST_KEY_LEN && is_lower_hex(key) => Ok(BuildKeyVersion::V3),
      None => Err(BuildKeyError::malformed(key)),
      Some((hash, _)) if hash.len() == CONTENT_HASH_LEN => Ok(BuildKeyVersion::V1),
      Some((hash, _)) if hash.len() == SHORT_HASH_LEN => Ok(BuildKeyVersion::V2),
      Some(_) => Err(BuildKeyError::malformed(key)),
    }
  }
}

impl TryFrom<i64> for BuildKeyVersion {
  type Error = ConfigError;

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(BuildKeyVersion::V1),
      2 => Ok(BuildKeyVersion::V2),
      3 => Ok(BuildKeyVersion::V3),
      other => Err(ConfigError::InvalidBuildKeyVersion(other.to_string())),
    }
  }
}

impl From<BuildKeyVersion> for i64 {
  fn from(version: BuildKeyVersion) -> Self {
    i64::from(version.number())
  }
}

impl fmt::Display for BuildKeyVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.number())
  }
}

/// Encodes and decodes build keys for a configured version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildKeyCodec {
  version: BuildKeyVersion,
}

impl BuildKeyCodec {
  pub fn new(version: BuildKeyVersion) -> Self {
    Self { version }
  }

  pub fn current_version(&self) -> BuildKeyVersion {
    self.version
  }

  pub fn versions(&self) -> (u8, u8, u8) {
    versions()
  }

  pub fn encode(&self, build: &Build) -> String {
    self.version.encode(build)
  }

  /// Decodes a key of any version without consulting a store.
  ///
  /// Returns `Ok(None)` when the key is a version 3 digest; use
  /// [`resolve_via_lookup`](Self::resolve_via_lookup) for those.
  pub fn decode_if_possible(&self, key: &str) -> Result<Option<BuildId>, BuildKeyError> {
    BuildKeyVersion::detect(key)?.decode(key)
  }

  /// Maps a key back to its build through the store.
  ///
  /// The candidate build is re-encoded under the key's version and must
  /// reproduce the key exactly.
  pub fn resolve_via_lookup<S: BuildStore + ?Sized>(&self, key: &str, store: &S) -> Result<BuildId, BuildKeyError> {
    let version = BuildKeyVersion::detect(key)?;
    let not_found = || BuildKeyError::NotFound { key: key.to_string() };

    let id = store.find_build_by_key(key)?.ok_or_else(not_found)?;
    let build = store.get_build(id)?.ok_or_else(not_found)?;
    if version.encode(&build) != key {
      return Err(not_found());
    }
    Ok(id)
  }

  /// Recovers the build id of a key of any version, falling back to a store
  /// lookup only when the key does not embed the id.
  pub fn parse<S: BuildStore + ?Sized>(&self, key: &str, store: &S) -> Result<BuildId, BuildKeyError> {
    match self.decode_if_possible(key)? {
      Some(id) => Ok(id),
      None => self.resolve_via_lookup(key, store),
    }
  }
}

fn is_digits(s: &str, width: Option<usize>) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && width.is_none_or(|w| s.len() == w)
}

fn parse_id(key: &str, id: &str) -> Result<BuildId, BuildKeyError> {
  if !is_digits(id, None) {
    return Err(BuildKeyError::malformed(key));
  }
  id.parse::<u64>()
    .map(BuildId)
    .map_err(|_| BuildKeyError::malformed(key))
}

mod v1 {
  use super::*;

  pub(super) fn encode(build: &Build) -> String {
    format!(
      "{}-{}-{}-{}",
      build.content_hash,
      build.scheduled_on.format("%Y%m%d-%H%M%S-%6f"),
      build.id,
      build.name
    )
  }

  pub(super) fn decode(key: &str) -> Result<BuildId, BuildKeyError> {
    let parts: Vec<&str> = key.splitn(6, '-').collect();
    let [hash, date, time, micros, id, name] = parts.as_slice() else {
      return Err(BuildKeyError::malformed(key));
    };
    let well_formed = hash.len() == CONTENT_HASH_LEN
      && is_lower_hex(hash)
      && is_digits(date, Some(8))
      && is_digits(time, Some(6))
      && is_digits(micros, Some(6))
      && !name.is_empty();
    if !well_formed {
      return Err(BuildKeyError::malformed(key));
    }
    parse_id(key, id)
  }
}

mod v2 {
  use super::*;

  pub(super) fn encode(build: &Build) -> String {
    format!(
      "{}-{}-{}-{}",
      build.content_hash.short(),
      build.scheduled_on.and_utc().timestamp(),
      build.id,
      build.name
    )
  }

  pub(super) fn decode(key: &str) -> Result<BuildId, BuildKeyError> {
    let (hash, rest) = key.split_once('-').ok_or_else(|| BuildKeyError::malformed(key))?;
    // Builds scheduled before 1970 carry a negative timestamp.
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let parts: Vec<&str> = rest.splitn(3, '-').collect();
    let [timestamp, id, name] = parts.as_slice() else {
      return Err(BuildKeyError::malformed(key));
    };
    let well_formed =
      hash.len() == SHORT_HASH_LEN && is_lower_hex(hash) && is_digits(timestamp, None) && !name.is_empty();
    if !well_formed {
      return Err(BuildKeyError::malformed(key));
    }
    parse_id(key, id)
  }
}

mod v3 {
  use super::*;

  pub(super) fn encode(build: &Build) -> String {
    let input = format!(
      "{}-{}-{}-{}",
      build.content_hash,
      build.scheduled_on.and_utc().timestamp(),
      build.id,
      build.name
    );
    let digest = hash_bytes(input.as_bytes());
    digest.0[..DIGEST_KEY_LEN].to_string()
  }

  pub(super) fn decode(key: &str) -> Result<(), BuildKeyError> {
    if key.len() == DIGEST_KEY_LEN && is_lower_hex(key) {
      Ok(())
    } else {
      Err(BuildKeyError::malformed(key))
    }
  }
}
