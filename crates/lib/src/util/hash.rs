//! Hashing utilities for content-addressed build identity.
//!
//! - `ContentHash`: a full 64-character SHA-256 digest of resolved content
//! - `Hashable`: hash any serializable value through its JSON form
//! - `hash_bytes()`: arbitrary byte hashing

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::{CONTENT_HASH_LEN, SHORT_HASH_LEN};

pub type HashError = serde_json::Error;

/// A full 64-character SHA-256 hash identifying resolved content.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// The leading characters embedded in short build keys.
  ///
  /// Falls back to the whole string when it is shorter or the cut would split
  /// a multi-byte character.
  pub fn short(&self) -> &str {
    self.0.get(..SHORT_HASH_LEN).unwrap_or(&self.0)
  }

  /// True when this is a well-formed lowercase SHA-256 hex digest.
  pub fn is_valid(&self) -> bool {
    self.0.len() == CONTENT_HASH_LEN && is_lower_hex(&self.0)
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn content_hash(&self) -> Result<ContentHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(hash_bytes(serialized.as_bytes()))
  }
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}

/// True if `s` is non-empty and only contains `0-9a-f`.
pub fn is_lower_hex(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
