use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::conda::{LockfileError, MetadataError};
use crate::store::StoreError;

/// Errors raised while setting up, running, or tearing down an action.
#[derive(Debug, Error)]
pub enum ActionError {
  /// The scratch directory could not be created; no action code ran.
  #[error("failed to create scratch directory: {0}")]
  Setup(#[source] io::Error),

  /// A subprocess exited unsuccessfully.
  ///
  /// `output` holds everything the command wrote to its captured stdout
  /// stream (including merged stderr) before it exited.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CommandFailed {
    cmd: String,
    code: Option<i32>,
    output: String,
  },

  #[error("failed to spawn {cmd}: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  #[error("command has no program to run")]
  EmptyCommand,

  /// The path is not a managed environment directory.
  #[error("not a conda prefix: {}", .0.display())]
  InvalidPrefix(PathBuf),

  #[error("invalid permissions {0:?}, expected an octal mode such as \"755\"")]
  InvalidPermissions(String),

  #[error("failed to remove scratch directory {}: {source}", path.display())]
  Cleanup {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("yaml error: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Lockfile(#[from] LockfileError),

  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl ActionError {
  /// True when a spawn failed because the program does not exist.
  pub fn is_missing_program(&self) -> bool {
    matches!(self, ActionError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
  }
}
