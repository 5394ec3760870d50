//! Test utilities for envstore-lib.
//!
//! Cross-platform command helpers and fake external tools for tests that
//! drive real subprocesses.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::build::Build;
use crate::build::BuildId;
use crate::util::hash::ContentHash;

/// Returns the argv to echo a message.
///
/// On Unix, this uses /bin/echo directly.
/// On Windows, echo is a shell builtin, so we wrap it in cmd.exe.
#[cfg(unix)]
pub fn echo_cmd(msg: &str) -> Vec<String> {
  vec!["/bin/echo".to_string(), msg.to_string()]
}

#[cfg(windows)]
pub fn echo_cmd(msg: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), "echo".to_string(), msg.to_string()]
}

/// Writes a `/bin/sh` script and returns the argv that runs it.
///
/// The script is passed to the interpreter rather than executed directly,
/// so no executable bit is needed.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> Vec<String> {
  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\nset -e\n{}\n", body)).unwrap();
  vec!["/bin/sh".to_string(), path.to_string_lossy().into_owned()]
}

/// Creates a directory that looks like a managed environment.
pub fn make_prefix(root: &Path, name: &str) -> PathBuf {
  let prefix = root.join(name);
  std::fs::create_dir_all(prefix.join("conda-meta")).unwrap();
  std::fs::write(prefix.join("conda-meta").join("history"), "==> 2023-11-05 03:54:10 <==\n").unwrap();
  prefix
}

/// The build used throughout the key tests.
pub fn sample_build() -> Build {
  Build {
    id: BuildId(12345678),
    namespace: "default".to_string(),
    name: "this-is-a-long-environment-name".to_string(),
    content_hash: ContentHash("c7afdeffbe2bda7d16ca69beecc8bebeb29280a95d4f3ed92849e4047710923b".to_string()),
    scheduled_on: NaiveDate::from_ymd_opt(2023, 11, 5)
      .and_then(|d| d.and_hms_micro_opt(3, 54, 10, 510258))
      .unwrap(),
  }
}
