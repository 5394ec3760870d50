//! Environment directory maintenance.

use std::io;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::action::{Action, ActionError, ActionReport, ExecutionContext};
use crate::conda::is_conda_prefix;

/// Disk usage of an environment directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrefixStats {
  pub disk_usage: u64,
}

pub(crate) fn ensure_prefix(prefix: &Path) -> Result<(), ActionError> {
  if is_conda_prefix(prefix) {
    Ok(())
  } else {
    Err(ActionError::InvalidPrefix(prefix.to_path_buf()))
  }
}

/// Removes an environment directory. Refuses anything that is not one.
pub async fn remove_conda_prefix(prefix: &Path) -> Result<ActionReport<()>, ActionError> {
  Action::new("remove_conda_prefix")
    .run(async |ctx: &ExecutionContext| {
      ensure_prefix(prefix)?;
      ctx.log().info(format!("removing conda prefix {}", prefix.display()));
      tokio::fs::remove_dir_all(prefix).await?;
      Ok(())
    })
    .await
}

/// Sums the size of every regular file under the environment directory.
pub async fn get_conda_prefix_stats(prefix: &Path) -> Result<ActionReport<PrefixStats>, ActionError> {
  Action::new("get_conda_prefix_stats")
    .run(async |ctx: &ExecutionContext| {
      ensure_prefix(prefix)?;
      let root = prefix.to_path_buf();
      let disk_usage = tokio::task::spawn_blocking(move || disk_usage(&root))
        .await
        .map_err(io::Error::other)??;
      ctx
        .log()
        .info(format!("disk usage of conda_prefix {}: {} bytes", prefix.display(), disk_usage));
      Ok(PrefixStats { disk_usage })
    })
    .await
}

fn disk_usage(root: &Path) -> io::Result<u64> {
  let mut total = 0;
  for entry in WalkDir::new(root).follow_links(false) {
    let entry = entry.map_err(io::Error::from)?;
    if entry.file_type().is_file() {
      total += entry.metadata().map_err(io::Error::from)?.len();
    }
  }
  Ok(total)
}

/// Applies an octal mode and ownership to an environment directory.
///
/// Each change is skipped, and logged as such, when the prefix root
/// already matches.
pub async fn set_conda_prefix_permissions(
  prefix: &Path,
  permissions: Option<&str>,
  uid: Option<u32>,
  gid: Option<u32>,
) -> Result<ActionReport<()>, ActionError> {
  Action::new("set_conda_prefix_permissions")
    .run(async |ctx: &ExecutionContext| {
      ensure_prefix(prefix)?;
      let mode = permissions.map(parse_mode).transpose()?;
      apply_mode(ctx, prefix, mode)?;
      apply_ownership(ctx, prefix, uid, gid)?;
      Ok(())
    })
    .await
}

fn parse_mode(permissions: &str) -> Result<u32, ActionError> {
  let invalid = || ActionError::InvalidPermissions(permissions.to_string());
  if !(3..=4).contains(&permissions.len()) {
    return Err(invalid());
  }
  u32::from_str_radix(permissions, 8).map_err(|_| invalid())
}

#[cfg(unix)]
fn apply_mode(ctx: &ExecutionContext, prefix: &Path, mode: Option<u32>) -> Result<(), ActionError> {
  use std::fs::Permissions;
  use std::os::unix::fs::PermissionsExt;

  let current = std::fs::metadata(prefix)?.permissions().mode() & 0o7777;
  match mode {
    Some(mode) if mode != current => {
      ctx.log().info(format!(
        "changing permissions of conda_prefix {} to {:o}",
        prefix.display(),
        mode
      ));
      for entry in WalkDir::new(prefix).follow_links(false).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_symlink() {
          continue;
        }
        std::fs::set_permissions(entry.path(), Permissions::from_mode(mode))?;
      }
    }
    _ => ctx
      .log()
      .info(format!("no changes for permissions of conda_prefix {}", prefix.display())),
  }
  Ok(())
}

#[cfg(unix)]
fn apply_ownership(ctx: &ExecutionContext, prefix: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<(), ActionError> {
  use std::os::unix::fs::{MetadataExt, lchown};

  let meta = std::fs::metadata(prefix)?;
  let uid_changed = uid.is_some_and(|uid| uid != meta.uid());
  let gid_changed = gid.is_some_and(|gid| gid != meta.gid());
  if !uid_changed && !gid_changed {
    ctx
      .log()
      .info(format!("no changes for gid and uid of conda_prefix {}", prefix.display()));
    return Ok(());
  }

  ctx.log().info(format!(
    "changing gid and uid of conda_prefix {} to uid={:?} gid={:?}",
    prefix.display(),
    uid,
    gid
  ));
  for entry in WalkDir::new(prefix).follow_links(false) {
    let entry = entry.map_err(io::Error::from)?;
    lchown(entry.path(), uid, gid)?;
  }
  Ok(())
}

#[cfg(not(unix))]
fn apply_mode(ctx: &ExecutionContext, prefix: &Path, _mode: Option<u32>) -> Result<(), ActionError> {
  ctx
    .log()
    .warning(format!("permissions are not supported on this platform, skipping {}", prefix.display()));
  Ok(())
}

#[cfg(not(unix))]
fn apply_ownership(ctx: &ExecutionContext, prefix: &Path, _uid: Option<u32>, _gid: Option<u32>) -> Result<(), ActionError> {
  ctx
    .log()
    .warning(format!("ownership is not supported on this platform, skipping {}", prefix.display()));
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::make_prefix;
  use tempfile::TempDir;

  #[tokio::test]
  async fn stats_sum_file_sizes() {
    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");
    let history_len = std::fs::metadata(prefix.join("conda-meta/history")).unwrap().len();
    std::fs::create_dir_all(prefix.join("lib")).unwrap();
    std::fs::write(prefix.join("lib/libfoo.so"), vec![0u8; 1000]).unwrap();

    let report = get_conda_prefix_stats(&prefix).await.unwrap();
    let stats = report.into_result().unwrap();
    assert_eq!(stats.disk_usage, 1000 + history_len);
  }

  #[tokio::test]
  async fn non_prefix_is_rejected() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("important.txt"), "keep me").unwrap();

    let report = remove_conda_prefix(temp.path()).await.unwrap();
    assert!(matches!(report.result, Err(ActionError::InvalidPrefix(_))));
    assert!(temp.path().join("important.txt").exists());

    let report = get_conda_prefix_stats(temp.path()).await.unwrap();
    assert!(matches!(report.result, Err(ActionError::InvalidPrefix(_))));
  }

  #[tokio::test]
  async fn remove_deletes_prefix() {
    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");

    let report = remove_conda_prefix(&prefix).await.unwrap();
    assert!(report.is_success());
    assert!(!prefix.exists());
    assert!(report.stdout.contains("removing conda prefix"));
  }

  #[test]
  fn parse_mode_accepts_octal() {
    assert_eq!(parse_mode("755").unwrap(), 0o755);
    assert_eq!(parse_mode("2775").unwrap(), 0o2775);
    assert!(matches!(parse_mode("999"), Err(ActionError::InvalidPermissions(_))));
    assert!(matches!(parse_mode("rwx"), Err(ActionError::InvalidPermissions(_))));
    assert!(matches!(parse_mode("7"), Err(ActionError::InvalidPermissions(_))));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn unchanged_permissions_are_noops() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");
    std::fs::set_permissions(&prefix, std::fs::Permissions::from_mode(0o755)).unwrap();

    let report = set_conda_prefix_permissions(&prefix, Some("755"), None, None).await.unwrap();
    assert!(report.is_success());
    assert!(report.stdout.contains(&format!("no changes for permissions of conda_prefix {}", prefix.display())));
    assert!(report.stdout.contains(&format!("no changes for gid and uid of conda_prefix {}", prefix.display())));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn permissions_apply_recursively() {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");
    std::fs::set_permissions(&prefix, std::fs::Permissions::from_mode(0o755)).unwrap();
    let uid = std::fs::metadata(&prefix).unwrap().uid();

    let report = set_conda_prefix_permissions(&prefix, Some("700"), Some(uid), None).await.unwrap();
    assert!(report.is_success(), "{:?}", report.result);

    let history = prefix.join("conda-meta/history");
    assert_eq!(std::fs::metadata(&history).unwrap().permissions().mode() & 0o777, 0o700);
    assert_eq!(std::fs::metadata(&prefix).unwrap().permissions().mode() & 0o777, 0o700);
    assert!(report.stdout.contains("no changes for gid and uid"));
  }

  #[tokio::test]
  async fn invalid_permissions_are_reported() {
    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");

    let report = set_conda_prefix_permissions(&prefix, Some("abc"), None, None).await.unwrap();
    assert!(matches!(report.result, Err(ActionError::InvalidPermissions(p)) if p == "abc"));
  }
}
