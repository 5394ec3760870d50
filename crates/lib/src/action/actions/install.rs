//! Populating environment directories and recording what they contain.

use std::io;
use std::path::Path;

use crate::action::actions::prefix::ensure_prefix;
use crate::action::{Action, ActionError, ActionReport, CommandSpec, ExecutionContext};
use crate::build::BuildId;
use crate::conda::{EnvironmentSpec, lockfile_explicit_urls, prefix_packages};
use crate::store::BuildStore;

const ENVIRONMENT_FILE: &str = "environment.yaml";
const LOCKFILE: &str = "conda-lock.yaml";
const EXPLICIT_FILE: &str = "explicit.txt";

/// Programs used to install, fetch, export and pack environments.
///
/// Each entry is a program followed by leading arguments; subcommands and
/// flags are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaTools {
  pub conda: Vec<String>,
  pub conda_lock: Vec<String>,
  pub conda_pack: Vec<String>,
}

impl Default for CondaTools {
  fn default() -> Self {
    Self {
      conda: vec!["conda".to_string()],
      conda_lock: vec!["conda-lock".to_string()],
      conda_pack: vec!["conda-pack".to_string()],
    }
  }
}

impl CondaTools {
  pub fn with_conda<I, S>(mut self, command: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.conda = command.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_conda_lock<I, S>(mut self, command: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.conda_lock = command.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_conda_pack<I, S>(mut self, command: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.conda_pack = command.into_iter().map(Into::into).collect();
    self
  }

  pub(crate) fn command(tool: &[String], args: &[&str]) -> CommandSpec {
    CommandSpec::exec(tool.iter().map(String::as_str).chain(args.iter().copied()))
  }
}

/// Creates an environment at `prefix` by solving and installing `spec`.
pub async fn install_specification(
  spec: &EnvironmentSpec,
  prefix: &Path,
  tools: &CondaTools,
) -> Result<ActionReport<()>, ActionError> {
  Action::new("install_specification")
    .run(async |ctx: &ExecutionContext| {
      tokio::fs::write(ctx.scratch_dir().join(ENVIRONMENT_FILE), spec.to_yaml()?).await?;

      let prefix_arg = prefix.to_string_lossy();
      ctx.log().info(format!("installing {} into {}", spec.name, prefix.display()));
      ctx
        .run(CondaTools::command(
          &tools.conda,
          &["env", "create", "--prefix", &*prefix_arg, "--file", ENVIRONMENT_FILE],
        ))
        .await?;
      Ok(())
    })
    .await
}

/// Creates an environment at `prefix` from a solved lockfile.
pub async fn install_lockfile(lockfile: &str, prefix: &Path, tools: &CondaTools) -> Result<ActionReport<()>, ActionError> {
  Action::new("install_lockfile")
    .run(async |ctx: &ExecutionContext| {
      tokio::fs::write(ctx.scratch_dir().join(LOCKFILE), lockfile).await?;

      let prefix_arg = prefix.to_string_lossy();
      ctx.log().info(format!("installing lockfile into {}", prefix.display()));
      ctx
        .run(CondaTools::command(
          &tools.conda_lock,
          &["install", "--prefix", &*prefix_arg, LOCKFILE],
        ))
        .await?;
      Ok(())
    })
    .await
}

/// Downloads and extracts every conda package pinned by `lockfile` into the
/// package cache `pkgs_dir`, without creating an environment.
///
/// Returns the number of packages requested.
pub async fn fetch_and_extract_conda_packages(
  lockfile: &str,
  pkgs_dir: &Path,
  tools: &CondaTools,
) -> Result<ActionReport<usize>, ActionError> {
  Action::new("fetch_and_extract_conda_packages")
    .run(async |ctx: &ExecutionContext| {
      let urls = lockfile_explicit_urls(lockfile)?;
      if urls.is_empty() {
        ctx.log().info("lockfile pins no conda packages");
        return Ok(0);
      }

      let mut explicit = String::from("@EXPLICIT\n");
      for url in &urls {
        explicit.push_str(url);
        explicit.push('\n');
      }
      tokio::fs::write(ctx.scratch_dir().join(EXPLICIT_FILE), explicit).await?;
      tokio::fs::create_dir_all(pkgs_dir).await?;

      // Conda wants a target prefix even for download-only runs; it is
      // never populated and disappears with the scratch directory.
      let target = ctx.scratch_dir().join("download-target");
      let target_arg = target.to_string_lossy();
      ctx
        .log()
        .info(format!("fetching {} packages into {}", urls.len(), pkgs_dir.display()));
      ctx
        .run(
          CondaTools::command(
            &tools.conda,
            &["create", "--download-only", "--yes", "--prefix", &*target_arg, "--file", EXPLICIT_FILE],
          )
          .env("CONDA_PKGS_DIRS", pkgs_dir.to_string_lossy()),
        )
        .await?;
      Ok(urls.len())
    })
    .await
}

/// Records the packages installed in `prefix` against a build.
pub async fn add_conda_prefix_packages<S: BuildStore + ?Sized>(
  store: &S,
  build_id: BuildId,
  prefix: &Path,
) -> Result<ActionReport<usize>, ActionError> {
  Action::new("add_conda_prefix_packages")
    .run(async |ctx: &ExecutionContext| {
      ensure_prefix(prefix)?;
      let root = prefix.to_path_buf();
      let packages = tokio::task::spawn_blocking(move || prefix_packages(&root))
        .await
        .map_err(io::Error::other)??;
      let count = packages.len();
      store.add_packages(build_id, packages)?;
      ctx.log().info(format!(
        "recorded {} packages from {} for build {}",
        count,
        prefix.display(),
        build_id
      ));
      Ok(count)
    })
    .await
}
