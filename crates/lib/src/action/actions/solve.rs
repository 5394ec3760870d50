//! Solving environment specifications into lockfiles.

use tracing::debug;

use crate::action::{Action, ActionError, ActionReport, CommandSpec, ExecutionContext};
use crate::build::BuildId;
use crate::conda::{EnvironmentSpec, lockfile_packages};
use crate::platform::Platform;
use crate::store::BuildStore;
use crate::util::hash::{ContentHash, hash_bytes};

const ENVIRONMENT_FILE: &str = "environment.yaml";
const LOCKFILE: &str = "conda-lock.yaml";

/// External solver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOptions {
  /// Program and leading arguments; solver flags are appended.
  pub command: Vec<String>,
  pub platform: Platform,
}

impl SolverOptions {
  pub fn new(platform: Platform) -> Self {
    Self {
      command: vec!["conda-lock".to_string()],
      platform,
    }
  }

  pub fn with_command<I, S>(mut self, command: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.command = command.into_iter().map(Into::into).collect();
    self
  }
}

/// A solved lockfile and the hash of its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
  pub lockfile: String,
  pub content_hash: ContentHash,
}

/// Runs the solver on `spec` inside a scratch directory.
pub async fn solve_lockfile(
  spec: &EnvironmentSpec,
  options: &SolverOptions,
) -> Result<ActionReport<SolveOutcome>, ActionError> {
  Action::new("solve_lockfile")
    .run(async |ctx: &ExecutionContext| {
      tokio::fs::write(ctx.scratch_dir().join(ENVIRONMENT_FILE), spec.to_yaml()?).await?;

      let subdir = options.platform.subdir();
      let mut args = options.command.clone();
      args.extend(
        ["--file", ENVIRONMENT_FILE, "--platform", subdir.as_str(), "--lockfile", LOCKFILE].map(String::from),
      );
      ctx.log().info(format!("solving {} for {}", spec.name, subdir));
      ctx.run(CommandSpec::exec(args)).await?;

      let lockfile = tokio::fs::read_to_string(ctx.scratch_dir().join(LOCKFILE)).await?;
      let content_hash = hash_bytes(lockfile.as_bytes());
      debug!(hash = %content_hash, bytes = lockfile.len(), "read lockfile");
      Ok(SolveOutcome { lockfile, content_hash })
    })
    .await
}

/// Records the conda packages pinned by `lockfile` against a build.
pub async fn add_lockfile_packages<S: BuildStore + ?Sized>(
  store: &S,
  build_id: BuildId,
  lockfile: &str,
) -> Result<ActionReport<usize>, ActionError> {
  Action::new("add_lockfile_packages")
    .run(async |ctx: &ExecutionContext| {
      let packages = lockfile_packages(lockfile)?;
      let count = packages.len();
      store.add_packages(build_id, packages)?;
      ctx.log().info(format!("recorded {} packages for build {}", count, build_id));
      Ok(count)
    })
    .await
}
