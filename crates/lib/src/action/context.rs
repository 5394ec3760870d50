//! Per-action scratch state: captured streams, scratch directory, timing.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{error, info, warn};

use crate::action::command::{self, CommandOutput, CommandSpec};
use crate::action::types::ActionError;

/// Append-only byte buffer shared between an action and the subprocess
/// readers feeding it.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn append(&self, bytes: &[u8]) {
    self.lock().extend_from_slice(bytes);
  }

  pub fn contents(&self) -> Vec<u8> {
    self.lock().clone()
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.lock()).into_owned()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl io::Write for OutputBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.append(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// The live context handed to an action body.
///
/// Owns the scratch directory exclusively; it is removed when the runner
/// finishes the action, on every exit path.
pub struct ExecutionContext {
  name: String,
  scratch: TempDir,
  stdout: OutputBuffer,
  stderr: OutputBuffer,
  started_at: Instant,
}

impl ExecutionContext {
  pub(crate) fn create(name: &str, scratch_root: Option<&Path>) -> Result<Self, ActionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("envstore-action-");
    let scratch = match scratch_root {
      Some(root) => builder.tempdir_in(root),
      None => builder.tempdir(),
    }
    .map_err(ActionError::Setup)?;

    Ok(Self {
      name: name.to_string(),
      scratch,
      stdout: OutputBuffer::new(),
      stderr: OutputBuffer::new(),
      started_at: Instant::now(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The action's private working directory. Commands run here by default.
  pub fn scratch_dir(&self) -> &Path {
    self.scratch.path()
  }

  pub fn elapsed(&self) -> Duration {
    self.started_at.elapsed()
  }

  /// Writer for the captured stdout stream.
  pub fn stdout(&self) -> OutputBuffer {
    self.stdout.clone()
  }

  /// Writes a line to the captured stdout stream.
  pub fn print(&self, text: impl AsRef<str>) {
    self.write_line(&self.stdout, text.as_ref());
  }

  /// Writes a diagnostic line from the action body.
  ///
  /// Direct diagnostics share the captured stdout stream, like redirected
  /// subprocess stderr. The separate stderr buffer only ever receives
  /// subprocess stderr run with `redirect_stderr(false)`.
  pub fn eprint(&self, text: impl AsRef<str>) {
    self.write_line(&self.stdout, text.as_ref());
  }

  /// Logger whose messages land in the captured stdout and in `tracing`.
  pub fn log(&self) -> ActionLog<'_> {
    ActionLog { ctx: self }
  }

  /// Runs a command, streaming its output into this context's buffers.
  pub async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ActionError> {
    command::execute(&spec, self.scratch_dir(), &self.stdout, &self.stderr).await
  }

  fn write_line(&self, buffer: &OutputBuffer, text: &str) {
    buffer.append(text.as_bytes());
    buffer.append(b"\n");
  }

  pub(crate) fn finish<T>(self, result: Result<T, ActionError>) -> ActionReport<T> {
    let elapsed = self.started_at.elapsed();
    let secs = elapsed.as_secs_f64();
    match &result {
      Ok(_) => {
        self.write_line(&self.stdout, &format!("Action {} completed in {:.3} s.", self.name, secs));
        info!(action = %self.name, elapsed_secs = secs, "action completed");
      }
      Err(err) => {
        self.write_line(&self.stdout, &format!("Action {} failed in {:.3} s: {}", self.name, secs, err));
        warn!(action = %self.name, elapsed_secs = secs, error = %err, "action failed");
      }
    }

    let stdout = self.stdout.text();
    let stderr = self.stderr.text();
    let scratch_dir = self.scratch.path().to_path_buf();
    let result = match self.scratch.close() {
      Ok(()) => result,
      Err(source) => {
        error!(action = %self.name, path = %scratch_dir.display(), error = %source, "failed to remove scratch directory");
        result.and(Err(ActionError::Cleanup {
          path: scratch_dir.clone(),
          source,
        }))
      }
    };

    ActionReport {
      name: self.name,
      stdout,
      stderr,
      result,
      elapsed,
      scratch_dir,
    }
  }
}

/// Logging handle bound to one execution context.
pub struct ActionLog<'a> {
  ctx: &'a ExecutionContext,
}

impl ActionLog<'_> {
  pub fn info(&self, message: impl AsRef<str>) {
    let message = message.as_ref();
    self.ctx.write_line(&self.ctx.stdout, message);
    info!(action = %self.ctx.name, "{}", message);
  }

  pub fn warning(&self, message: impl AsRef<str>) {
    let message = message.as_ref();
    self.ctx.write_line(&self.ctx.stdout, message);
    warn!(action = %self.ctx.name, "{}", message);
  }

  pub fn error(&self, message: impl AsRef<str>) {
    let message = message.as_ref();
    self.ctx.write_line(&self.ctx.stdout, message);
    error!(action = %self.ctx.name, "{}", message);
  }
}

/// What remains of an action after it ran: captured streams, timing, and
/// the body's result. The scratch directory no longer exists.
#[derive(Debug)]
pub struct ActionReport<T> {
  pub name: String,
  pub stdout: String,
  pub stderr: String,
  pub result: Result<T, ActionError>,
  pub elapsed: Duration,
  pub scratch_dir: PathBuf,
}

impl<T> ActionReport<T> {
  pub fn is_success(&self) -> bool {
    self.result.is_ok()
  }

  pub fn result(&self) -> Result<&T, &ActionError> {
    self.result.as_ref()
  }

  pub fn into_result(self) -> Result<T, ActionError> {
    self.result
  }
}
