//! Subprocess execution with streamed output capture.
//!
//! Output is read from the child's pipes as it is produced and appended to
//! the owning action's buffers, so long-running commands show progress and
//! large outputs never fill a pipe.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::action::context::OutputBuffer;
use crate::action::types::ActionError;

const CHUNK_SIZE: usize = 8192;

/// How a command is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
  /// Program followed by its arguments, no shell involved.
  Exec(Vec<String>),
  /// A script interpreted by the platform shell.
  Shell(String),
}

/// A command to run inside an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  line: CommandLine,
  redirect_stderr: bool,
  shell: Option<String>,
  cwd: Option<PathBuf>,
  env: BTreeMap<String, String>,
}

impl CommandSpec {
  fn with_line(line: CommandLine) -> Self {
    Self {
      line,
      redirect_stderr: true,
      shell: None,
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn exec<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::with_line(CommandLine::Exec(args.into_iter().map(Into::into).collect()))
  }

  pub fn shell(script: impl Into<String>) -> Self {
    Self::with_line(CommandLine::Shell(script.into()))
  }

  /// Merge stderr into the captured stdout stream (the default). When
  /// disabled, stderr goes to the action's separate stderr buffer.
  pub fn redirect_stderr(mut self, redirect: bool) -> Self {
    self.redirect_stderr = redirect;
    self
  }

  /// Interpreter for [`CommandLine::Shell`] scripts.
  pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
    self.shell = Some(shell.into());
    self
  }

  /// Working directory. Defaults to the action's scratch directory.
  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn line(&self) -> &CommandLine {
    &self.line
  }

  pub fn redirects_stderr(&self) -> bool {
    self.redirect_stderr
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.line {
      CommandLine::Exec(args) => write!(f, "{}", args.join(" ")),
      CommandLine::Shell(script) => write!(f, "{}", script),
    }
  }
}

/// Output of one successful command.
///
/// `stdout` includes stderr when it was redirected; `stderr` is then empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
  pub code: i32,
  pub stdout: String,
  pub stderr: String,
}

/// Get the shell command and arguments for the current platform.
///
/// An explicit shell gets the argument style its name suggests.
pub(crate) fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}

/// Runs `spec`, appending its output to `stdout` and `stderr` as it arrives.
///
/// With `redirect_stderr`, fds 1 and 2 of the child share one pipe, so the
/// merged stream keeps the order in which the child wrote it.
pub(crate) async fn execute(
  spec: &CommandSpec,
  default_cwd: &Path,
  stdout: &OutputBuffer,
  stderr: &OutputBuffer,
) -> Result<CommandOutput, ActionError> {
  let cmd_line = spec.to_string();
  info!(cmd = %cmd_line, "executing command");

  let mut command = match &spec.line {
    CommandLine::Exec(args) => {
      let (program, rest) = args.split_first().ok_or(ActionError::EmptyCommand)?;
      let mut command = Command::new(program);
      command.args(rest);
      command
    }
    CommandLine::Shell(script) => {
      let (shell, shell_args) = get_shell(spec.shell.as_deref());
      let mut command = Command::new(shell);
      command.args(shell_args).arg(script);
      command
    }
  };

  let working_dir = spec.cwd.as_deref().unwrap_or(default_cwd);
  command
    .current_dir(working_dir)
    .envs(&spec.env)
    .stdin(Stdio::null())
    .kill_on_drop(true);

  let merged = if spec.redirect_stderr {
    let (reader, writer) = io::pipe()?;
    command.stdout(writer.try_clone()?).stderr(writer);
    Some(reader)
  } else {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    None
  };

  debug!(working_dir = ?working_dir, redirect_stderr = spec.redirect_stderr, "spawning process");

  let spawned = command.spawn();
  // The parent's copies of the pipe writer live in `command`; the reader
  // only sees EOF once they are closed.
  drop(command);
  let mut child = spawned.map_err(|source| ActionError::Spawn {
    cmd: cmd_line.clone(),
    source,
  })?;

  let own_stdout = OutputBuffer::new();
  let own_stderr = OutputBuffer::new();

  let pumps = match merged {
    Some(reader) => {
      let sinks = [stdout.clone(), own_stdout.clone()];
      vec![tokio::task::spawn_blocking(move || pump_blocking(reader, sinks))]
    }
    None => {
      let mut pumps = Vec::with_capacity(2);
      if let Some(pipe) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(pipe, [stdout.clone(), own_stdout.clone()])));
      }
      if let Some(pipe) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(pipe, [stderr.clone(), own_stderr.clone()])));
      }
      pumps
    }
  };

  let status = child.wait().await?;
  for handle in pumps {
    handle.await.map_err(io::Error::other)??;
  }

  let output = CommandOutput {
    code: status.code().unwrap_or(-1),
    stdout: own_stdout.text(),
    stderr: own_stderr.text(),
  };

  if !status.success() {
    debug!(cmd = %cmd_line, code = ?status.code(), "command failed");
    return Err(ActionError::CommandFailed {
      cmd: cmd_line,
      code: status.code(),
      output: output.stdout,
    });
  }

  debug!(cmd = %cmd_line, bytes = output.stdout.len(), "command finished");
  Ok(output)
}

async fn pump<R>(mut reader: R, sinks: [OutputBuffer; 2]) -> io::Result<()>
where
  R: AsyncRead + Unpin,
{
  let mut chunk = [0u8; CHUNK_SIZE];
  loop {
    let n = reader.read(&mut chunk).await?;
    if n == 0 {
      return Ok(());
    }
    for sink in &sinks {
      sink.append(&chunk[..n]);
    }
  }
}

fn pump_blocking<R: Read>(mut reader: R, sinks: [OutputBuffer; 2]) -> io::Result<()> {
  let mut chunk = [0u8; CHUNK_SIZE];
  loop {
    let n = match reader.read(&mut chunk) {
      Ok(n) => n,
      Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
      Err(err) => return Err(err),
    };
    if n == 0 {
      return Ok(());
    }
    for sink in &sinks {
      sink.append(&chunk[..n]);
    }
  }
}
