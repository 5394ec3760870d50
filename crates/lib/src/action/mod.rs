//! Action execution.
//!
//! An action is a unit of build work run inside an isolated
//! [`ExecutionContext`]: a fresh scratch directory, captured stdout and
//! stderr buffers, and a logger that writes into the captured stdout. The
//! runner returns an [`ActionReport`] holding the body's result together
//! with everything it printed.
//!
//! ```no_run
//! # async fn demo() -> Result<(), envstore_lib::action::ActionError> {
//! use envstore_lib::action::{Action, CommandSpec};
//!
//! let report = Action::new("list_scratch")
//!   .run(async |ctx| {
//!     ctx.log().info("listing scratch directory");
//!     ctx.run(CommandSpec::shell("ls -la")).await?;
//!     Ok(())
//!   })
//!   .await?;
//! println!("{}", report.stdout);
//! # Ok(())
//! # }
//! ```
//!
//! # Submodules
//!
//! - [`actions`] - Build actions: solving, installers, prefix maintenance

pub mod actions;
mod command;
mod context;
mod types;

pub use command::{CommandLine, CommandOutput, CommandSpec};
pub use context::{ActionLog, ActionReport, ExecutionContext, OutputBuffer};
pub use types::*;

use std::path::PathBuf;

use tracing::{Instrument, debug, info_span};

/// Runs a named body inside a fresh execution context.
#[derive(Debug, Clone)]
pub struct Action {
  name: String,
  scratch_root: Option<PathBuf>,
}

impl Action {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      scratch_root: None,
    }
  }

  /// Parent directory for the scratch directory. Defaults to the system
  /// temporary directory.
  pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.scratch_root = Some(root.into());
    self
  }

  /// Runs `body` and tears the context down afterwards.
  ///
  /// Only a failure to set up the context is returned as `Err`; errors from
  /// the body are kept in [`ActionReport::result`] next to the output
  /// captured before they happened. The scratch directory is removed on
  /// every exit path, including a panic in `body`.
  pub async fn run<T, F>(self, body: F) -> Result<ActionReport<T>, ActionError>
  where
    F: AsyncFnOnce(&ExecutionContext) -> Result<T, ActionError>,
  {
    let ctx = ExecutionContext::create(&self.name, self.scratch_root.as_deref())?;
    let span = info_span!("action", name = %self.name);
    debug!(parent: &span, scratch_dir = %ctx.scratch_dir().display(), "starting action");

    let result = body(&ctx).instrument(span).await;
    Ok(ctx.finish(result))
  }
}
