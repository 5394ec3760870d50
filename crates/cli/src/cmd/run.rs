use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use envstore_lib::action::{Action, ActionError, CommandSpec};

use crate::output::{OutputFormat, format_duration, print_error, print_json};

pub struct RunArgs {
  pub command: Vec<String>,
  pub shell: bool,
  pub redirect_stderr: bool,
  pub timeout: Option<Duration>,
}

pub fn cmd_run(args: RunArgs, output: OutputFormat) -> Result<()> {
  let spec = if args.shell {
    CommandSpec::shell(args.command.join(" "))
  } else {
    CommandSpec::exec(args.command)
  }
  .redirect_stderr(args.redirect_stderr);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let action = Action::new("run").run(async move |ctx| ctx.run(spec).await);
    match args.timeout {
      Some(limit) => tokio::time::timeout(limit, action)
        .await
        .map_err(|_| anyhow!("command timed out after {}", humantime::format_duration(limit))),
      None => Ok(action.await),
    }
  })??;

  let exit_code = match &report.result {
    Ok(out) => out.code,
    Err(ActionError::CommandFailed { code, .. }) => code.unwrap_or(1),
    Err(_) => 1,
  };

  if output.is_json() {
    print_json(&serde_json::json!({
      "name": report.name,
      "stdout": report.stdout,
      "stderr": report.stderr,
      "success": report.is_success(),
      "exit_code": exit_code,
      "elapsed": format_duration(report.elapsed),
    }))?;
  } else {
    print!("{}", report.stdout);
    eprint!("{}", report.stderr);
  }

  if let Err(err) = &report.result {
    if !output.is_json() {
      print_error(&err.to_string());
    }
    std::process::exit(exit_code);
  }
  Ok(())
}
