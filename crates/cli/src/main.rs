mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{KeyEncodeArgs, RunArgs};
use crate::output::OutputFormat;

/// envstore - build execution tools for conda environment stores
#[derive(Parser)]
#[command(name = "envstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Build key version, overriding settings and environment (1, 2 or 3)
  #[arg(long, global = true)]
  key_version: Option<i64>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show platform and build key configuration
  Info,

  /// Encode or decode build keys
  Key {
    #[command(subcommand)]
    command: KeyCommands,
  },

  /// Run a command as an action and print its captured output
  Run {
    /// Interpret the command with the platform shell
    #[arg(long)]
    shell: bool,

    /// Capture stderr separately instead of merging it into stdout
    #[arg(long)]
    no_redirect_stderr: bool,

    /// Abort the command after this long (e.g., "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Command and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
  },

  /// Inspect environment directories
  Prefix {
    #[command(subcommand)]
    command: PrefixCommands,
  },
}

#[derive(Subcommand)]
enum KeyCommands {
  /// Encode the build key for a build
  Encode {
    /// Build id
    #[arg(long)]
    id: u64,

    /// Environment name
    #[arg(long)]
    name: String,

    /// Full SHA-256 content hash of the build
    #[arg(long)]
    hash: String,

    /// When the build was scheduled, UTC (e.g., "2023-11-05T03:54:10.510258")
    #[arg(long, value_parser = parse_timestamp)]
    scheduled_on: NaiveDateTime,
  },

  /// Recover the build id from a build key
  Decode {
    /// Build key of any version
    key: String,
  },
}

#[derive(Subcommand)]
enum PrefixCommands {
  /// Show disk usage of an environment directory
  Stats {
    /// Path to the environment
    path: PathBuf,
  },
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    .ok_or_else(|| format!("invalid timestamp {:?}, expected YYYY-MM-DDTHH:MM:SS[.ffffff]", value))
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Commands::Info => cmd::cmd_info(cli.key_version, cli.output),
    Commands::Key { command } => match command {
      KeyCommands::Encode {
        id,
        name,
        hash,
        scheduled_on,
      } => cmd::cmd_key_encode(
        KeyEncodeArgs {
          id,
          name,
          hash,
          scheduled_on,
        },
        cli.key_version,
        cli.output,
      ),
      KeyCommands::Decode { key } => cmd::cmd_key_decode(&key, cli.output),
    },
    Commands::Run {
      shell,
      no_redirect_stderr,
      timeout,
      command,
    } => cmd::cmd_run(
      RunArgs {
        command,
        shell,
        redirect_stderr: !no_redirect_stderr,
        timeout,
      },
      cli.output,
    ),
    Commands::Prefix { command } => match command {
      PrefixCommands::Stats { path } => cmd::cmd_prefix_stats(&path, cli.output),
    },
  }
}
