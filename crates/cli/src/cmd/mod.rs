mod info;
mod key;
mod prefix;
mod run;

pub use info::cmd_info;
pub use key::{KeyEncodeArgs, cmd_key_decode, cmd_key_encode};
pub use prefix::cmd_prefix_stats;
pub use run::{RunArgs, cmd_run};

use anyhow::{Context, Result};
use envstore_lib::config::Settings;
use tracing::debug;

/// Settings file and environment, then the `--key-version` flag on top.
fn load_settings(key_version: Option<i64>) -> Result<Settings> {
  let mut settings = Settings::load().context("Failed to load settings")?;
  if let Some(version) = key_version {
    settings.set_build_key_version(version)?;
  }
  debug!(build_key_version = %settings.build_key_version(), "resolved settings");
  Ok(settings)
}
