use std::path::Path;

use anyhow::{Context, Result};

use envstore_lib::action::actions::get_conda_prefix_stats;

use crate::output::{OutputFormat, format_bytes, print_json, print_stat};

pub fn cmd_prefix_stats(path: &Path, output: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(get_conda_prefix_stats(path))?;
  let stats = report
    .into_result()
    .with_context(|| format!("Failed to inspect {}", path.display()))?;

  if output.is_json() {
    print_json(&stats)?;
  } else {
    println!("{}", path.display());
    print_stat("Disk usage", &format_bytes(stats.disk_usage));
  }
  Ok(())
}
