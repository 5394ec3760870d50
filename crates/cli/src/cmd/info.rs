use anyhow::Result;

use envstore_lib::build::BuildKeyVersion;
use envstore_lib::platform::conda_platform;

use crate::cmd::load_settings;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(key_version: Option<i64>, output: OutputFormat) -> Result<()> {
  let settings = load_settings(key_version)?;
  let codec = settings.codec();
  let platform = conda_platform();
  let supported: Vec<u8> = BuildKeyVersion::ALL.iter().map(|v| v.number()).collect();

  if output.is_json() {
    print_json(&serde_json::json!({
      "platform": platform,
      "build_key_version": codec.current_version().number(),
      "supported_build_key_versions": supported,
    }))?;
    return Ok(());
  }

  println!("System:");
  match platform {
    Some(subdir) => print_stat("Platform", &subdir),
    _ => println!("Could not detect platform."),
  }
  println!("Build keys:");
  print_stat("Active version", &codec.current_version().to_string());
  let (a, b, c) = codec.versions();
  print_stat("Supported versions", &format!("({}, {}, {})", a, b, c));
  Ok(())
}
