use anyhow::{Result, bail};
use chrono::NaiveDateTime;

use envstore_lib::build::{Build, BuildId, BuildKeyVersion};
use envstore_lib::util::hash::ContentHash;

use crate::cmd::load_settings;
use crate::output::{OutputFormat, print_json, print_stat, print_warning};

pub struct KeyEncodeArgs {
  pub id: u64,
  pub name: String,
  pub hash: String,
  pub scheduled_on: NaiveDateTime,
}

pub fn cmd_key_encode(args: KeyEncodeArgs, key_version: Option<i64>, output: OutputFormat) -> Result<()> {
  let settings = load_settings(key_version)?;
  let codec = settings.codec();

  let content_hash = ContentHash(args.hash);
  if !content_hash.is_valid() {
    bail!("content hash must be 64 lowercase hex characters, got {:?}", content_hash.0);
  }

  let build = Build {
    id: BuildId(args.id),
    namespace: String::new(),
    name: args.name,
    content_hash,
    scheduled_on: args.scheduled_on,
  };
  let key = codec.encode(&build);

  if output.is_json() {
    print_json(&serde_json::json!({
      "version": codec.current_version().number(),
      "key": key,
    }))?;
  } else {
    println!("{}", key);
  }
  Ok(())
}

pub fn cmd_key_decode(key: &str, output: OutputFormat) -> Result<()> {
  let version = BuildKeyVersion::detect(key)?;
  let Some(build_id) = version.decode(key)? else {
    print_warning("Version 3 keys do not embed the build id; decoding requires a build store lookup");
    bail!("cannot decode build key {} without a build store", key);
  };

  if output.is_json() {
    print_json(&serde_json::json!({
      "version": version.number(),
      "build_id": build_id.0,
    }))?;
  } else {
    print_stat("Version", &version.to_string());
    print_stat("Build id", &build_id.to_string());
  }
  Ok(())
}
