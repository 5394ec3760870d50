use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::lockfile::split_package_url;
use crate::conda::{PackageRecord, channel_url};

const CONDA_META_DIR: &str = "conda-meta";

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid package record {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// The subset of a `conda-meta/<dist>.json` record that identifies a package.
#[derive(Deserialize)]
struct InstalledRecord {
  name: String,
  version: String,
  build: String,
  #[serde(default)]
  channel: String,
  #[serde(default)]
  subdir: String,
  #[serde(default)]
  md5: String,
  #[serde(default)]
  sha256: Option<String>,
  #[serde(default)]
  url: Option<String>,
}

impl From<InstalledRecord> for PackageRecord {
  fn from(record: InstalledRecord) -> Self {
    let from_url = record
      .url
      .as_deref()
      .and_then(split_package_url)
      .map(|(channel, subdir, _)| (channel.to_string(), subdir.to_string()));
    let (channel, subdir) = from_url.unwrap_or_else(|| {
      let suffix = format!("/{}", record.subdir);
      let channel = record.channel.strip_suffix(&suffix).unwrap_or(&record.channel);
      (channel.to_string(), record.subdir.clone())
    });

    PackageRecord {
      name: record.name,
      version: record.version,
      build: record.build,
      channel: channel_url(&channel),
      subdir,
      md5: record.md5,
      sha256: record.sha256,
    }
  }
}

/// Reads the package records of an installed environment, sorted by name.
///
/// Only `*.json` files directly under `conda-meta/` are considered.
pub fn prefix_packages(prefix: &Path) -> Result<Vec<PackageRecord>, MetadataError> {
  let meta_dir = prefix.join(CONDA_META_DIR);
  let read_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source| MetadataError::Read { path, source }
  };

  let mut packages = Vec::new();
  for entry in std::fs::read_dir(&meta_dir).map_err(read_err(&meta_dir))? {
    let path = entry.map_err(read_err(&meta_dir))?.path();
    if path.extension().is_none_or(|ext| ext != "json") || !path.is_file() {
      continue;
    }
    let text = std::fs::read_to_string(&path).map_err(read_err(&path))?;
    let record: InstalledRecord =
      serde_json::from_str(&text).map_err(|source| MetadataError::Parse { path: path.clone(), source })?;
    packages.push(PackageRecord::from(record));
  }
  packages.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
  Ok(packages)
}
