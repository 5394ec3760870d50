use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conda::channel_url;

#[derive(Debug, Error)]
pub enum LockfileError {
  #[error("failed to parse lockfile: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("unrecognized package url: {0}")]
  PackageUrl(String),
}

/// A pinned conda package installed into a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
  pub name: String,
  pub version: String,
  pub build: String,
  pub channel: String,
  pub subdir: String,
  pub md5: String,
  #[serde(default)]
  pub sha256: Option<String>,
}

impl PackageRecord {
  /// Archive name in the `.tar.bz2` format.
  ///
  /// The source archive format is not recorded: packages pinned as `.conda`
  /// files get a `.tar.bz2` name here, while `md5` keeps describing the
  /// `.conda` archive.
  pub fn filename(&self) -> String {
    format!("{}-{}-{}.tar.bz2", self.name, self.version, self.build)
  }

  /// Line of an explicit pinned list: `<channel>/<subdir>/<file>#<md5>`.
  pub fn explicit_url(&self) -> String {
    format!(
      "{}/{}/{}#{}",
      channel_url(&self.channel),
      self.subdir,
      self.filename(),
      self.md5
    )
  }
}

#[derive(Deserialize)]
struct LockfileDoc {
  #[serde(default)]
  package: Vec<LockedPackage>,
}

#[derive(Deserialize)]
struct LockedPackage {
  name: String,
  version: String,
  manager: String,
  url: String,
  #[serde(default)]
  hash: LockedHash,
}

#[derive(Deserialize, Default)]
struct LockedHash {
  md5: Option<String>,
  sha256: Option<String>,
}

/// Extracts the conda packages pinned by a conda-lock (v1) lockfile.
///
/// Pip entries are skipped.
pub fn lockfile_packages(text: &str) -> Result<Vec<PackageRecord>, LockfileError> {
  let doc: LockfileDoc = serde_yaml::from_str(text)?;
  doc
    .package
    .into_iter()
    .filter(|p| p.manager == "conda")
    .map(|p| {
      let (channel, subdir, file) = split_package_url(&p.url).ok_or_else(|| LockfileError::PackageUrl(p.url.clone()))?;
      let stem = file
        .strip_suffix(".tar.bz2")
        .or_else(|| file.strip_suffix(".conda"))
        .ok_or_else(|| LockfileError::PackageUrl(p.url.clone()))?;
      let build = stem
        .strip_prefix(&format!("{}-{}-", p.name, p.version))
        .ok_or_else(|| LockfileError::PackageUrl(p.url.clone()))?;
      Ok(PackageRecord {
        build: build.to_string(),
        channel: channel.to_string(),
        subdir: subdir.to_string(),
        md5: p.hash.md5.unwrap_or_default(),
        sha256: p.hash.sha256,
        name: p.name,
        version: p.version,
      })
    })
    .collect()
}

/// `<url>#<md5>` lines for the conda packages pinned by a lockfile.
///
/// Unlike [`PackageRecord::explicit_url`], archive names are kept exactly as
/// locked.
pub fn lockfile_explicit_urls(text: &str) -> Result<Vec<String>, LockfileError> {
  let doc: LockfileDoc = serde_yaml::from_str(text)?;
  Ok(
    doc
      .package
      .into_iter()
      .filter(|p| p.manager == "conda")
      .map(|p| match p.hash.md5 {
        Some(md5) => format!("{}#{}", p.url, md5),
        None => p.url,
      })
      .collect(),
  )
}

/// Splits `<channel>/<subdir>/<file>`.
pub(crate) fn split_package_url(url: &str) -> Option<(&str, &str, &str)> {
  let (rest, file) = url.rsplit_once('/')?;
  let (channel, subdir) = rest.rsplit_once('/')?;
  if channel.is_empty() || subdir.is_empty() || file.is_empty() {
    return None;
  }
  Some((channel, subdir, file))
}

#[cfg(test)]
mod tests {
  use super::*;

  const LOCKFILE: &str = r#"
version: 1
metadata:
  platforms:
    - linux-64
package:
  - name: zlib
    version: 1.2.13
    manager: conda
    platform: linux-64
    url: https://conda.anaconda.org/conda-forge/linux-64/zlib-1.2.13-hd590300_5.conda
    hash:
      md5: 68c34ec6149623be41a1933ab996a209
      sha256: 9887a04d7e7cb14bd2b52fa01858f05a6d7f002c890f618d9fcd864adbfecb1b
  - name: flask
    version: 3.0.0
    manager: pip
    platform: linux-64
    url: https://files.pythonhosted.org/packages/flask-3.0.0-py3-none-any.whl
    hash:
      sha256: 21128f47e4e3b9d597a3e8521a329bf56909b690fcc3fa3e477725aa81367638
"#;

  #[test]
  fn extracts_conda_packages_only() {
    let packages = lockfile_packages(LOCKFILE).unwrap();
    assert_eq!(packages.len(), 1);
    let zlib = &packages[0];
    assert_eq!(zlib.name, "zlib");
    assert_eq!(zlib.build, "hd590300_5");
    assert_eq!(zlib.channel, "https://conda.anaconda.org/conda-forge");
    assert_eq!(zlib.subdir, "linux-64");
    assert_eq!(zlib.md5, "68c34ec6149623be41a1933ab996a209");
  }

  #[test]
  fn explicit_url_is_tarball_with_md5_fragment() {
    let packages = lockfile_packages(LOCKFILE).unwrap();
    assert_eq!(
      packages[0].explicit_url(),
      "https://conda.anaconda.org/conda-forge/linux-64/zlib-1.2.13-hd590300_5.tar.bz2#68c34ec6149623be41a1933ab996a209"
    );
  }

  #[test]
  fn explicit_urls_keep_archive_format() {
    assert_eq!(
      lockfile_explicit_urls(LOCKFILE).unwrap(),
      vec!["https://conda.anaconda.org/conda-forge/linux-64/zlib-1.2.13-hd590300_5.conda#68c34ec6149623be41a1933ab996a209"]
    );
  }

  #[test]
  fn empty_lockfile_has_no_packages() {
    assert!(lockfile_packages("version: 1").unwrap().is_empty());
  }

  #[test]
  fn bad_urls_are_reported() {
    let text = r#"
package:
  - name: zlib
    version: "1.2"
    manager: conda
    url: zlib-1.2-0.tar.bz2
"#;
    assert!(matches!(lockfile_packages(text), Err(LockfileError::PackageUrl(_))));
  }
}
