//! Conda-specific formats and conventions.
//!
//! - [`spec`] - environment specifications submitted by users
//! - [`lockfile`] - pinned package records extracted from solver lockfiles
//! - [`meta`] - package records of an installed environment
//! - [`channel_url`] / [`is_conda_prefix`] - small helpers shared by actions

mod lockfile;
mod meta;
mod spec;

pub use lockfile::*;
pub use meta::*;
pub use spec::*;

use std::path::Path;

use crate::consts::PREFIX_HISTORY_PATH;

const ANACONDA_CHANNEL_HOST: &str = "https://conda.anaconda.org/main";
const ANACONDA_REPO_MAIN: &str = "https://repo.anaconda.com/pkgs/main";

/// True when `path` is a managed environment directory.
pub fn is_conda_prefix(path: &Path) -> bool {
  path.join(PREFIX_HISTORY_PATH).is_file()
}

/// Normalizes a channel URL.
///
/// The `main` channel on conda.anaconda.org is served from repo.anaconda.com;
/// all other channels are kept as-is without a trailing slash.
pub fn channel_url(url: &str) -> String {
  let trimmed = url.trim_end_matches('/');
  if trimmed == ANACONDA_CHANNEL_HOST {
    return ANACONDA_REPO_MAIN.to_string();
  }
  trimmed.to_string()
}
