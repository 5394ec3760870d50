//! Build actions.
//!
//! Each function wraps its work in an [`Action`](crate::action::Action), so
//! callers always get an [`ActionReport`](crate::action::ActionReport) with
//! the captured output alongside the result:
//!
//! - [`solve`] - Solve a specification into a lockfile and record its packages
//! - [`install`] - Fetch packages, install environments, record what they contain
//! - [`export`] - Export an installed environment or pack it into an archive
//! - [`installer`] - Generate a standalone installer with constructor
//! - [`prefix`] - Inspect, fix up, and remove environment directories

pub mod export;
pub mod install;
pub mod installer;
pub mod prefix;
pub mod solve;

pub use export::{generate_conda_export, generate_conda_pack};
pub use install::{
  CondaTools, add_conda_prefix_packages, fetch_and_extract_conda_packages, install_lockfile, install_specification,
};
pub use installer::{InstallerOptions, generate_constructor_installer};
pub use prefix::{PrefixStats, get_conda_prefix_stats, remove_conda_prefix, set_conda_prefix_permissions};
pub use solve::{SolveOutcome, SolverOptions, add_lockfile_packages, solve_lockfile};
