//! Standalone installers built with constructor.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::action::{Action, ActionError, ActionReport, CommandSpec, ExecutionContext};
use crate::conda::EnvironmentSpec;
use crate::platform::Platform;
use crate::platform::os::Os;

const CONSTRUCTOR_URL: &str = "https://github.com/conda/constructor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerOptions {
  /// Program and leading arguments used to invoke constructor.
  pub constructor: Vec<String>,
  /// Where the finished installer is written.
  pub installer_dir: PathBuf,
  pub version: String,
  pub platform: Platform,
}

impl InstallerOptions {
  pub fn new(installer_dir: impl Into<PathBuf>, platform: Platform) -> Self {
    Self {
      constructor: vec!["constructor".to_string()],
      installer_dir: installer_dir.into(),
      version: "1".to_string(),
      platform,
    }
  }

  pub fn with_constructor<I, S>(mut self, command: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.constructor = command.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = version.into();
    self
  }

  fn command(&self, args: &[&str]) -> CommandSpec {
    CommandSpec::exec(self.constructor.iter().map(String::as_str).chain(args.iter().copied()))
  }
}

#[derive(Debug, Serialize)]
struct ConstructFile<'a> {
  name: &'a str,
  version: &'a str,
  channels: &'a [String],
  specs: Vec<&'a str>,
  installer_filename: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  post_install: Option<String>,
}

/// Generates an installer for `spec`.
///
/// Returns `None` when constructor is not installed.
pub async fn generate_constructor_installer(
  spec: &EnvironmentSpec,
  options: &InstallerOptions,
) -> Result<ActionReport<Option<PathBuf>>, ActionError> {
  Action::new("generate_constructor_installer")
    .run(async |ctx: &ExecutionContext| {
      match ctx.run(options.command(&["--help"])).await {
        Ok(_) => {}
        Err(err) if err.is_missing_program() => {
          ctx.log().warning(format!(
            "Installer generation requires constructor: {}",
            CONSTRUCTOR_URL
          ));
          return Ok(None);
        }
        Err(err) => return Err(err),
      }

      let build_dir = ctx.scratch_dir().join("build");
      let cache_dir = ctx.scratch_dir().join("pkgs");
      tokio::fs::create_dir_all(&build_dir).await?;
      tokio::fs::create_dir_all(&cache_dir).await?;
      tokio::fs::create_dir_all(&options.installer_dir).await?;

      let installer_filename = format!("{}.{}", spec.name, options.platform.installer_extension());
      let post_install = write_post_install(&build_dir, &spec.pip_dependencies(), options.platform.os).await?;
      let construct = ConstructFile {
        name: &spec.name,
        version: &options.version,
        channels: &spec.channels,
        specs: spec.conda_dependencies(),
        installer_filename: installer_filename.clone(),
        post_install: post_install.map(|p| p.to_string_lossy().into_owned()),
      };
      tokio::fs::write(build_dir.join("construct.yaml"), serde_yaml::to_string(&construct)?).await?;

      let cache = cache_dir.to_string_lossy().into_owned();
      let build = build_dir.to_string_lossy().into_owned();
      let subdir = options.platform.subdir();
      ctx
        .run(
          options
            .command(&["-v", "--cache-dir", cache.as_str(), "--platform", subdir.as_str(), build.as_str()])
            .cwd(&options.installer_dir),
        )
        .await?;

      let installer = options.installer_dir.join(&installer_filename);
      ctx.log().info(format!("generated installer {}", installer.display()));
      Ok(Some(installer))
    })
    .await
}

/// Writes the script that pip-installs `requirements` after the conda
/// packages are in place. Nothing is written when there are none.
async fn write_post_install(build_dir: &Path, requirements: &[&str], os: Os) -> Result<Option<PathBuf>, ActionError> {
  if requirements.is_empty() {
    return Ok(None);
  }

  let (filename, script) = match os {
    Os::Windows => {
      let quoted: Vec<String> = requirements.iter().map(|r| format!("\"{}\"", r)).collect();
      (
        "post_install.bat",
        format!("\"%PREFIX%\\python.exe\" -m pip install {}\r\n", quoted.join(" ")),
      )
    }
    Os::Linux | Os::MacOs => {
      let quoted: Vec<String> = requirements.iter().map(|r| format!("'{}'", r.replace('\'', "'\\''"))).collect();
      (
        "post_install.sh",
        format!(
          "#!/usr/bin/env bash\nset -euxo pipefail\n\"$PREFIX/bin/python\" -m pip install {}\n",
          quoted.join(" ")
        ),
      )
    }
  };

  let path = build_dir.join(filename);
  tokio::fs::write(&path, script).await?;
  Ok(Some(path))
}
