//! Exporting and packing installed environments.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::action::actions::install::CondaTools;
use crate::action::actions::prefix::ensure_prefix;
use crate::action::{Action, ActionError, ActionReport, ExecutionContext};
use crate::conda::EnvironmentSpec;

/// Exports the specification of the environment installed at `prefix`.
///
/// Conda only names environments that live in one of its `envs`
/// directories; otherwise the prefix directory name is used.
pub async fn generate_conda_export(prefix: &Path, tools: &CondaTools) -> Result<ActionReport<EnvironmentSpec>, ActionError> {
  Action::new("generate_conda_export")
    .run(async |ctx: &ExecutionContext| {
      ensure_prefix(prefix)?;
      let prefix_arg = prefix.to_string_lossy();
      let output = ctx
        .run(
          CondaTools::command(&tools.conda, &["env", "export", "--prefix", &*prefix_arg, "--json"])
            .redirect_stderr(false),
        )
        .await?;

      let mut export: Value = serde_json::from_str(&output.stdout)?;
      if let Value::Object(fields) = &mut export {
        fields.remove("prefix");
        if !fields.get("name").is_some_and(Value::is_string) {
          let name = prefix.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
          fields.insert("name".to_string(), Value::String(name));
        }
      }
      let spec: EnvironmentSpec = serde_json::from_value(export)?;
      ctx.log().info(format!(
        "exported {} dependencies of {}",
        spec.dependencies.len(),
        prefix.display()
      ));
      Ok(spec)
    })
    .await
}

/// Packs the environment at `prefix` into a relocatable archive.
pub async fn generate_conda_pack(
  prefix: &Path,
  output_filename: &Path,
  tools: &CondaTools,
) -> Result<ActionReport<PathBuf>, ActionError> {
  Action::new("generate_conda_pack")
    .run(async |ctx: &ExecutionContext| {
      ensure_prefix(prefix)?;
      if let Some(parent) = output_filename.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
      }

      let prefix_arg = prefix.to_string_lossy();
      let output_arg = output_filename.to_string_lossy();
      ctx.log().info(format!("packing {} into {}", prefix.display(), output_filename.display()));
      ctx
        .run(CondaTools::command(
          &tools.conda_pack,
          &["--prefix", &*prefix_arg, "--output", &*output_arg, "--ignore-missing-files"],
        ))
        .await?;

      // The archive must exist after a clean exit.
      tokio::fs::metadata(output_filename).await?;
      Ok(output_filename.to_path_buf())
    })
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conda::Dependency;
  use crate::util::testutil::make_prefix;
  use tempfile::TempDir;

  #[cfg(unix)]
  #[tokio::test]
  async fn export_parses_conda_json() {
    use crate::util::testutil::fake_tool;

    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "test-prefix");
    let conda = fake_tool(
      temp.path(),
      "conda",
      r#"echo 'collecting package metadata' 1>&2
cat <<'JSON'
{"name": null, "channels": ["conda-forge"], "dependencies": ["zlib=1.2.13=hd590300_5", {"pip": ["flask==3.0.0"]}], "prefix": "/tmp/test-prefix"}
JSON"#,
    );

    let report = generate_conda_export(&prefix, &CondaTools::default().with_conda(conda))
      .await
      .unwrap();
    assert_eq!(report.stderr, "collecting package metadata\n");

    let spec = report.into_result().unwrap();
    assert_eq!(spec.name, "test-prefix");
    assert_eq!(spec.channels, vec!["conda-forge"]);
    assert_eq!(spec.conda_dependencies(), vec!["zlib=1.2.13=hd590300_5"]);
    assert_eq!(spec.pip_dependencies(), vec!["flask==3.0.0"]);
    assert!(matches!(spec.dependencies[1], Dependency::Pip { .. }));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn export_rejects_non_json_output() {
    use crate::util::testutil::fake_tool;

    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");
    let conda = fake_tool(temp.path(), "conda", "echo 'name: env'");

    let report = generate_conda_export(&prefix, &CondaTools::default().with_conda(conda))
      .await
      .unwrap();
    assert!(matches!(report.result, Err(ActionError::Json(_))));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn pack_writes_archive() {
    use crate::util::testutil::fake_tool;

    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");
    let conda_pack = fake_tool(temp.path(), "conda-pack", "test -d \"$2/conda-meta\"\nprintf packed > \"$4\"");
    let output = temp.path().join("artifacts").join("environment.tar.gz");

    let report = generate_conda_pack(&prefix, &output, &CondaTools::default().with_conda_pack(conda_pack))
      .await
      .unwrap();
    assert_eq!(report.into_result().unwrap(), output);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "packed");
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn pack_without_archive_fails() {
    use crate::util::testutil::fake_tool;

    let temp = TempDir::new().unwrap();
    let prefix = make_prefix(temp.path(), "env");
    let conda_pack = fake_tool(temp.path(), "conda-pack", "true");
    let output = temp.path().join("environment.tar.gz");

    let report = generate_conda_pack(&prefix, &output, &CondaTools::default().with_conda_pack(conda_pack))
      .await
      .unwrap();
    assert!(matches!(&report.result, Err(ActionError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound));
  }

  #[tokio::test]
  async fn export_requires_prefix() {
    let temp = TempDir::new().unwrap();
    let report = generate_conda_export(temp.path(), &CondaTools::default()).await.unwrap();
    assert!(matches!(report.result, Err(ActionError::InvalidPrefix(_))));
  }
}
