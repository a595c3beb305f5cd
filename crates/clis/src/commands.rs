//! Command implementations. Each returns the text written to stdout.

use clis_core::{
    DefaultVersions, EnvironmentFacts, InstallerRegistry, ProvisionConfig, ProvisionReport,
    ProvisionRequest, Provisioner,
};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Check { tools: Vec<String> },
    List,
}

/// Overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

/// Load the configuration for `cwd` and apply `overrides`.
pub fn load_config(overrides: &Overrides, cwd: &Path) -> Result<ProvisionConfig> {
    let mut config = ProvisionConfig::discover(overrides.config.as_deref(), cwd)?;
    if let Some(bin_dir) = &overrides.bin_dir {
        config.bin_dir = Some(bin_dir.clone());
    }
    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}

#[instrument(skip_all)]
pub async fn execute(
    command: Command,
    config: &ProvisionConfig,
    cwd: &Path,
    json: bool,
    cancel: &CancellationToken,
) -> Result<String> {
    match command {
        Command::Check { tools } => check(config, tools, cwd, json, cancel).await,
        Command::List => list(config, json),
    }
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    id: String,
    changed: Vec<&'a str>,
    #[serde(flatten)]
    report: &'a ProvisionReport,
}

async fn check(
    config: &ProvisionConfig,
    tools: Vec<String>,
    cwd: &Path,
    json: bool,
    cancel: &CancellationToken,
) -> Result<String> {
    let provisioner = Provisioner::from_config(config, EnvironmentFacts::detect())?;
    let requested: Vec<String> = config.tools.iter().cloned().chain(tools).collect();
    debug!(requested = ?requested, "Running check");

    let request = ProvisionRequest::new(requested, config.resolve_bin_dir(cwd)).with_cwd(cwd);
    let report = provisioner.provision(request, cancel).await?;

    if json {
        render_json(&report)
    } else {
        Ok(render_text(&report))
    }
}

fn render_json(report: &ProvisionReport) -> Result<String> {
    let output = CheckOutput {
        id: report.id(),
        changed: report.changed_tools(),
        report,
    };
    let mut text = serde_json::to_string_pretty(&output).into_diagnostic()?;
    text.push('\n');
    Ok(text)
}

pub fn render_text(report: &ProvisionReport) -> String {
    let width = report
        .outcomes
        .iter()
        .map(|o| o.name.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for outcome in &report.outcomes {
        let status = if outcome.changed { "changed" } else { "ok" };
        let _ = writeln!(out, "{:<width$}  {status}", outcome.name);
    }
    let _ = writeln!(out, "id: {}", report.id());
    let _ = writeln!(
        out,
        "export PATH=\"{}:$PATH\"",
        report.bin_dir.display()
    );
    out
}

#[derive(Serialize)]
struct ListOutput<'a> {
    tools: Vec<&'static str>,
    provided: BTreeMap<&'static str, &'static str>,
    defaults: &'a [String],
    default_versions: BTreeMap<&'a str, &'a str>,
}

fn list(config: &ProvisionConfig, json: bool) -> Result<String> {
    let registry = InstallerRegistry::with_defaults()?;
    let versions = DefaultVersions::builtin();
    let output = ListOutput {
        tools: registry.names(),
        provided: registry.provided().into_iter().collect(),
        defaults: &config.default_tools,
        default_versions: versions.entries().into_iter().collect(),
    };

    if json {
        let mut text = serde_json::to_string_pretty(&output).into_diagnostic()?;
        text.push('\n');
        return Ok(text);
    }

    let mut out = String::new();
    for name in &output.tools {
        let _ = writeln!(out, "{name}");
    }
    for (name, provider) in &output.provided {
        let _ = writeln!(out, "{name} (installed with {provider})");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "defaults: {}", output.defaults.join(" "));
    for (name, version) in &output.default_versions {
        let _ = writeln!(out, "default version: {name} {version}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clis_core::ToolOutcome;
    use tempfile::TempDir;

    fn report() -> ProvisionReport {
        ProvisionReport {
            tools: vec!["yq".into(), "kubeseal".into()],
            bin_dir: PathBuf::from("/work/bin"),
            outcomes: vec![
                ToolOutcome {
                    name: "yq".into(),
                    changed: false,
                },
                ToolOutcome {
                    name: "kubeseal".into(),
                    changed: true,
                },
            ],
            path: "/work/bin:/usr/bin".into(),
        }
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&report());
        assert_eq!(
            text,
            "yq        ok\nkubeseal  changed\nid: clis:yq:kubeseal\nexport PATH=\"/work/bin:$PATH\"\n"
        );
    }

    #[test]
    fn test_render_json() {
        let text = render_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["id"], "clis:yq:kubeseal");
        assert_eq!(value["changed"], serde_json::json!(["kubeseal"]));
        assert_eq!(value["bin_dir"], "/work/bin");
        assert_eq!(value["outcomes"][1]["changed"], true);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("clis.toml"),
            "bin_dir = \"from-file\"\nconcurrency = 2\n",
        )
        .unwrap();

        let config = load_config(&Overrides::default(), dir.path()).unwrap();
        assert_eq!(config.bin_dir, Some(PathBuf::from("from-file")));
        assert_eq!(config.concurrency, 2);

        let overrides = Overrides {
            bin_dir: Some(PathBuf::from("from-flag")),
            concurrency: Some(8),
            ..Overrides::default()
        };
        let config = load_config(&overrides, dir.path()).unwrap();
        assert_eq!(config.bin_dir, Some(PathBuf::from("from-flag")));
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_zero_concurrency_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            concurrency: Some(0),
            ..Overrides::default()
        };
        assert!(load_config(&overrides, dir.path()).is_err());
    }

    #[test]
    fn test_list_mentions_every_tool() {
        let text = list(&ProvisionConfig::default(), false).unwrap();
        assert!(text.lines().any(|l| l == "helm"));
        assert!(text.contains("kubectl (installed with oc)"));
        assert!(text.contains("defaults: yq jq igc kubeseal oc"));
        assert!(text.contains("default version: jq 1.7.1"));
    }
}
