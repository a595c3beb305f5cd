//! Provisioning runs: request normalisation, fan-out and result collection.

use crate::config::ProvisionConfig;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, http_client};
use crate::installer::{DefaultVersions, InstallContext, InstallOutcome, InstallerRegistry};
use crate::lock::KeyedLocks;
use crate::platform::EnvironmentFacts;
use crate::process::ToolEnv;
use crate::release::ReleaseResolver;
use crate::request::ToolRequest;
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

/// Input of a provisioning run.
#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    /// Requested tools; defaults are added.
    pub tools: Vec<String>,
    /// Destination directory. Relative paths resolve against `cwd`.
    pub bin_dir: PathBuf,
    /// Search path appended after the bin directory. `None` uses the
    /// process `PATH`.
    pub base_path: Option<OsString>,
    /// Working directory. `None` uses the process working directory.
    pub cwd: Option<PathBuf>,
}

impl ProvisionRequest {
    /// Request `tools` into `bin_dir`.
    #[must_use]
    pub fn new<I, S>(tools: I, bin_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            bin_dir: bin_dir.into(),
            base_path: None,
            cwd: None,
        }
    }

    /// Use `path` instead of the process `PATH`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<OsString>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Resolve relative paths against `cwd`.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Result for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    /// Tool as requested.
    pub name: String,
    /// Whether anything was created for it.
    pub changed: bool,
}

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// Deduplicated tool list, defaults first.
    pub tools: Vec<String>,
    /// Absolute bin directory.
    pub bin_dir: PathBuf,
    /// One entry per tool, in `tools` order.
    pub outcomes: Vec<ToolOutcome>,
    /// Search path with the bin directory first.
    pub path: String,
}

impl ProvisionReport {
    /// Identifier of the tool set: `clis:` followed by the tools joined with `:`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("clis:{}", self.tools.join(":"))
    }

    /// Tools changed by this run.
    #[must_use]
    pub fn changed_tools(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.changed)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Drives installers for a list of tools.
#[derive(Debug, Clone)]
pub struct Provisioner {
    registry: Arc<InstallerRegistry>,
    versions: Arc<DefaultVersions>,
    default_tools: Vec<String>,
    locks: Arc<KeyedLocks>,
    concurrency: usize,
    facts: EnvironmentFacts,
    fetcher: Fetcher,
    releases: ReleaseResolver,
}

impl Provisioner {
    /// Create a provisioner. Defaults: no default tools, no default versions,
    /// concurrency 4.
    #[must_use]
    pub fn new(
        registry: InstallerRegistry,
        facts: EnvironmentFacts,
        fetcher: Fetcher,
        releases: ReleaseResolver,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            versions: Arc::new(DefaultVersions::new()),
            default_tools: Vec::new(),
            locks: Arc::new(KeyedLocks::new()),
            concurrency: 4,
            facts,
            fetcher,
            releases,
        }
    }

    /// A provisioner for the full catalogue, configured from `config`.
    pub fn from_config(config: &ProvisionConfig, facts: EnvironmentFacts) -> Result<Self> {
        config.validate()?;
        let timeout = config.http_timeout();
        let fetcher = Fetcher::new(http_client(timeout, &config.user_agent, true)?);
        let releases =
            ReleaseResolver::build(timeout, &config.user_agent, config.release_strategy)?
                .with_site_url(config.github_url.as_str())
                .with_api_url(config.github_api_url.as_str());

        Ok(
            Self::new(InstallerRegistry::with_defaults()?, facts, fetcher, releases)
                .with_default_versions(DefaultVersions::builtin())
                .with_default_tools(config.default_tools.clone())
                .with_concurrency(config.concurrency),
        )
    }

    /// Versions used for requests without one.
    #[must_use]
    pub fn with_default_versions(mut self, versions: DefaultVersions) -> Self {
        self.versions = Arc::new(versions);
        self
    }

    /// Tools added to every request.
    #[must_use]
    pub fn with_default_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum tools installed at once; at least one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The registry in use.
    #[must_use]
    pub fn registry(&self) -> &InstallerRegistry {
        &self.registry
    }

    /// The default versions in use.
    #[must_use]
    pub fn default_versions(&self) -> &DefaultVersions {
        &self.versions
    }

    /// Defaults followed by `requested`, each name once, first occurrence kept.
    #[must_use]
    pub fn merge_tools(&self, requested: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.default_tools
            .iter()
            .chain(requested)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_string()))
            .map(ToString::to_string)
            .collect()
    }

    /// Provision every requested tool into the bin directory.
    ///
    /// Unknown tools fail the run before anything is written. The first tool
    /// to fail cancels the others and its error is returned; tools finished
    /// before it are kept.
    #[tracing::instrument(
        name = "provision",
        skip(self, request, cancel),
        fields(bin_dir = %request.bin_dir.display())
    )]
    pub async fn provision(
        &self,
        request: ProvisionRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionReport> {
        let cwd = match request.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir()?,
        };
        let dest = if request.bin_dir.as_os_str().is_empty() {
            cwd.join(crate::config::DEFAULT_BIN_DIR)
        } else {
            cwd.join(&request.bin_dir)
        };

        let tools = self.merge_tools(&request.tools);
        let parsed = tools
            .iter()
            .map(|raw| {
                let parsed = ToolRequest::parse(raw)?;
                if self.registry.accepts(&parsed.name) {
                    Ok(parsed)
                } else {
                    Err(Error::NoInstaller { name: parsed.name })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let env = match &request.base_path {
            Some(base) => ToolEnv::with_bin_dir(&dest, Some(base.as_os_str()), &cwd)?,
            None => {
                let inherited = std::env::var_os("PATH");
                ToolEnv::with_bin_dir(&dest, inherited.as_deref(), &cwd)?
            }
        };

        info!(tools = %tools.join(","), dest = %dest.display(), "Processing clis");

        let run = cancel.child_token();
        let ctx = Arc::new(InstallContext {
            dest: dest.clone(),
            facts: self.facts.clone(),
            env: env.clone(),
            fetcher: self.fetcher.clone(),
            releases: self.releases.clone(),
            cancel: run.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, tool) in parsed.into_iter().enumerate() {
            let ctx = Arc::clone(&ctx);
            let registry = Arc::clone(&self.registry);
            let locks = Arc::clone(&self.locks);
            let semaphore = Arc::clone(&semaphore);
            let version = tool
                .version
                .clone()
                .or_else(|| self.versions.get(&tool.name).map(ToString::to_string));
            let span = info_span!("install", tool = %tool);

            join_set.spawn(
                async move {
                    let slots = Slots {
                        locks: &locks,
                        semaphore: &semaphore,
                    };
                    let outcome =
                        provision_one(&ctx, &registry, slots, &tool, version.as_deref()).await;
                    (index, tool, outcome)
                }
                .instrument(span),
            );
        }

        let mut outcomes: Vec<Option<ToolOutcome>> = vec![None; tools.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, tool, outcome) = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => return Err(Error::Cancelled),
            };

            match outcome {
                Ok(outcome) => {
                    debug!(tool = %tool, changed = outcome.changed, "Provisioned");
                    outcomes[index] = Some(ToolOutcome {
                        name: tools[index].clone(),
                        changed: outcome.changed,
                    });
                }
                Err(e) => {
                    run.cancel();
                    join_set.abort_all();
                    if e.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    return Err(Error::install(tool.to_string(), e));
                }
            }
        }

        Ok(ProvisionReport {
            tools,
            bin_dir: dest,
            outcomes: outcomes.into_iter().flatten().collect(),
            path: env.path().to_string_lossy().into_owned(),
        })
    }
}

/// What an install waits for: its key lock, then a concurrency slot.
#[derive(Clone, Copy)]
struct Slots<'a> {
    locks: &'a KeyedLocks,
    semaphore: &'a Semaphore,
}

async fn provision_one(
    ctx: &InstallContext,
    registry: &InstallerRegistry,
    slots: Slots<'_>,
    tool: &ToolRequest,
    version: Option<&str>,
) -> Result<InstallOutcome> {
    if let Some(provider) = registry.provided_by(&tool.name) {
        debug!(tool = %tool.name, provider, "Installed as part of another tool");
        return Ok(InstallOutcome::UNCHANGED);
    }

    let installer = registry.get(&tool.name).ok_or_else(|| Error::NoInstaller {
        name: tool.name.clone(),
    })?;

    let _guard = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(Error::Cancelled),
        guard = slots.locks.acquire(installer.lock_key()) => guard,
    };
    // Key first, then a slot: a task waiting on a shared key holds no slot.
    let _permit = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(Error::Cancelled),
        permit = slots.semaphore.acquire() => permit.map_err(|_| Error::Cancelled)?,
    };

    tokio::fs::create_dir_all(&ctx.dest).await?;
    installer.install(ctx, version).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::Installer;
    use crate::release::ReleaseStrategy;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn provisioner() -> Provisioner {
        Provisioner::new(
            InstallerRegistry::with_defaults().unwrap(),
            EnvironmentFacts::new("x86_64", "linux", false),
            Fetcher::new(Client::new()),
            ReleaseResolver::new(Client::new(), ReleaseStrategy::Redirect),
        )
        .with_default_tools(crate::installer::DEFAULT_TOOLS)
    }

    /// Waits for `gate` before reporting a change; shares `key` with others.
    struct Gated {
        name: &'static str,
        key: &'static str,
        gate: Option<Arc<Notify>>,
        opens: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Installer for Gated {
        fn name(&self) -> &'static str {
            self.name
        }

        fn lock_key(&self) -> &'static str {
            self.key
        }

        async fn install(
            &self,
            _ctx: &InstallContext,
            _version: Option<&str>,
        ) -> Result<InstallOutcome> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(opens) = &self.opens {
                opens.notify_one();
            }
            Ok(InstallOutcome::CHANGED)
        }
    }

    #[tokio::test]
    async fn test_tasks_waiting_on_a_key_hold_no_slot() {
        let gate = Arc::new(Notify::new());
        let mut registry = InstallerRegistry::new();
        registry.register(Gated {
            name: "plugin-a",
            key: "shared",
            gate: Some(Arc::clone(&gate)),
            opens: None,
        });
        registry.register(Gated {
            name: "plugin-b",
            key: "shared",
            gate: None,
            opens: None,
        });
        registry.register(Gated {
            name: "other",
            key: "other",
            gate: None,
            opens: Some(gate),
        });

        let work = tempfile::TempDir::new().unwrap();
        let provisioner = Provisioner::new(
            registry,
            EnvironmentFacts::new("x86_64", "linux", false),
            Fetcher::new(Client::new()),
            ReleaseResolver::new(Client::new(), ReleaseStrategy::Redirect),
        )
        .with_concurrency(2);
        let request = ProvisionRequest::new(["plugin-a", "plugin-b", "other"], "bin")
            .with_base_path("")
            .with_cwd(work.path());

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            provisioner.provision(request, &CancellationToken::new()),
        )
        .await
        .expect("provisioning stalled")
        .unwrap();

        assert_eq!(report.changed_tools(), vec!["plugin-a", "plugin-b", "other"]);
    }

    #[test]
    fn test_merge_adds_defaults_once() {
        let p = provisioner();
        let merged = p.merge_tools(&["argocd".to_string()]);
        assert_eq!(merged, vec!["yq", "jq", "igc", "kubeseal", "oc", "argocd"]);

        let merged = p.merge_tools(&["jq".into(), "jq".into(), "argocd".into()]);
        assert_eq!(merged, vec!["yq", "jq", "igc", "kubeseal", "oc", "argocd"]);
    }

    #[test]
    fn test_merge_is_order_independent_as_a_set() {
        let p = provisioner();
        let a: HashSet<_> = p
            .merge_tools(&["helm".into(), "oc".into(), "gh".into()])
            .into_iter()
            .collect();
        let b: HashSet<_> = p
            .merge_tools(&["gh".into(), "helm".into(), "helm".into()])
            .into_iter()
            .collect();
        assert_eq!(a, b);
        let expected: HashSet<String> = ["yq", "jq", "igc", "kubeseal", "oc", "helm", "gh"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(a, expected);
    }

    #[test]
    fn test_report_id_and_changes() {
        let report = ProvisionReport {
            tools: vec!["yq".into(), "jq".into()],
            bin_dir: PathBuf::from("/tmp/bin"),
            outcomes: vec![
                ToolOutcome {
                    name: "yq".into(),
                    changed: false,
                },
                ToolOutcome {
                    name: "jq".into(),
                    changed: true,
                },
            ],
            path: "/tmp/bin".into(),
        };
        assert_eq!(report.id(), "clis:yq:jq");
        assert_eq!(report.changed_tools(), vec!["jq"]);
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        assert_eq!(provisioner().with_concurrency(0).concurrency, 1);
    }
}
