//! Provisioning configuration.
//!
//! Loaded from an optional TOML file; every field has a default. Command-line
//! and environment overrides are applied by the caller on top of the loaded
//! value.

use crate::error::{Error, Result};
use crate::installer::DEFAULT_TOOLS;
use crate::release::{GITHUB_API_URL, GITHUB_URL, ReleaseStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "clis.toml";

/// Bin directory used when none is configured.
pub const DEFAULT_BIN_DIR: &str = "bin";

/// Settings for one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Destination directory; relative paths resolve against the working
    /// directory.
    pub bin_dir: Option<PathBuf>,
    /// Tools requested in addition to the defaults.
    pub tools: Vec<String>,
    /// Tools provisioned on every run.
    pub default_tools: Vec<String>,
    /// Maximum number of tools installed at once.
    pub concurrency: usize,
    /// Timeout applied to each HTTP request, in seconds.
    pub http_timeout_secs: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// How latest releases are resolved.
    pub release_strategy: ReleaseStrategy,
    /// Release site base URL.
    pub github_url: String,
    /// Release API base URL.
    pub github_api_url: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            bin_dir: None,
            tools: Vec::new(),
            default_tools: DEFAULT_TOOLS.iter().map(ToString::to_string).collect(),
            concurrency: 4,
            http_timeout_secs: 300,
            user_agent: format!("clis/{}", env!("CARGO_PKG_VERSION")),
            release_strategy: ReleaseStrategy::default(),
            github_url: GITHUB_URL.to_string(),
            github_api_url: GITHUB_API_URL.to_string(),
        }
    }
}

impl ProvisionConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config_file(format!("unable to read {}: {e}", path.display()), path)
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            Error::config_file(format!("invalid TOML in {}: {e}", path.display()), path)
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, else `clis.toml` in `cwd` if present, else defaults.
    pub fn discover(path: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let candidate = cwd.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::config("http_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// The bin directory as an absolute path. Empty or unset means `./bin`.
    #[must_use]
    pub fn resolve_bin_dir(&self, cwd: &Path) -> PathBuf {
        let dir = self
            .bin_dir
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new(DEFAULT_BIN_DIR));
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            cwd.join(dir)
        }
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
