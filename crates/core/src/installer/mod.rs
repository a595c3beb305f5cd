//! Installers and the generic routines they share.
//!
//! Every tool is provisioned by an [`Installer`]. Tool-specific knowledge
//! (download URLs, archive layout, self-test arguments) lives in the
//! implementations; presence checks, downloads, extraction, validation and
//! linking are shared routines in this module and in [`crate::presence`].

mod catalog;
mod composite;
mod plugin;
mod registry;

pub use catalog::{Artifact, CatalogTool, UrlVars, VersionSource};
pub use composite::{CompositeInstaller, VariantInstaller};
pub use plugin::PluginInstaller;
pub use registry::{DEFAULT_TOOLS, DefaultVersions, InstallerRegistry};

use crate::error::{Error, Result};
use crate::fetch::{ExtractOutcome, Fetcher};
use crate::platform::EnvironmentFacts;
use crate::process::ToolEnv;
use crate::release::ReleaseResolver;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Result of provisioning one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallOutcome {
    /// Whether a binary or link was created during this run.
    pub changed: bool,
}

impl InstallOutcome {
    /// Something was created.
    pub const CHANGED: Self = Self { changed: true };
    /// The tool was already satisfied.
    pub const UNCHANGED: Self = Self { changed: false };

    /// Combine with the outcome of another step.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            changed: self.changed || other.changed,
        }
    }
}

impl From<bool> for InstallOutcome {
    fn from(changed: bool) -> Self {
        Self { changed }
    }
}

/// Everything an installer may use during one run.
#[derive(Debug, Clone)]
pub struct InstallContext {
    /// Absolute bin directory.
    pub dest: PathBuf,
    /// Host platform.
    pub facts: EnvironmentFacts,
    /// PATH used for lookups and subprocesses.
    pub env: ToolEnv,
    /// Artifact downloads.
    pub fetcher: Fetcher,
    /// Latest-release lookups.
    pub releases: ReleaseResolver,
    /// Fires when the run is abandoned.
    pub cancel: CancellationToken,
}

impl InstallContext {
    /// Path of `name` inside the bin directory.
    #[must_use]
    pub fn bin_path(&self, name: &str) -> PathBuf {
        self.dest.join(name)
    }
}

/// Provisions one named tool into the bin directory.
///
/// Implementations must be idempotent: a second call against an unchanged
/// bin directory reports [`InstallOutcome::UNCHANGED`].
#[async_trait]
pub trait Installer: Send + Sync {
    /// Name the installer is registered under.
    fn name(&self) -> &'static str;

    /// Key serialising this installer against others.
    ///
    /// Installers that drive another tool share that tool's key.
    fn lock_key(&self) -> &'static str {
        self.name()
    }

    /// Install or link the tool.
    ///
    /// `version` is the explicit or default version; tools that track a
    /// minimum version treat it as such.
    async fn install(&self, ctx: &InstallContext, version: Option<&str>) -> Result<InstallOutcome>;
}

/// Download `url` to `bin/<name>` and self-test it.
///
/// An existing `bin/<name>` is left alone and reported unchanged.
pub async fn install_binary(
    ctx: &InstallContext,
    name: &str,
    url: &str,
    test_args: &[&str],
) -> Result<InstallOutcome> {
    let dest = ctx.bin_path(name);
    if crate::presence::file_exists(&dest).await? {
        debug!(tool = name, path = %dest.display(), "Binary already exists");
        return Ok(InstallOutcome::UNCHANGED);
    }

    info!(tool = name, %url, "Downloading");
    ctx.fetcher.fetch_binary(url, &dest, name, &ctx.cancel).await?;
    self_test(ctx, name, &dest, test_args).await?;
    Ok(InstallOutcome::CHANGED)
}

/// Extract `member` from the archive at `url` to `bin/<name>` and self-test it.
pub async fn install_from_archive(
    ctx: &InstallContext,
    name: &str,
    url: &str,
    member: &str,
    test_args: &[&str],
) -> Result<InstallOutcome> {
    let dest = ctx.bin_path(name);

    info!(tool = name, %url, member, "Downloading archive");
    match ctx
        .fetcher
        .fetch_archive_member(url, member, &dest, &ctx.cancel)
        .await?
    {
        ExtractOutcome::Extracted { bytes } => {
            trace!(tool = name, bytes, "Extracted");
        }
        ExtractOutcome::MemberMissing => {
            return Err(Error::MemberNotFound {
                member: member.to_string(),
                url: url.to_string(),
            });
        }
    }

    self_test(ctx, name, &dest, test_args).await?;
    Ok(InstallOutcome::CHANGED)
}

/// Run a freshly installed binary and require a zero exit status.
pub async fn self_test(
    ctx: &InstallContext,
    name: &str,
    path: &Path,
    test_args: &[&str],
) -> Result<()> {
    trace!(tool = name, "Testing installed binary");

    let failure = |stderr: String| Error::Validation {
        tool: name.to_string(),
        path: path.to_path_buf(),
        stderr,
    };

    let output = match ctx.env.output(path, test_args, &ctx.cancel).await {
        Ok(output) => output,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => return Err(failure(e.to_string())),
    };

    if !output.status.success() {
        return Err(failure(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    debug!(
        tool = name,
        path = %path.display(),
        output = %String::from_utf8_lossy(&output.stdout).trim(),
        "Validation successful"
    );
    Ok(())
}
