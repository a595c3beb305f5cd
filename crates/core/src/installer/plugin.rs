//! Extensions installed through their primary tool.

use super::{InstallContext, InstallOutcome, Installer};
use crate::error::Result;
use crate::presence::{Capability, probe_capability};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// A plugin of a primary tool such as `ibmcloud`.
///
/// The primary is installed first; the plugin is then queried with the
/// primary's own `plugin show` command and installed with `plugin install`
/// when absent. Shares the primary's lock key.
pub struct PluginInstaller {
    name: &'static str,
    plugin: &'static str,
    primary: Arc<dyn Installer>,
}

impl PluginInstaller {
    /// Create a plugin installer.
    #[must_use]
    pub fn new(name: &'static str, plugin: &'static str, primary: Arc<dyn Installer>) -> Self {
        Self {
            name,
            plugin,
            primary,
        }
    }

    /// Plugin name as known to the primary tool.
    #[must_use]
    pub fn plugin(&self) -> &'static str {
        self.plugin
    }
}

impl std::fmt::Debug for PluginInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstaller")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .field("primary", &self.primary.name())
            .finish()
    }
}

#[async_trait]
impl Installer for PluginInstaller {
    fn name(&self) -> &'static str {
        self.name
    }

    fn lock_key(&self) -> &'static str {
        self.primary.lock_key()
    }

    async fn install(&self, ctx: &InstallContext, _version: Option<&str>) -> Result<InstallOutcome> {
        let primary_outcome = self.primary.install(ctx, None).await?;
        let primary = ctx.bin_path(self.primary.name());

        match probe_capability(&ctx.env, &primary, &["plugin", "show", self.plugin], &ctx.cancel)
            .await
        {
            Capability::Present => {
                debug!(plugin = self.plugin, "Plugin already installed");
                Ok(primary_outcome)
            }
            Capability::Absent => {
                info!(plugin = self.plugin, "Installing plugin");
                ctx.env
                    .run_checked(&primary, &["plugin", "install", self.plugin], &ctx.cancel)
                    .await?;
                Ok(InstallOutcome::CHANGED)
            }
            Capability::Indeterminate(e) => Err(e),
        }
    }
}
