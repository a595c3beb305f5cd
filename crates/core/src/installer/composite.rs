//! Installers made of other installers.

use super::{InstallContext, InstallOutcome, Installer, install_binary};
use crate::error::{Error, Result};
use crate::platform::{ArchNames, OsNames};
use crate::presence::{create_symlink, find_variant};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Runs its parts in order; changed if any part changed.
pub struct CompositeInstaller {
    name: &'static str,
    parts: Vec<Arc<dyn Installer>>,
}

impl CompositeInstaller {
    /// Create a composite from its parts.
    #[must_use]
    pub fn new(name: &'static str, parts: Vec<Arc<dyn Installer>>) -> Self {
        Self { name, parts }
    }

    /// Names of the parts, in installation order.
    #[must_use]
    pub fn part_names(&self) -> Vec<&'static str> {
        self.parts.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for CompositeInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeInstaller")
            .field("name", &self.name)
            .field("parts", &self.part_names())
            .finish()
    }
}

#[async_trait]
impl Installer for CompositeInstaller {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn install(&self, ctx: &InstallContext, _version: Option<&str>) -> Result<InstallOutcome> {
        let mut outcome = InstallOutcome::UNCHANGED;
        for part in &self.parts {
            debug!(tool = self.name, part = part.name(), "Installing part");
            outcome = outcome.merge(part.install(ctx, None).await?);
        }
        Ok(outcome)
    }
}

/// One major version of a tool whose versions are installed side by side
/// under distinct aliases (`yq3`, `yq4`).
///
/// A system binary already reporting a matching version is linked under the
/// alias; otherwise the pinned release is downloaded.
#[derive(Debug, Clone)]
pub struct VariantInstaller {
    alias: &'static str,
    base: &'static str,
    requirement: semver::VersionReq,
    url: fn(&str, &str, &str) -> String,
    os: OsNames,
    arch: ArchNames,
}

impl VariantInstaller {
    /// Create a variant. `url` receives the release site, OS and architecture tokens.
    pub fn new(
        alias: &'static str,
        base: &'static str,
        requirement: &str,
        url: fn(&str, &str, &str) -> String,
        os: OsNames,
        arch: ArchNames,
    ) -> Result<Self> {
        let requirement = semver::VersionReq::parse(requirement)
            .map_err(|e| Error::config(format!("invalid version requirement for {alias}: {e}")))?;
        Ok(Self {
            alias,
            base,
            requirement,
            url,
            os,
            arch,
        })
    }

    /// yq 3.x as `yq3`.
    pub fn yq3() -> Result<Self> {
        Self::new(
            "yq3",
            "yq",
            "^3",
            |site, os, arch| format!("{site}/mikefarah/yq/releases/download/3.4.1/yq_{os}_{arch}"),
            OsNames::GO,
            ArchNames::GO,
        )
    }

    /// yq 4.x as `yq4`.
    pub fn yq4() -> Result<Self> {
        Self::new(
            "yq4",
            "yq",
            "^4",
            |site, os, arch| format!("{site}/mikefarah/yq/releases/download/v4.25.2/yq_{os}_{arch}"),
            OsNames::GO,
            ArchNames::GO,
        )
    }

    /// The version requirement the system binary must meet.
    #[must_use]
    pub fn requirement(&self) -> &semver::VersionReq {
        &self.requirement
    }
}

#[async_trait]
impl Installer for VariantInstaller {
    fn name(&self) -> &'static str {
        self.alias
    }

    async fn install(&self, ctx: &InstallContext, _version: Option<&str>) -> Result<InstallOutcome> {
        let candidates = [self.base, self.alias];
        if let Some(found) =
            find_variant(&ctx.env, &candidates, &self.requirement, &ctx.cancel).await?
        {
            let changed = create_symlink(&ctx.env, &found, &ctx.bin_path(self.alias)).await?;
            return Ok(changed.into());
        }

        let url = (self.url)(
            ctx.releases.site_url(),
            ctx.facts.os_token(&self.os),
            ctx.facts.arch_token(&self.arch),
        );
        install_binary(ctx, self.alias, &url, &["--version"]).await
    }
}
