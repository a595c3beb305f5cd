//! Installer registry and default version table.
//!
//! Both are built once, before any installer runs, and passed to the
//! provisioner. Nothing mutates them afterwards.

use super::catalog::{
    ARGOCD, GH, GITU, GLAB, HELM, IBMCLOUD, IGC, JQ, KUBECTL, KUBESEAL, KUSTOMIZE, OC,
    OPENSHIFT_INSTALL, OPERATOR_SDK, ROSA,
};
use super::{CompositeInstaller, Installer, PluginInstaller, VariantInstaller};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Tools provisioned on every run.
pub const DEFAULT_TOOLS: [&str; 5] = ["yq", "jq", "igc", "kubeseal", "oc"];

/// Registry of installers by tool name.
#[derive(Default)]
pub struct InstallerRegistry {
    installers: HashMap<&'static str, Arc<dyn Installer>>,
    /// Names installed as part of another tool.
    provided: HashMap<&'static str, &'static str>,
}

impl InstallerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The full tool catalogue.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();

        for tool in [
            JQ,
            IGC,
            HELM,
            ARGOCD,
            ROSA,
            KUBESEAL,
            KUSTOMIZE,
            GITU,
            GH,
            GLAB,
            OPENSHIFT_INSTALL,
            OPERATOR_SDK,
        ] {
            registry.register(tool);
        }

        let yq_parts: Vec<Arc<dyn Installer>> = vec![
            Arc::new(VariantInstaller::yq3()?),
            Arc::new(VariantInstaller::yq4()?),
        ];
        registry.register(CompositeInstaller::new("yq", yq_parts));

        let oc_parts: Vec<Arc<dyn Installer>> = vec![Arc::new(OC), Arc::new(KUBECTL)];
        registry.register(CompositeInstaller::new("oc", oc_parts));
        registry.register_provided("kubectl", "oc");

        let ibmcloud: Arc<dyn Installer> = Arc::new(IBMCLOUD);
        registry.register_arc(Arc::clone(&ibmcloud));
        for (name, plugin) in [
            ("ibmcloud-is", "infrastructure-service"),
            ("ibmcloud-ob", "observe-service"),
            ("ibmcloud-ks", "kubernetes-service"),
            ("ibmcloud-cr", "container-registry"),
        ] {
            registry.register(PluginInstaller::new(name, plugin, Arc::clone(&ibmcloud)));
        }

        Ok(registry)
    }

    /// Register an installer, replacing any with the same name.
    pub fn register<I: Installer + 'static>(&mut self, installer: I) {
        self.register_arc(Arc::new(installer));
    }

    /// Register a shared installer.
    pub fn register_arc(&mut self, installer: Arc<dyn Installer>) {
        self.installers.insert(installer.name(), installer);
    }

    /// Accept `name` in requests as a tool installed by `provider`.
    pub fn register_provided(&mut self, name: &'static str, provider: &'static str) {
        self.provided.insert(name, provider);
    }

    /// Installer for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Installer>> {
        self.installers.get(name)
    }

    /// The tool that installs `name`, when `name` has no installer of its own.
    #[must_use]
    pub fn provided_by(&self, name: &str) -> Option<&'static str> {
        self.provided.get(name).copied()
    }

    /// `(name, provider)` pairs registered with [`Self::register_provided`], sorted.
    #[must_use]
    pub fn provided(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs: Vec<_> = self.provided.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        pairs
    }

    /// Whether `name` can appear in a request.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        self.installers.contains_key(name) || self.provided.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.installers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered installers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.installers.len()
    }

    /// Whether no installer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installers.is_empty()
    }
}

impl std::fmt::Debug for InstallerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallerRegistry")
            .field("installers", &self.names())
            .field("provided", &self.provided)
            .finish()
    }
}

/// Version used when a request names no version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultVersions {
    versions: HashMap<String, String>,
}

impl DefaultVersions {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in minimum versions.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with("jq", "1.7.1")
            .with("igc", "1.50.2")
            .with("gitu", "1.15.0")
    }

    /// Set the default for `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(name.into(), version.into());
        self
    }

    /// Default version of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.versions.get(name).map(String::as_str)
    }

    /// All entries, sorted by tool name.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .versions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}
