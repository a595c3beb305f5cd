//! Table-driven installers for tools shipped as a single binary or as a
//! `.tar.gz` archive.

use super::{InstallContext, InstallOutcome, Installer, install_binary, install_from_archive};
use crate::error::Result;
use crate::platform::{ArchNames, EnvironmentFacts, OsNames};
use crate::presence::check_presence;
use crate::release::ReleaseInfo;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Download location of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// The URL serves the executable itself.
    Binary {
        /// Download URL.
        url: String,
    },
    /// The URL serves a `.tar.gz`; `member` is the executable's path inside it.
    Archive {
        /// Download URL.
        url: String,
        /// Exact in-archive path.
        member: String,
    },
}

/// Where the version embedded in a download URL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// Pinned in the URL template or taken from the request.
    Fixed,
    /// Latest release of `org/repo`.
    LatestRelease {
        /// Organisation or user.
        org: &'static str,
        /// Repository.
        repo: &'static str,
    },
    /// A plain-text document holding the current stable version.
    StableText {
        /// Document URL.
        url: &'static str,
    },
}

/// Inputs available to a URL template.
#[derive(Debug, Clone)]
pub struct UrlVars<'a> {
    /// Host platform.
    pub facts: &'a EnvironmentFacts,
    /// Release site base URL (no trailing slash).
    pub site: &'a str,
    /// Requested or default version.
    pub version: Option<&'a str>,
    /// Resolved release tag, for [`VersionSource::LatestRelease`] and
    /// [`VersionSource::StableText`] tools.
    pub release: Option<ReleaseInfo>,
}

impl UrlVars<'_> {
    /// OS token in `names`.
    #[must_use]
    pub fn os(&self, names: &OsNames) -> &'static str {
        self.facts.os_token(names)
    }

    /// Architecture token in `names`.
    #[must_use]
    pub fn arch(&self, names: &ArchNames) -> &'static str {
        self.facts.arch_token(names)
    }

    /// Resolved tag, or an empty string when nothing was resolved.
    #[must_use]
    pub fn tag(&self) -> &str {
        self.release.as_ref().map_or("", |r| r.tag_name.as_str())
    }

    /// Resolved tag without `v`.
    #[must_use]
    pub fn short_tag(&self) -> String {
        self.release
            .as_ref()
            .map(ReleaseInfo::short_version)
            .unwrap_or_default()
    }

    /// Download URL of a release asset on the release site.
    #[must_use]
    pub fn release_asset(&self, org: &str, repo: &str, tag: &str, asset: &str) -> String {
        format!("{}/{org}/{repo}/releases/download/{tag}/{asset}", self.site)
    }
}

/// A tool described entirely by data: where to download it and how to test it.
#[derive(Debug, Clone, Copy)]
pub struct CatalogTool {
    /// Executable name under the bin directory.
    pub name: &'static str,
    /// Arguments that make the tool exit zero when it works.
    pub test_args: &'static [&'static str],
    /// Where the URL's version comes from.
    pub source: VersionSource,
    /// URL template.
    pub artifact: fn(&UrlVars<'_>) -> Artifact,
    /// Command run once after a fresh install.
    pub post_install: &'static [&'static str],
}

#[async_trait]
impl Installer for CatalogTool {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn install(&self, ctx: &InstallContext, version: Option<&str>) -> Result<InstallOutcome> {
        let presence = check_presence(&ctx.env, &ctx.dest, self.name, version, &ctx.cancel).await?;
        if presence.is_satisfied() {
            return Ok(presence.changed().into());
        }

        let release = match self.source {
            VersionSource::Fixed => None,
            VersionSource::LatestRelease { org, repo } => {
                Some(ctx.releases.latest(org, repo, &ctx.cancel).await?)
            }
            VersionSource::StableText { url } => Some(ReleaseInfo {
                tag_name: ctx.fetcher.fetch_text(url, self.name, &ctx.cancel).await?,
            }),
        };

        let vars = UrlVars {
            facts: &ctx.facts,
            site: ctx.releases.site_url(),
            version,
            release,
        };

        let outcome = match (self.artifact)(&vars) {
            Artifact::Binary { url } => install_binary(ctx, self.name, &url, self.test_args).await?,
            Artifact::Archive { url, member } => {
                install_from_archive(ctx, self.name, &url, &member, self.test_args).await?
            }
        };

        if outcome.changed && !self.post_install.is_empty() {
            debug!(tool = self.name, args = ?self.post_install, "Running post-install command");
            ctx.env
                .run_checked(&ctx.bin_path(self.name), self.post_install, &ctx.cancel)
                .await?;
        }

        Ok(outcome)
    }
}

const fn direct(
    name: &'static str,
    test_args: &'static [&'static str],
    source: VersionSource,
    artifact: fn(&UrlVars<'_>) -> Artifact,
) -> CatalogTool {
    CatalogTool {
        name,
        test_args,
        source,
        artifact,
        post_install: &[],
    }
}

const fn release(org: &'static str, repo: &'static str) -> VersionSource {
    VersionSource::LatestRelease { org, repo }
}

fn binary(url: String) -> Artifact {
    Artifact::Binary { url }
}

fn archive(url: String, member: impl Into<String>) -> Artifact {
    Artifact::Archive {
        url,
        member: member.into(),
    }
}

/// jq, pinned to the requested version.
pub const JQ: CatalogTool = direct("jq", &["--version"], VersionSource::Fixed, |v| {
    let file = format!("jq-{}-{}", v.os(&OsNames::MACOS), v.arch(&ArchNames::GO));
    let tag = format!("jq-{}", v.version.unwrap_or_default());
    binary(v.release_asset("jqlang", "jq", &tag, &file))
});

/// IBM Garage cloud CLI.
pub const IGC: CatalogTool = direct(
    "igc",
    &["--version"],
    release("cloud-native-toolkit", "ibm-garage-cloud-cli"),
    |v| {
        let file = format!(
            "igc-{}-{}",
            v.os(&OsNames::MACOS_ALPINE),
            v.arch(&ArchNames::NODE)
        );
        binary(v.release_asset("cloud-native-toolkit", "ibm-garage-cloud-cli", v.tag(), &file))
    },
);

/// Git client for multiple hosting providers.
pub const GITU: CatalogTool = direct(
    "gitu",
    &["--version"],
    release("cloud-native-toolkit", "git-client"),
    |v| {
        let file = format!(
            "gitu-{}-{}",
            v.os(&OsNames::MACOS_ALPINE),
            v.arch(&ArchNames::NODE)
        );
        binary(v.release_asset("cloud-native-toolkit", "git-client", v.tag(), &file))
    },
);

/// Argo CD client.
pub const ARGOCD: CatalogTool = direct(
    "argocd",
    &["version", "--client"],
    release("argoproj", "argo-cd"),
    |v| {
        let file = format!("argocd-{}-{}", v.os(&OsNames::GO), v.arch(&ArchNames::GO));
        binary(v.release_asset("argoproj", "argo-cd", v.tag(), &file))
    },
);

/// Operator SDK.
pub const OPERATOR_SDK: CatalogTool = direct(
    "operator-sdk",
    &["version"],
    release("operator-framework", "operator-sdk"),
    |v| {
        let file = format!(
            "operator-sdk_{}_{}",
            v.os(&OsNames::GO),
            v.arch(&ArchNames::GO)
        );
        binary(v.release_asset("operator-framework", "operator-sdk", v.tag(), &file))
    },
);

/// Helm 3.
pub const HELM: CatalogTool = direct("helm", &["version"], VersionSource::Fixed, |v| {
    let platform = format!("{}-{}", v.os(&OsNames::GO), v.arch(&ArchNames::GO));
    archive(
        format!("https://get.helm.sh/helm-v3.8.2-{platform}.tar.gz"),
        format!("{platform}/helm"),
    )
});

/// Red Hat OpenShift Service on AWS CLI.
pub const ROSA: CatalogTool = direct("rosa", &["version"], VersionSource::Fixed, |v| {
    archive(
        format!(
            "https://mirror.openshift.com/pub/openshift-v4/{}/clients/rosa/latest/rosa-{}.tar.gz",
            v.arch(&ArchNames::GO),
            v.os(&OsNames::MACOSX)
        ),
        "rosa",
    )
});

/// Sealed Secrets client.
pub const KUBESEAL: CatalogTool = direct(
    "kubeseal",
    &["--version"],
    release("bitnami-labs", "sealed-secrets"),
    |v| {
        let file = format!(
            "kubeseal-{}-{}-{}.tar.gz",
            v.short_tag(),
            v.os(&OsNames::GO),
            v.arch(&ArchNames::GO)
        );
        archive(
            v.release_asset("bitnami-labs", "sealed-secrets", v.tag(), &file),
            "kubeseal",
        )
    },
);

/// Kustomize 4.
pub const KUSTOMIZE: CatalogTool = direct("kustomize", &["version"], VersionSource::Fixed, |v| {
    let file = format!(
        "kustomize_v4.5.4_{}_{}.tar.gz",
        v.os(&OsNames::GO),
        v.arch(&ArchNames::GO)
    );
    archive(
        v.release_asset("kubernetes-sigs", "kustomize", "kustomize%2Fv4.5.4", &file),
        "kustomize",
    )
});

/// GitHub CLI.
pub const GH: CatalogTool = direct("gh", &["--version"], release("cli", "cli"), |v| {
    let stem = format!(
        "gh_{}_{}_{}",
        v.short_tag(),
        v.os(&OsNames::MACOS_TITLE),
        v.arch(&ArchNames::GO)
    );
    archive(
        v.release_asset("cli", "cli", v.tag(), &format!("{stem}.tar.gz")),
        format!("{stem}/bin/gh"),
    )
});

/// GitLab CLI.
pub const GLAB: CatalogTool = direct("glab", &["--version"], release("profclems", "glab"), |v| {
    let stem = format!(
        "glab_{}_{}_{}",
        v.short_tag(),
        v.os(&OsNames::TITLE),
        v.arch(&ArchNames::UNAME)
    );
    archive(
        v.release_asset("profclems", "glab", v.tag(), &format!("{stem}.tar.gz")),
        "bin/glab",
    )
});

/// OpenShift installer; the version picks the mirror channel.
pub const OPENSHIFT_INSTALL: CatalogTool = direct(
    "openshift-install",
    &["version"],
    VersionSource::Fixed,
    |v| {
        archive(
            format!(
                "https://mirror.openshift.com/pub/openshift-v4/{}/clients/ocp/{}/openshift-install-{}.tar.gz",
                v.arch(&ArchNames::GO),
                openshift_channel(v.version),
                v.os(&OsNames::MAC)
            ),
            "openshift-install",
        )
    },
);

/// OpenShift client.
pub const OC: CatalogTool = direct("oc", &["version", "--client"], VersionSource::Fixed, |v| {
    archive(
        format!(
            "https://mirror.openshift.com/pub/openshift-v4/{}/clients/ocp/stable/openshift-client-{}.tar.gz",
            v.arch(&ArchNames::GO),
            v.os(&OsNames::MAC)
        ),
        "oc",
    )
});

/// Kubernetes client at the current stable release.
pub const KUBECTL: CatalogTool = direct(
    "kubectl",
    &["version", "--client"],
    VersionSource::StableText {
        url: "https://dl.k8s.io/release/stable.txt",
    },
    |v| {
        binary(format!(
            "https://dl.k8s.io/release/{}/bin/{}/{}/kubectl",
            v.tag(),
            v.os(&OsNames::GO),
            v.arch(&ArchNames::GO)
        ))
    },
);

/// IBM Cloud CLI. Version checks are switched off after installation.
pub const IBMCLOUD: CatalogTool = CatalogTool {
    name: "ibmcloud",
    test_args: &["version"],
    source: release("IBM-Cloud", "ibm-cloud-cli-release"),
    artifact: |v| {
        let platform = match (v.facts.is_macos(), v.facts.is_arm()) {
            (true, true) => "macos_arm64",
            (true, false) => "macos",
            (false, true) => "linux_arm64",
            (false, false) => "linux_amd64",
        };
        let version = v.short_tag();
        archive(
            format!(
                "https://download.clis.cloud.ibm.com/ibm-cloud-cli/{version}/binaries/IBM_Cloud_CLI_{version}_{platform}.tgz"
            ),
            "IBM_Cloud_CLI/ibmcloud",
        )
    },
    post_install: &["config", "--check-version=false"],
};

static FULL_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]\.[0-9]+\.[0-9]+")
        .unwrap_or_else(|e| unreachable!("full version pattern is valid: {e}"))
});

/// Mirror channel for an OpenShift version hint: `stable` for none or `4`,
/// the exact release for `x.y.z`, `stable-x.y` otherwise.
#[must_use]
pub fn openshift_channel(version: Option<&str>) -> String {
    match version {
        None | Some("" | "4") => "stable".to_string(),
        Some(v) if FULL_VERSION_RE.is_match(v) => v.to_string(),
        Some(v) => format!("stable-{v}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(facts: &'a EnvironmentFacts, tag: Option<&str>) -> UrlVars<'a> {
        UrlVars {
            facts,
            site: "https://github.com",
            version: None,
            release: tag.map(|t| ReleaseInfo {
                tag_name: t.to_string(),
            }),
        }
    }

    fn url_of(artifact: Artifact) -> String {
        match artifact {
            Artifact::Binary { url } | Artifact::Archive { url, .. } => url,
        }
    }

    #[test]
    fn test_jq_url() {
        let facts = EnvironmentFacts::new("aarch64", "macos", false);
        let mut v = vars(&facts, None);
        v.version = Some("1.7.1");
        assert_eq!(
            (JQ.artifact)(&v),
            Artifact::Binary {
                url: "https://github.com/jqlang/jq/releases/download/jq-1.7.1/jq-macos-arm64"
                    .to_string()
            }
        );
    }

    #[test]
    fn test_igc_on_alpine() {
        let facts = EnvironmentFacts::new("x86_64", "linux", true);
        let v = vars(&facts, Some("1.50.2"));
        assert_eq!(
            url_of((IGC.artifact)(&v)),
            "https://github.com/cloud-native-toolkit/ibm-garage-cloud-cli/releases/download/1.50.2/igc-alpine-x64"
        );
    }

    #[test]
    fn test_helm_member() {
        let facts = EnvironmentFacts::new("x86_64", "linux", false);
        assert_eq!(
            (HELM.artifact)(&vars(&facts, None)),
            Artifact::Archive {
                url: "https://get.helm.sh/helm-v3.8.2-linux-amd64.tar.gz".to_string(),
                member: "linux-amd64/helm".to_string(),
            }
        );
    }

    #[test]
    fn test_kubeseal_strips_v() {
        let facts = EnvironmentFacts::new("x86_64", "linux", false);
        assert_eq!(
            url_of((KUBESEAL.artifact)(&vars(&facts, Some("v0.26.2")))),
            "https://github.com/bitnami-labs/sealed-secrets/releases/download/v0.26.2/kubeseal-0.26.2-linux-amd64.tar.gz"
        );
    }

    #[test]
    fn test_gh_member_uses_stem() {
        let facts = EnvironmentFacts::new("arm64", "darwin", false);
        assert_eq!(
            (GH.artifact)(&vars(&facts, Some("v2.40.0"))),
            Artifact::Archive {
                url: "https://github.com/cli/cli/releases/download/v2.40.0/gh_2.40.0_macOS_arm64.tar.gz"
                    .to_string(),
                member: "gh_2.40.0_macOS_arm64/bin/gh".to_string(),
            }
        );
    }

    #[test]
    fn test_glab_vocabulary() {
        let facts = EnvironmentFacts::new("x86_64", "linux", false);
        assert_eq!(
            url_of((GLAB.artifact)(&vars(&facts, Some("v1.22.0")))),
            "https://github.com/profclems/glab/releases/download/v1.22.0/glab_1.22.0_Linux_x86_64.tar.gz"
        );
    }

    #[test]
    fn test_ibmcloud_platforms() {
        let mac_arm = EnvironmentFacts::new("arm64", "darwin", false);
        assert_eq!(
            url_of((IBMCLOUD.artifact)(&vars(&mac_arm, Some("v2.20.0")))),
            "https://download.clis.cloud.ibm.com/ibm-cloud-cli/2.20.0/binaries/IBM_Cloud_CLI_2.20.0_macos_arm64.tgz"
        );
        assert_eq!(IBMCLOUD.post_install, &["config", "--check-version=false"]);
    }

    #[test]
    fn test_kubectl_url_uses_stable_version() {
        let facts = EnvironmentFacts::new("x86_64", "linux", false);
        assert_eq!(
            url_of((KUBECTL.artifact)(&vars(&facts, Some("v1.29.2")))),
            "https://dl.k8s.io/release/v1.29.2/bin/linux/amd64/kubectl"
        );
    }

    #[test]
    fn test_openshift_channels() {
        assert_eq!(openshift_channel(None), "stable");
        assert_eq!(openshift_channel(Some("4")), "stable");
        assert_eq!(openshift_channel(Some("4.12.3")), "4.12.3");
        assert_eq!(openshift_channel(Some("4.10")), "stable-4.10");

        let facts = EnvironmentFacts::new("x86_64", "macos", false);
        let mut v = vars(&facts, None);
        v.version = Some("4.10");
        assert_eq!(
            url_of((OPENSHIFT_INSTALL.artifact)(&v)),
            "https://mirror.openshift.com/pub/openshift-v4/amd64/clients/ocp/stable-4.10/openshift-install-mac.tar.gz"
        );
    }
}
