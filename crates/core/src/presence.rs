//! Presence decisions: is a tool already satisfied, and how.

use crate::error::{Error, Result};
use crate::process::ToolEnv;
use crate::version::{self, SemanticVersion};
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Outcome of checking whether a tool needs to be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// Resolvable on PATH from inside the bin directory.
    InBinDir(PathBuf),
    /// Resolvable on PATH but older than the required version.
    Outdated(PathBuf),
    /// A system binary satisfies the tool; the bin directory links to it.
    Linked {
        /// The system binary.
        target: PathBuf,
        /// Whether the link was created by this call.
        changed: bool,
    },
    /// Not resolvable on PATH.
    Missing,
}

impl Presence {
    /// Whether nothing needs to be downloaded.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::InBinDir(_) | Self::Linked { .. })
    }

    /// Whether this check modified the bin directory.
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, Self::Linked { changed: true, .. })
    }
}

/// Result of asking a primary tool whether an extension is installed.
#[derive(Debug)]
pub enum Capability {
    /// The probe ran and exited zero.
    Present,
    /// The probe ran and exited non-zero.
    Absent,
    /// The probe could not be run; nothing is known.
    Indeterminate(Error),
}

/// Decide whether `name` must be installed into `dest`.
///
/// In order: a PATH hit under `dest` is present; a hit older than
/// `min_version` is outdated; any other hit is linked into `dest`; no hit is
/// missing. A version that cannot be read or parsed skips the version gate.
pub async fn check_presence(
    env: &ToolEnv,
    dest: &Path,
    name: &str,
    min_version: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Presence> {
    let Some(found) = env.lookup(name) else {
        debug!(tool = name, "Not found in PATH");
        return Ok(Presence::Missing);
    };

    if found.starts_with(dest) {
        debug!(tool = name, path = %found.display(), "Already provided in bin directory");
        return Ok(Presence::InBinDir(found));
    }

    if let Some(required) = min_version.filter(|v| !v.is_empty())
        && is_below(env, &found, name, required, cancel).await?
    {
        return Ok(Presence::Outdated(found));
    }

    debug!(tool = name, path = %found.display(), dest = %dest.display(), "Linking system binary");
    let changed = create_symlink(env, name, &dest.join(name)).await?;
    Ok(Presence::Linked {
        target: found,
        changed,
    })
}

/// Version gate. Unknown versions pass.
async fn is_below(
    env: &ToolEnv,
    program: &Path,
    name: &str,
    required: &str,
    cancel: &CancellationToken,
) -> Result<bool> {
    let output = match env.output(program, &["--version"], cancel).await {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            warn!(tool = name, status = %output.status, "Version probe failed; skipping version check");
            return Ok(false);
        }
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => {
            warn!(tool = name, error = %e, "Version probe failed; skipping version check");
            return Ok(false);
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match version::is_older(&stdout, required) {
        Some(true) => {
            debug!(tool = name, found = %stdout.trim(), required, "Installed version is older than required");
            Ok(true)
        }
        Some(false) => {
            debug!(tool = name, found = %stdout.trim(), required, "Installed version satisfies requirement");
            Ok(false)
        }
        None => {
            warn!(tool = name, found = %stdout.trim(), required, "Unable to parse version; skipping version check");
            Ok(false)
        }
    }
}

/// Link `dest_link` to the PATH resolution of `name`.
///
/// Returns `false` without touching anything when `dest_link` already exists
/// or would point at itself.
pub async fn create_symlink(env: &ToolEnv, name: &str, dest_link: &Path) -> Result<bool> {
    if file_exists(dest_link).await? {
        trace!(link = %dest_link.display(), "Link target already exists");
        return Ok(false);
    }

    let Some(target) = env.lookup(name) else {
        return Err(Error::Symlink {
            link: dest_link.to_path_buf(),
            target: PathBuf::from(name),
            source: io::Error::new(io::ErrorKind::NotFound, "executable not found in PATH"),
        });
    };

    if target == dest_link {
        return Ok(false);
    }

    symlink(&target, dest_link).await.map_err(|source| Error::Symlink {
        link: dest_link.to_path_buf(),
        target,
        source,
    })?;
    Ok(true)
}

#[cfg(unix)]
async fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(windows)]
async fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink_file(target, link).await
}

/// Whether anything (including a dangling link) exists at `path`.
pub async fn file_exists(path: &Path) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Run a tool's version command and parse what it prints.
///
/// Failure to run or parse yields `None`; only cancellation is an error.
pub async fn probe_version(
    env: &ToolEnv,
    program: &Path,
    args: &[&str],
    cancel: &CancellationToken,
) -> Result<Option<SemanticVersion>> {
    let output = match env.output(program, args, cancel).await {
        Ok(output) if output.status.success() => output,
        Ok(_) => return Ok(None),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => {
            trace!(program = %program.display(), error = %e, "Version probe failed");
            return Ok(None);
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!(program = %program.display(), output = %stdout.trim(), "Version output");
    Ok(SemanticVersion::parse(&stdout).ok())
}

/// The first of `candidates` on PATH whose reported version satisfies
/// `requirement`.
pub async fn find_variant(
    env: &ToolEnv,
    candidates: &[&str],
    requirement: &semver::VersionReq,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    for candidate in candidates {
        let Some(path) = env.lookup(candidate) else {
            continue;
        };
        if let Some(found) = probe_version(env, &path, &["--version"], cancel).await?
            && found.matches(requirement)
        {
            debug!(candidate, version = %found, %requirement, "System binary satisfies variant");
            return Ok(Some((*candidate).to_string()));
        }
    }
    Ok(None)
}

/// Ask `program` whether a capability is installed by running `args`.
pub async fn probe_capability(
    env: &ToolEnv,
    program: &Path,
    args: &[&str],
    cancel: &CancellationToken,
) -> Capability {
    match env.output(program, args, cancel).await {
        Ok(output) if output.status.success() => Capability::Present,
        Ok(output) => {
            trace!(program = %program.display(), status = %output.status, "Capability absent");
            Capability::Absent
        }
        Err(e) => Capability::Indeterminate(e),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        dest: PathBuf,
        system: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let dest = root.path().join("bin");
            let system = root.path().join("usr-bin");
            std::fs::create_dir_all(&dest).unwrap();
            std::fs::create_dir_all(&system).unwrap();
            Self {
                _root: root,
                dest,
                system,
            }
        }

        fn env(&self) -> ToolEnv {
            ToolEnv::with_bin_dir(&self.dest, Some(self.system.as_os_str()), &self.dest).unwrap()
        }

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let fx = Fixture::new();
        let presence = check_presence(&fx.env(), &fx.dest, "jq", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(presence, Presence::Missing);
        assert!(!presence.is_satisfied());
    }

    #[tokio::test]
    async fn test_present_in_bin_dir() {
        let fx = Fixture::new();
        Fixture::script(&fx.dest, "jq", "echo jq-1.0");

        // The version is never consulted for binaries already under dest.
        let presence = check_presence(
            &fx.env(),
            &fx.dest,
            "jq",
            Some("9.9.9"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(matches!(presence, Presence::InBinDir(_)));
        assert!(!presence.changed());
    }

    #[tokio::test]
    async fn test_system_binary_is_linked_once() {
        let fx = Fixture::new();
        let target = Fixture::script(&fx.system, "helm", "echo v3.8.2");
        let env = fx.env();
        let cancel = CancellationToken::new();

        let first = check_presence(&env, &fx.dest, "helm", None, &cancel).await.unwrap();
        assert_eq!(
            first,
            Presence::Linked {
                target: target.clone(),
                changed: true
            }
        );
        assert_eq!(std::fs::read_link(fx.dest.join("helm")).unwrap(), target);

        let second = check_presence(&env, &fx.dest, "helm", None, &cancel).await.unwrap();
        assert!(matches!(second, Presence::InBinDir(_)));
    }

    #[tokio::test]
    async fn test_outdated_system_binary() {
        let fx = Fixture::new();
        Fixture::script(&fx.system, "jq", "echo jq-1.6");

        let presence = check_presence(
            &fx.env(),
            &fx.dest,
            "jq",
            Some("1.7.1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(matches!(presence, Presence::Outdated(_)));
        assert!(!fx.dest.join("jq").exists());
    }

    #[tokio::test]
    async fn test_unparseable_version_skips_gate() {
        let fx = Fixture::new();
        Fixture::script(&fx.system, "gitu", "echo development build");

        let presence = check_presence(
            &fx.env(),
            &fx.dest,
            "gitu",
            Some("1.15.0"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(matches!(presence, Presence::Linked { changed: true, .. }));
    }

    #[tokio::test]
    async fn test_symlink_is_idempotent() {
        let fx = Fixture::new();
        Fixture::script(&fx.system, "oc", "echo 4.14.3");
        let env = fx.env();
        let link = fx.dest.join("oc");

        assert!(create_symlink(&env, "oc", &link).await.unwrap());
        assert!(!create_symlink(&env, "oc", &link).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_file_is_left_alone() {
        let fx = Fixture::new();
        Fixture::script(&fx.system, "kubectl", "echo v1.29.0");
        let existing = fx.dest.join("kubectl");
        std::fs::write(&existing, "partial download").unwrap();

        let changed = create_symlink(&fx.env(), "kubectl", &existing).await.unwrap();
        assert!(!changed);
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "partial download");
    }

    #[tokio::test]
    async fn test_find_variant() {
        let fx = Fixture::new();
        Fixture::script(&fx.system, "yq", "echo yq version 3.4.1");
        let env = fx.env();
        let cancel = CancellationToken::new();

        let v3 = semver::VersionReq::parse("^3").unwrap();
        let v4 = semver::VersionReq::parse("^4").unwrap();

        assert_eq!(
            find_variant(&env, &["yq", "yq3"], &v3, &cancel).await.unwrap(),
            Some("yq".to_string())
        );
        assert_eq!(find_variant(&env, &["yq", "yq4"], &v4, &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capability_tri_state() {
        let fx = Fixture::new();
        let env = fx.env();
        let cancel = CancellationToken::new();
        let primary = Fixture::script(
            &fx.system,
            "ibmcloud",
            "[ \"$3\" = \"container-registry\" ] && exit 0\nexit 1",
        );

        assert!(matches!(
            probe_capability(&env, &primary, &["plugin", "show", "container-registry"], &cancel)
                .await,
            Capability::Present
        ));
        assert!(matches!(
            probe_capability(&env, &primary, &["plugin", "show", "observe-service"], &cancel).await,
            Capability::Absent
        ));
        assert!(matches!(
            probe_capability(&env, &fx.dest.join("ibmcloud"), &["plugin", "show", "x"], &cancel)
                .await,
            Capability::Indeterminate(_)
        ));
    }
}
