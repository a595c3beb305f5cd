//! Host platform facts and per-tool platform vocabularies.
//!
//! Release assets name platforms inconsistently (`darwin` vs `macos` vs `mac`,
//! `amd64` vs `x64` vs `x86_64`). [`EnvironmentFacts`] is captured once per run
//! and each installer asks it for tokens in its own vocabulary via [`OsNames`]
//! and [`ArchNames`].

use std::path::Path;
use tracing::trace;

/// Location of the os-release file used for distribution detection.
const OS_RELEASE: &str = "/etc/os-release";

/// Immutable snapshot of the host platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFacts {
    /// CPU architecture (e.g. `x86_64`, `aarch64`, `arm64`).
    pub arch: String,
    /// Operating system (e.g. `linux`, `macos`, `darwin`).
    pub os: String,
    /// Whether the host runs Alpine Linux (musl).
    pub alpine: bool,
}

impl EnvironmentFacts {
    /// Create facts from explicit values.
    #[must_use]
    pub fn new(arch: impl Into<String>, os: impl Into<String>, alpine: bool) -> Self {
        Self {
            arch: arch.into(),
            os: os.into(),
            alpine,
        }
    }

    /// Capture the facts of the running host.
    #[must_use]
    pub fn detect() -> Self {
        let facts = Self::new(
            std::env::consts::ARCH,
            std::env::consts::OS,
            is_alpine_release(Path::new(OS_RELEASE)),
        );
        trace!(?facts, "Detected environment");
        facts
    }

    /// ARM family architecture. Unknown architectures are treated as non-ARM.
    #[must_use]
    pub fn is_arm(&self) -> bool {
        self.arch.starts_with("arm") || self.arch == "aarch64"
    }

    /// macOS host.
    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os.contains("darwin") || self.os.contains("macos")
    }

    /// Alpine Linux host.
    #[must_use]
    pub fn is_alpine(&self) -> bool {
        self.alpine
    }

    /// OS token in the given vocabulary.
    #[must_use]
    pub fn os_token(&self, names: &OsNames) -> &'static str {
        if self.is_macos() {
            names.mac
        } else if self.is_alpine() {
            names.alpine.unwrap_or(names.linux)
        } else {
            names.linux
        }
    }

    /// Architecture token in the given vocabulary.
    #[must_use]
    pub fn arch_token(&self, names: &ArchNames) -> &'static str {
        if self.is_arm() { names.arm } else { names.other }
    }
}

/// OS vocabulary of one tool family.
#[derive(Debug, Clone, Copy)]
pub struct OsNames {
    /// Token for macOS hosts.
    pub mac: &'static str,
    /// Token for Linux hosts.
    pub linux: &'static str,
    /// Token for Alpine hosts; falls back to `linux` when absent.
    pub alpine: Option<&'static str>,
}

impl OsNames {
    /// Go-style names: `darwin` / `linux`.
    pub const GO: Self = Self::of("darwin", "linux");
    /// `macos` / `linux`.
    pub const MACOS: Self = Self::of("macos", "linux");
    /// Node-packaged tools that ship a musl build: `macos` / `alpine` / `linux`.
    pub const MACOS_ALPINE: Self = Self {
        mac: "macos",
        linux: "linux",
        alpine: Some("alpine"),
    };
    /// OpenShift mirror names: `mac` / `linux`.
    pub const MAC: Self = Self::of("mac", "linux");
    /// `macosx` / `linux`.
    pub const MACOSX: Self = Self::of("macosx", "linux");
    /// GoReleaser title case: `macOS` / `linux`.
    pub const MACOS_TITLE: Self = Self::of("macOS", "linux");
    /// GoReleaser title case for both: `macOS` / `Linux`.
    pub const TITLE: Self = Self::of("macOS", "Linux");

    /// A vocabulary without an Alpine-specific token.
    #[must_use]
    pub const fn of(mac: &'static str, linux: &'static str) -> Self {
        Self {
            mac,
            linux,
            alpine: None,
        }
    }
}

/// Architecture vocabulary of one tool family.
#[derive(Debug, Clone, Copy)]
pub struct ArchNames {
    /// Token for ARM hosts.
    pub arm: &'static str,
    /// Token for every other host.
    pub other: &'static str,
}

impl ArchNames {
    /// `arm64` / `amd64`.
    pub const GO: Self = Self::of("arm64", "amd64");
    /// `arm64` / `x64`.
    pub const NODE: Self = Self::of("arm64", "x64");
    /// `arm64` / `x86_64`.
    pub const UNAME: Self = Self::of("arm64", "x86_64");

    /// Build a vocabulary.
    #[must_use]
    pub const fn of(arm: &'static str, other: &'static str) -> Self {
        Self { arm, other }
    }
}

/// Whether an os-release file identifies Alpine Linux.
#[must_use]
pub fn is_alpine_release(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().any(|line| line.trim() == "ID=alpine"),
        Err(_) => false,
    }
}
