//! Loose version parsing and comparison.
//!
//! Tools report their version in free-form banners (`jq-1.7.1`,
//! `yq version 3.4.1`, `Client Version: v4.5.7`). A version is the first
//! `major.minor[.patch]` run in such text; a missing patch reads as zero.
//! [`SemanticVersion::parse`] also accepts a bare major (`v3`) when no dotted
//! run is present.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static DOTTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)(?:\.(?P<patch>\d+))?")
        .unwrap_or_else(|e| unreachable!("dotted version pattern is valid: {e}"))
});

static MAJOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<major>\d+)")
        .unwrap_or_else(|e| unreachable!("major version pattern is valid: {e}"))
});

/// A canonical `major.minor.patch` triple, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemanticVersion {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
}

impl SemanticVersion {
    /// Create a version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first version found anywhere in `raw`, falling back to a
    /// bare major number when the text has no `major.minor` run.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_dotted(raw).or_else(|_| Self::capture(&MAJOR_RE, raw))
    }

    /// Parse the first `major.minor[.patch]` run in `raw`.
    ///
    /// Unlike [`Self::parse`], lone integers such as a year or a `Major:"1"`
    /// field are skipped.
    pub fn parse_dotted(raw: &str) -> Result<Self> {
        Self::capture(&DOTTED_RE, raw)
    }

    fn capture(re: &Regex, raw: &str) -> Result<Self> {
        let parse_err = || Error::VersionParse {
            input: raw.to_string(),
        };
        let caps = re.captures(raw).ok_or_else(parse_err)?;
        let component = |name: &str| -> Result<u64> {
            caps.name(name)
                .map_or(Ok(0), |m| m.as_str().parse().map_err(|_| parse_err()))
        };

        Ok(Self {
            major: component("major")?,
            minor: component("minor")?,
            patch: component("patch")?,
        })
    }

    /// Whether this version satisfies a semver requirement such as `^3`.
    #[must_use]
    pub fn matches(&self, requirement: &semver::VersionReq) -> bool {
        requirement.matches(&semver::Version::from(*self))
    }
}

impl From<SemanticVersion> for semver::Version {
    fn from(v: SemanticVersion) -> Self {
        Self::new(v.major, v.minor, v.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Extract a `major.minor.patch` string from noisy command output.
///
/// Returns `None` when the text contains no `major.minor` run.
#[must_use]
pub fn clean_version_string(output: &str) -> Option<String> {
    SemanticVersion::parse_dotted(output)
        .ok()
        .map(|v| v.to_string())
}

/// Whether `current` is strictly older than `required`.
///
/// Returns `None` when either side cannot be parsed; callers treat that as an
/// unversioned tool and skip the version gate.
#[must_use]
pub fn is_older(current: &str, required: &str) -> Option<bool> {
    let current = SemanticVersion::parse_dotted(current).ok()?;
    let required = SemanticVersion::parse_dotted(required).ok()?;
    Some(current < required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_parse_prose_prefix() {
        assert_eq!(
            SemanticVersion::parse("jq-1.7.1 (linked against oniguruma)").unwrap(),
            SemanticVersion::new(1, 7, 1)
        );
        assert_eq!(
            SemanticVersion::parse("jq-1.6").unwrap(),
            SemanticVersion::new(1, 6, 0)
        );
    }

    #[test]
    fn test_parse_major_only() {
        assert_eq!(
            SemanticVersion::parse("v3").unwrap(),
            SemanticVersion::new(3, 0, 0)
        );
    }

    #[test]
    fn test_parse_multiline_banner() {
        let banner = "Client Version: version.Info{Major:\"\", GitVersion:\"v4.5.7\"}\n\
                      Kustomize Version: v5.0.1\n";
        // First run of digits with dots wins.
        assert_eq!(
            SemanticVersion::parse("oc\nClient Version: 4.14.3\nKustomize Version: v5.0.1").unwrap(),
            SemanticVersion::new(4, 14, 3)
        );
        assert_eq!(
            SemanticVersion::parse(banner).unwrap(),
            SemanticVersion::new(4, 5, 7)
        );
    }

    #[test]
    fn test_banner_integers_before_the_version_are_skipped() {
        let kubectl =
            r#"Client Version: version.Info{Major:"1", Minor:"29", GitVersion:"v1.29.2"}"#;
        assert_eq!(clean_version_string(kubectl).as_deref(), Some("1.29.2"));
        assert_eq!(
            SemanticVersion::parse(kubectl).unwrap(),
            SemanticVersion::new(1, 29, 2)
        );

        let jq = "jq 2023 edition, version 1.6";
        assert_eq!(clean_version_string(jq).as_deref(), Some("1.6.0"));
        assert_eq!(is_older(jq, "1.7.1"), Some(true));
    }

    #[test]
    fn test_bare_major_only_through_parse() {
        assert_eq!(
            SemanticVersion::parse("release 7").unwrap(),
            SemanticVersion::new(7, 0, 0)
        );
        assert!(SemanticVersion::parse_dotted("release 7").is_err());
        assert!(clean_version_string("release 7").is_none());
        assert_eq!(is_older("release 7", "1.0.0"), None);
    }

    #[test]
    fn test_parse_no_digits_fails() {
        let err = SemanticVersion::parse("version unknown").unwrap_err();
        assert!(matches!(err, Error::VersionParse { .. }));
        assert!(clean_version_string("").is_none());
    }

    #[test]
    fn test_compare() {
        let a = SemanticVersion::new(1, 6, 0);
        let b = SemanticVersion::new(1, 7, 1);
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert_eq!(b.cmp(&a), Ordering::Greater);
        assert_eq!(a.cmp(&SemanticVersion::new(1, 6, 0)), Ordering::Equal);
        assert!(SemanticVersion::new(2, 0, 0) > SemanticVersion::new(1, 99, 99));
    }

    #[test]
    fn test_clean_version_string() {
        assert_eq!(
            clean_version_string("yq version 3.4.1").as_deref(),
            Some("3.4.1")
        );
        assert_eq!(
            clean_version_string("igc version 1.50").as_deref(),
            Some("1.50.0")
        );
    }

    #[test]
    fn test_is_older() {
        assert_eq!(is_older("jq-1.6", "1.7.1"), Some(true));
        assert_eq!(is_older("jq-1.7.1", "1.7.1"), Some(false));
        assert_eq!(is_older("gitu 2.0.0", "1.15.0"), Some(false));
        assert_eq!(is_older("no version here", "1.0"), None);
    }

    #[test]
    fn test_matches_major_requirement() {
        let v3 = semver::VersionReq::parse("^3").unwrap();
        let v4 = semver::VersionReq::parse("^4").unwrap();
        let yq = SemanticVersion::parse("yq version 3.4.1").unwrap();

        assert!(yq.matches(&v3));
        assert!(!yq.matches(&v4));
    }
}
