//! Tool request parsing.
//!
//! A request is either a bare tool name (`helm`, `ibmcloud-is`) or a name
//! suffixed with an explicit version (`openshift-install-4.10`).

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSIONED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z-]+)-([0-9]+\.?[0-9]*\.?[0-9]*)$")
        .unwrap_or_else(|e| unreachable!("request pattern is valid: {e}"))
});

/// A requested tool with an optional explicit version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolRequest {
    /// Name the installer is registered under.
    pub name: String,
    /// Version taken from a `name-version` request.
    pub version: Option<String>,
}

impl ToolRequest {
    /// A request without an explicit version.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Split `raw` into name and version when it carries a version suffix.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidToolRequest {
                request: raw.to_string(),
            });
        }

        match VERSIONED_RE.captures(raw) {
            Some(caps) => {
                let (name, version) = match (caps.get(1), caps.get(2)) {
                    (Some(name), Some(version)) => (name.as_str(), version.as_str()),
                    _ => {
                        return Err(Error::InvalidToolRequest {
                            request: raw.to_string(),
                        });
                    }
                };
                Ok(Self {
                    name: name.to_string(),
                    version: Some(version.to_string()),
                })
            }
            None => Ok(Self::named(raw)),
        }
    }
}

impl FromStr for ToolRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ToolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}-{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}
