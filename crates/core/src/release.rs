//! Latest-release resolution for hosted projects.

use crate::error::{Error, Result};
use crate::fetch::{http_client, until_cancelled};
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r".*/tag/(.+)").unwrap_or_else(|e| unreachable!("tag pattern is valid: {e}"))
});

/// Default site for release redirects and downloads.
pub const GITHUB_URL: &str = "https://github.com";
/// Default release metadata API.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// The tag of a resolved release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Release tag, e.g. `v0.26.2`.
    pub tag_name: String,
}

impl ReleaseInfo {
    /// The tag with every `v` removed, as embedded in asset names.
    #[must_use]
    pub fn short_version(&self) -> String {
        self.tag_name.replace('v', "")
    }
}

/// How the latest release is discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStrategy {
    /// Read the tag from the `Location` of the `releases/latest` redirect.
    /// Not subject to API rate limits.
    #[default]
    Redirect,
    /// Decode `tag_name` from the releases API.
    Api,
}

impl ReleaseStrategy {
    /// Whether the HTTP client should follow redirects. The redirect strategy
    /// reads the `Location` header itself; the API answers renamed
    /// repositories with a redirect to their new home.
    #[must_use]
    pub const fn follows_redirects(self) -> bool {
        matches!(self, Self::Api)
    }
}

/// Resolves `org/repo` to its latest release tag.
#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    client: Client,
    strategy: ReleaseStrategy,
    site_url: String,
    api_url: String,
}

impl ReleaseResolver {
    /// Create a resolver. For [`ReleaseStrategy::Redirect`] the client must not
    /// follow redirects.
    #[must_use]
    pub fn new(client: Client, strategy: ReleaseStrategy) -> Self {
        Self {
            client,
            strategy,
            site_url: GITHUB_URL.to_string(),
            api_url: GITHUB_API_URL.to_string(),
        }
    }

    /// Create a resolver with its own client, whose redirect policy suits
    /// `strategy`.
    pub fn build(timeout: Duration, user_agent: &str, strategy: ReleaseStrategy) -> Result<Self> {
        let client = http_client(timeout, user_agent, strategy.follows_redirects())?;
        Ok(Self::new(client, strategy))
    }

    /// Override the release site base URL.
    #[must_use]
    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = trim_base(url.into());
        self
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = trim_base(url.into());
        self
    }

    /// Base URL of the release site, used for download URLs too.
    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Resolve the latest release of `org/repo`. No retries.
    pub async fn latest(
        &self,
        org: &str,
        repo: &str,
        cancel: &CancellationToken,
    ) -> Result<ReleaseInfo> {
        let info = until_cancelled(cancel, async {
            match self.strategy {
                ReleaseStrategy::Redirect => self.latest_from_redirect(org, repo).await,
                ReleaseStrategy::Api => self.latest_from_api(org, repo).await,
            }
        })
        .await?;
        debug!(org, repo, tag = %info.tag_name, "Resolved latest release");
        Ok(info)
    }

    async fn latest_from_redirect(&self, org: &str, repo: &str) -> Result<ReleaseInfo> {
        let url = format!("{}/{}/{}/releases/latest", self.site_url, org, repo);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(&url, e))?;

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::NoLocation { url: url.clone() })?;

        parse_tag(location)
    }

    async fn latest_from_api(&self, org: &str, repo: &str) -> Result<ReleaseInfo> {
        let url = format!("{}/repos/{}/{}/releases/latest", self.api_url, org, repo);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::http(&url, e))?;

        if response.status() != StatusCode::OK {
            return Err(Error::BadStatus {
                what: format!("{org}/{repo} release"),
                status: response.status().to_string(),
                url,
            });
        }

        response
            .json::<ReleaseInfo>()
            .await
            .map_err(|e| Error::ReleaseMetadata {
                repo: format!("{org}/{repo}"),
                message: e.to_string(),
            })
    }
}

/// Extract the tag from a `.../tag/<tag>` release URL.
pub fn parse_tag(location: &str) -> Result<ReleaseInfo> {
    TAG_RE
        .captures(location)
        .and_then(|caps| caps.get(1))
        .map(|tag| ReleaseInfo {
            tag_name: tag.as_str().to_string(),
        })
        .ok_or_else(|| Error::UnparseableTag {
            location: location.to_string(),
        })
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
