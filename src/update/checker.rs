//! GitHub release checker.
//!
//! Queries `releases/latest` for a repository and normalizes the tag into a
//! plain version string. Every failure (transport, non-2xx, bad JSON) is
//! logged and reported as `None`; a lookup never raises.

use crate::config::Config;
use crate::error::{ExtensionError, Result};
use crate::version::normalize_tag;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Snapshot of a published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    /// Version with any leading `v` removed (`"0.0.0"` when the tag is absent).
    pub version: String,
    /// Release page on the web.
    pub release_url: Option<String>,
    /// Release notes (markdown).
    pub release_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseWire {
    tag_name: Option<String>,
    html_url: Option<String>,
    body: Option<String>,
}

impl From<ReleaseWire> for ReleaseInfo {
    fn from(w: ReleaseWire) -> Self {
        Self {
            version: normalize_tag(w.tag_name.as_deref()),
            release_url: w.html_url,
            release_notes: w.body,
        }
    }
}

/// Looks up the latest release of GitHub repositories.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    client: reqwest::Client,
    api_base: String,
    user_agent: String,
}

impl UpdateChecker {
    /// Create a checker against `api_base` (e.g. `https://api.github.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_base: impl Into<String>, user_agent: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExtensionError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            user_agent: user_agent.into(),
        })
    }

    /// Create a checker from the startup configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.updates.api_base.clone(),
            config.updates.user_agent.clone(),
        )
    }

    /// `releases/latest` endpoint for `repo` (`owner/repo`).
    pub fn latest_release_url(&self, repo: &str) -> String {
        format!(
            "{}/repos/{repo}/releases/latest",
            self.api_base.trim_end_matches('/')
        )
    }

    /// Latest release of `repo`, or `None` if it cannot be determined.
    pub async fn latest_release(&self, repo: &str) -> Option<ReleaseInfo> {
        match self.fetch_latest(repo).await {
            Ok(release) => {
                debug!(repo, version = %release.version, "latest release");
                Some(release)
            }
            Err(e) => {
                warn!(repo, "failed to fetch release: {e}");
                None
            }
        }
    }

    async fn fetch_latest(&self, repo: &str) -> Result<ReleaseInfo> {
        let url = self.latest_release_url(repo);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| ExtensionError::Network(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExtensionError::Network(format!(
                "GitHub API error: HTTP {}",
                status.as_u16()
            )));
        }

        let wire: ReleaseWire = resp
            .json()
            .await
            .map_err(|e| ExtensionError::Network(format!("invalid release JSON: {e}")))?;
        Ok(wire.into())
    }
}
