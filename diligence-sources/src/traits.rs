//! Common traits and configuration for connectors

use async_trait::async_trait;
use diligence_core::{Capability, Target};
use diligence_net::FetchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised inside a connector before they are turned into a degraded capability
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not listed: {0}")]
    NotListed(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_not_found())
    }
}

impl<T> From<SourceError> for Capability<T> {
    fn from(error: SourceError) -> Self {
        Capability::unavailable(error)
    }
}

/// Common interface for all connectors.
///
/// `collect` never fails: provider errors are folded into the output as
/// degraded capabilities.
#[async_trait]
pub trait Connector: Send + Sync {
    type Output: Send;

    /// Short provider tag used in provenance
    fn name(&self) -> &'static str;

    async fn collect(&self, target: &Target) -> Self::Output;
}

/// Provider base URLs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub github_api: String,
    pub github_raw: String,
    pub snapshot_graphql: String,
    pub sourcify: String,
    pub bounty_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_api: "https://api.github.com".to_string(),
            github_raw: "https://raw.githubusercontent.com".to_string(),
            snapshot_graphql: "https://hub.snapshot.org/graphql".to_string(),
            sourcify: "https://sourcify.dev/server".to_string(),
            bounty_base: "https://immunefi.com/bug-bounty".to_string(),
        }
    }
}

/// Developer-activity scan limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Organizations scanned per protocol
    pub max_orgs: usize,
    /// Most recently pushed repositories listed per organization
    pub repos_per_org: usize,
    /// Commit window in days
    pub window_days: i64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            max_orgs: 3,
            repos_per_org: 10,
            window_days: 90,
        }
    }
}
