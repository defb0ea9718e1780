//! Coverage discovery
//!
//! Collects links from the protocol's own metadata, then scans the README
//! of each organization's top-starred repository, and merges both through
//! the coverage aggregator.

use async_trait::async_trait;
use diligence_core::{
    metadata_links, readme_links, AnalystCoverage, CoverageAggregator, Degradation, LinkOrigin, Target,
};
use diligence_net::SharedFetcher;
use tracing::{debug, info, warn};

use crate::github::GitHub;
use crate::{Connector, Endpoints, SourceError};

pub struct CoverageConnector {
    github: GitHub,
    max_orgs: usize,
}

impl CoverageConnector {
    pub fn new(fetcher: SharedFetcher, endpoints: &Endpoints, max_orgs: usize) -> Self {
        Self {
            github: GitHub::new(fetcher, endpoints),
            max_orgs,
        }
    }

    async fn readme_links_for(&self, handle: &str) -> Result<Vec<diligence_core::CoverageLink>, SourceError> {
        let repos = self
            .github
            .search_repositories(&format!("user:{}", handle), "stars", 1)
            .await?;
        let Some(top) = repos.first() else {
            debug!("No repositories found for {}", handle);
            return Ok(Vec::new());
        };
        let readme = self.github.readme(top).await?;
        Ok(readme_links(&readme, &top.full_name))
    }
}

#[async_trait]
impl Connector for CoverageConnector {
    type Output = AnalystCoverage;

    fn name(&self) -> &'static str {
        "coverage"
    }

    async fn collect(&self, target: &Target) -> AnalystCoverage {
        let mut aggregator = CoverageAggregator::new();
        if let Some(detail) = &target.detail {
            aggregator.add(LinkOrigin::Metadata, metadata_links(detail));
        }

        for handle in target.github_handles().iter().take(self.max_orgs) {
            match self.readme_links_for(handle).await {
                Ok(links) => {
                    debug!("{} README links from {}", links.len(), handle);
                    aggregator.add(LinkOrigin::Readme, links);
                }
                Err(e) => {
                    warn!("README scan for {} failed: {}", handle, e);
                    aggregator.degrade(Degradation::new(&format!("readme:{}", handle), e));
                }
            }
        }

        let coverage = aggregator.build();
        info!(
            "Coverage for {}: {} links ({})",
            target.name,
            coverage.articles.len(),
            coverage.data_source
        );
        coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diligence_core::{DataSource, ProtocolDetail};
    use diligence_net::testing::ScriptedTransport;
    use diligence_net::{FetchConfig, Fetcher, TransportError};
    use serde_json::json;
    use std::sync::Arc;

    const SEARCH: &str = "https://api.github.com/search/repositories";
    const README: &str = "https://raw.githubusercontent.com/aave/aave-v3-core/master/README.md";
    const README_LOOKUP: &str = "https://api.github.com/repos/aave/aave-v3-core/readme";

    fn connector(transport: &Arc<ScriptedTransport>) -> CoverageConnector {
        let fetcher = Arc::new(Fetcher::with_transport(FetchConfig::default(), transport.clone()));
        CoverageConnector::new(fetcher, &Endpoints::default(), 3)
    }

    fn detail() -> ProtocolDetail {
        ProtocolDetail {
            name: "Aave".into(),
            url: Some("https://aave.com".into()),
            twitter: Some("aave".into()),
            github: vec!["aave".into()],
            ..Default::default()
        }
    }

    fn top_repo() -> serde_json::Value {
        json!({"items": [{
            "name": "aave-v3-core",
            "full_name": "aave/aave-v3-core",
            "html_url": "https://github.com/aave/aave-v3-core",
            "default_branch": "master",
            "stargazers_count": 900,
            "owner": {"login": "aave"}
        }]})
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_first_then_readme() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(SEARCH, top_repo());
        transport.respond(
            README,
            200,
            "# Aave\n[Docs](https://docs.aave.com)\n[Governance forum](https://aave.com/)\n[Discord](https://discord.gg/aave)\n",
        );

        let coverage = connector(&transport).collect(&Target::new(detail(), vec![])).await;

        let urls: Vec<&str> = coverage.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://aave.com",
                "https://x.com/aave",
                "https://docs.aave.com",
                "https://discord.gg/aave",
            ]
        );
        assert_eq!(coverage.articles[0].source, "Protocol metadata");
        assert_eq!(coverage.data_source.to_string(), "defillama, github");
    }

    #[tokio::test(start_paused = true)]
    async fn test_readme_failure_keeps_metadata() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(SEARCH, top_repo());
        transport.respond(README, 404, "404: Not Found");

        let coverage = connector(&transport).collect(&Target::new(detail(), vec![])).await;

        assert_eq!(coverage.articles.len(), 2);
        assert_eq!(coverage.data_source.to_string(), "defillama");
        assert_eq!(coverage.degraded[0].capability, "readme:aave");
    }

    #[tokio::test]
    async fn test_nothing_found_is_no_data() {
        let transport = Arc::new(ScriptedTransport::new());
        let coverage = connector(&transport).collect(&Target::named("Ghost")).await;

        assert!(coverage.articles.is_empty());
        assert_eq!(coverage.data_source, DataSource::NoData);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_lookups_failing_is_unavailable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("https://", TransportError::Connect("network down".into()));
        let detail = ProtocolDetail {
            name: "Quiet".into(),
            github: vec!["quiet".into()],
            ..Default::default()
        };

        let coverage = connector(&transport).collect(&Target::new(detail, vec![])).await;

        assert!(coverage.articles.is_empty());
        assert_eq!(coverage.data_source, DataSource::Unavailable);
        assert_eq!(coverage.degraded.len(), 1);
        assert_eq!(coverage.degraded[0].capability, "readme:quiet");
    }

    #[tokio::test(start_paused = true)]
    async fn test_readme_file_name_comes_from_lookup() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(SEARCH, top_repo());
        transport.respond_json(README_LOOKUP, json!({"name": "readme.rst", "path": "readme.rst"}));
        transport.respond(
            "https://raw.githubusercontent.com/aave/aave-v3-core/master/readme.rst",
            200,
            "See <a href=\"https://docs.aave.com\">the docs</a>",
        );

        let coverage = connector(&transport).collect(&Target::new(detail(), vec![])).await;

        assert_eq!(transport.count(README), 0);
        assert_eq!(coverage.articles.last().map(|a| a.url.as_str()), Some("https://docs.aave.com"));
        assert_eq!(coverage.data_source.to_string(), "defillama, github");
        assert!(coverage.degraded.is_empty());
    }
}
