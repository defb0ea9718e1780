//! Governance Connector
//!
//! Reads the last closed proposals of the protocol's Snapshot space and
//! averages their vote counts.

use async_trait::async_trait;
use diligence_core::{Capability, GovernanceActivity, Target};
use diligence_net::{FetchRequest, SharedFetcher};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{Connector, Endpoints, SourceError};

/// Closed proposals considered per space
pub const PROPOSAL_WINDOW: usize = 20;

const PROPOSALS_QUERY: &str = r#"query Proposals($space: String!, $first: Int!) {
  proposals(
    first: $first,
    skip: 0,
    where: { space_in: [$space], state: "closed" },
    orderBy: "created",
    orderDirection: desc
  ) {
    id
    title
    votes
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<ProposalsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProposalsData {
    #[serde(default)]
    proposals: Vec<Proposal>,
}

#[derive(Debug, Deserialize)]
struct Proposal {
    #[serde(default)]
    votes: Option<u64>,
}

/// Snapshot space named in the protocol's governance identifiers
pub fn snapshot_space(governance_ids: &[String]) -> Option<String> {
    governance_ids.iter().find_map(|id| {
        let (platform, space) = id.trim().split_once(':')?;
        let space = space.trim();
        (platform.eq_ignore_ascii_case("snapshot") && !space.is_empty()).then(|| space.to_string())
    })
}

pub struct GovernanceConnector {
    fetcher: SharedFetcher,
    endpoint: String,
}

impl GovernanceConnector {
    pub fn new(fetcher: SharedFetcher, endpoints: &Endpoints) -> Self {
        Self {
            fetcher,
            endpoint: endpoints.snapshot_graphql.clone(),
        }
    }

    async fn proposals(&self, space: &str) -> Result<GovernanceActivity, SourceError> {
        let request = FetchRequest::post_json(
            &self.endpoint,
            json!({
                "query": PROPOSALS_QUERY,
                "variables": { "space": space, "first": PROPOSAL_WINDOW },
            }),
        );
        let response: GraphQlResponse = self.fetcher.fetch_json(request).await?;

        if let Some(error) = response.errors.first() {
            return Err(SourceError::Parse(format!("GraphQL error: {}", error.message)));
        }
        let proposals = response
            .data
            .map(|d| d.proposals)
            .ok_or_else(|| SourceError::Parse("missing proposals in response".to_string()))?;

        let total_votes: u64 = proposals.iter().map(|p| p.votes.unwrap_or(0)).sum();
        let average_votes = if proposals.is_empty() {
            0.0
        } else {
            total_votes as f64 / proposals.len() as f64
        };

        Ok(GovernanceActivity {
            space: Some(space.to_string()),
            recent_proposals: proposals.len() as u32,
            average_votes,
        })
    }
}

#[async_trait]
impl Connector for GovernanceConnector {
    type Output = Capability<GovernanceActivity>;

    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn collect(&self, target: &Target) -> Self::Output {
        let space = target
            .detail
            .as_ref()
            .and_then(|d| snapshot_space(&d.governance_id));
        let Some(space) = space else {
            debug!("No Snapshot space on record for {}", target.name);
            return Capability::live(GovernanceActivity::default());
        };

        match self.proposals(&space).await {
            Ok(activity) => {
                info!(
                    "Governance for {}: {} proposals, {:.1} average votes",
                    space, activity.recent_proposals, activity.average_votes
                );
                Capability::live(activity)
            }
            Err(e) => {
                warn!("Governance activity unavailable for {}: {}", space, e);
                e.into()
            }
        }
    }
}
