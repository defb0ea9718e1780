//! Community-sentiment bundle: developer activity plus governance participation

use async_trait::async_trait;
use diligence_core::{Capability, CommunitySentiment, DataSource, Degradation, GovernanceActivity, Sentiment, Target};
use tracing::info;

use crate::{ActivityConnector, Connector, DevActivity, GovernanceConnector};

pub struct SentimentConnector {
    activity: ActivityConnector,
    governance: GovernanceConnector,
}

impl SentimentConnector {
    pub fn new(activity: ActivityConnector, governance: GovernanceConnector) -> Self {
        Self { activity, governance }
    }
}

/// Build the bundle from the two capability outcomes
pub fn community_sentiment(
    activity: Capability<DevActivity>,
    governance: Capability<GovernanceActivity>,
) -> CommunitySentiment {
    let mut sources = Vec::new();
    let mut degraded = Vec::new();

    let (overall_sentiment, key_topics) = match activity {
        Capability::Live { value } if value.has_data() => {
            sources.push("github");
            degraded.extend(value.degraded.iter().cloned());
            (value.overall(), value.key_topics())
        }
        Capability::Live { .. } => (Sentiment::Mixed, Vec::new()),
        Capability::Unavailable { reason } => {
            degraded.push(Degradation::new("developer_activity", reason));
            (Sentiment::Mixed, Vec::new())
        }
    };

    let governance_activity = match governance {
        Capability::Live { value } => {
            if value.space.is_some() {
                sources.push("snapshot");
            }
            value
        }
        Capability::Unavailable { reason } => {
            degraded.push(Degradation::new("governance", reason));
            GovernanceActivity::default()
        }
    };

    let fallback = if degraded.is_empty() {
        DataSource::NoData
    } else {
        DataSource::Unavailable
    };

    CommunitySentiment {
        overall_sentiment,
        key_topics,
        governance_activity,
        data_source: DataSource::from_sources(sources, fallback),
        degraded,
    }
}

#[async_trait]
impl Connector for SentimentConnector {
    type Output = CommunitySentiment;

    fn name(&self) -> &'static str {
        "community"
    }

    async fn collect(&self, target: &Target) -> CommunitySentiment {
        let (activity, governance) =
            futures::join!(self.activity.collect(target), self.governance.collect(target));
        let bundle = community_sentiment(activity, governance);
        info!(
            "Community sentiment for {}: {:?} ({})",
            target.name, bundle.overall_sentiment, bundle.data_source
        );
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy() -> DevActivity {
        DevActivity {
            orgs: vec!["aave".into()],
            repositories: 10,
            open_issues: 50,
            commits: 240,
            contributors: 14,
            active_repositories: vec!["aave/aave-v3-core".into()],
            window_days: 90,
            degraded: vec![],
        }
    }

    #[test]
    fn test_live_bundle() {
        let governance = GovernanceActivity {
            space: Some("aave.eth".into()),
            recent_proposals: 20,
            average_votes: 180.5,
        };
        let bundle = community_sentiment(Capability::live(busy()), Capability::live(governance));

        assert_eq!(bundle.overall_sentiment, Sentiment::Positive);
        assert_eq!(bundle.key_topics.len(), 3);
        assert_eq!(bundle.governance_activity.recent_proposals, 20);
        assert_eq!(bundle.data_source.to_string(), "github, snapshot");
        assert!(bundle.degraded.is_empty());
    }

    #[test]
    fn test_both_unavailable() {
        let bundle = community_sentiment(
            Capability::unavailable("HTTP 503"),
            Capability::unavailable("connection refused"),
        );

        assert_eq!(bundle.overall_sentiment, Sentiment::Mixed);
        assert_eq!(bundle.governance_activity, GovernanceActivity::default());
        assert_eq!(bundle.data_source, DataSource::Unavailable);
        assert_eq!(bundle.degraded.len(), 2);
    }

    #[test]
    fn test_nothing_on_record_is_no_data() {
        let bundle = community_sentiment(
            Capability::live(DevActivity::default()),
            Capability::live(GovernanceActivity::default()),
        );
        assert_eq!(bundle.data_source, DataSource::NoData);
    }

    #[test]
    fn test_governance_failure_keeps_activity() {
        let bundle = community_sentiment(Capability::live(busy()), Capability::unavailable("timeout"));

        assert_eq!(bundle.data_source.to_string(), "github");
        assert_eq!(bundle.degraded[0].capability, "governance");
    }
}
