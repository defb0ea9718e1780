//! Developer-Activity Connector
//!
//! For each source-code organization on record:
//! - lists its most recently pushed repositories and sums open issues
//! - counts commits and distinct authors in the window on the most
//!   recently pushed repository
//!
//! The three metrics are classified into sentiments by fixed thresholds.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use diligence_core::{Capability, Degradation, KeyTopic, Sentiment, Target};
use diligence_net::SharedFetcher;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::github::GitHub;
use crate::{ActivityConfig, Connector, Endpoints, SourceError};

/// Aggregated development activity across all scanned organizations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevActivity {
    /// Organizations that answered
    pub orgs: Vec<String>,
    pub repositories: usize,
    pub open_issues: u64,
    pub commits: u64,
    pub contributors: usize,
    /// Repositories whose commits were counted
    pub active_repositories: Vec<String>,
    pub window_days: i64,
    /// Organizations or sub-metrics that could not be fetched
    pub degraded: Vec<Degradation>,
}

impl DevActivity {
    /// True when at least one organization answered
    pub fn has_data(&self) -> bool {
        !self.orgs.is_empty()
    }

    pub fn sentiments(&self) -> [Sentiment; 3] {
        [
            commit_sentiment(self.commits),
            issue_sentiment(self.open_issues),
            contributor_sentiment(self.contributors),
        ]
    }

    pub fn overall(&self) -> Sentiment {
        Sentiment::majority(&self.sentiments())
    }

    /// One topic per classified metric
    pub fn key_topics(&self) -> Vec<KeyTopic> {
        let [commits, issues, contributors] = self.sentiments();
        vec![
            KeyTopic {
                topic: "Development Activity".to_string(),
                sentiment: commits,
                summary: format!(
                    "{} commits in the last {} days across {}",
                    self.commits,
                    self.window_days,
                    if self.active_repositories.is_empty() {
                        "no repositories".to_string()
                    } else {
                        self.active_repositories.join(", ")
                    }
                ),
            },
            KeyTopic {
                topic: "Issue Backlog".to_string(),
                sentiment: issues,
                summary: format!(
                    "{} open issues across {} repositories",
                    self.open_issues, self.repositories
                ),
            },
            KeyTopic {
                topic: "Contributors".to_string(),
                sentiment: contributors,
                summary: format!(
                    "{} distinct commit authors in the last {} days",
                    self.contributors, self.window_days
                ),
            },
        ]
    }
}

pub fn commit_sentiment(commits: u64) -> Sentiment {
    if commits >= 100 {
        Sentiment::Positive
    } else if commits >= 20 {
        Sentiment::Mixed
    } else {
        Sentiment::Negative
    }
}

pub fn issue_sentiment(open_issues: u64) -> Sentiment {
    if open_issues < 100 {
        Sentiment::Positive
    } else if open_issues < 300 {
        Sentiment::Mixed
    } else {
        Sentiment::Negative
    }
}

pub fn contributor_sentiment(contributors: usize) -> Sentiment {
    if contributors >= 10 {
        Sentiment::Positive
    } else if contributors >= 3 {
        Sentiment::Mixed
    } else {
        Sentiment::Negative
    }
}

/// Connector over the GitHub repository and commit listings
pub struct ActivityConnector {
    github: GitHub,
    config: ActivityConfig,
}

impl ActivityConnector {
    pub fn new(fetcher: SharedFetcher, endpoints: &Endpoints, config: ActivityConfig) -> Self {
        Self {
            github: GitHub::new(fetcher, endpoints),
            config,
        }
    }

    /// Scan `handles` over the window ending at `as_of`
    async fn scan(&self, handles: &[String], as_of: DateTime<Utc>) -> Result<DevActivity, SourceError> {
        let since = (as_of - Duration::days(self.config.window_days)).to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut activity = DevActivity {
            window_days: self.config.window_days,
            ..Default::default()
        };
        let mut authors: HashSet<String> = HashSet::new();
        let mut last_error = None;

        for handle in handles.iter().take(self.config.max_orgs) {
            debug!("Listing repositories for {}", handle);
            let repos = match self.github.recent_repositories(handle, self.config.repos_per_org).await {
                Ok(repos) => repos,
                Err(e) => {
                    warn!("Repository listing for {} unavailable: {}", handle, e);
                    activity.degraded.push(Degradation::new(&format!("repositories:{}", handle), &e));
                    last_error = Some(e);
                    continue;
                }
            };

            activity.orgs.push(handle.clone());
            activity.repositories += repos.len();
            activity.open_issues += repos.iter().map(|r| r.open_issues_count).sum::<u64>();

            let Some(most_active) = repos.iter().find(|r| !r.fork && !r.archived) else {
                continue;
            };
            match self.github.commits_since(&most_active.full_name, &since).await {
                Ok(commits) => {
                    activity.commits += commits.len() as u64;
                    authors.extend(commits.iter().filter_map(|c| c.author_key()));
                    activity.active_repositories.push(most_active.full_name.clone());
                }
                Err(e) => {
                    warn!("Commits for {} unavailable: {}", most_active.full_name, e);
                    activity
                        .degraded
                        .push(Degradation::new(&format!("commits:{}", most_active.full_name), e));
                }
            }
        }

        if activity.orgs.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        activity.contributors = authors.len();
        Ok(activity)
    }
}

#[async_trait]
impl Connector for ActivityConnector {
    type Output = Capability<DevActivity>;

    fn name(&self) -> &'static str {
        "github"
    }

    async fn collect(&self, target: &Target) -> Self::Output {
        let handles = target.github_handles();
        if handles.is_empty() {
            debug!("No source-code organization on record for {}", target.name);
            return Capability::live(DevActivity {
                window_days: self.config.window_days,
                ..Default::default()
            });
        }

        match self.scan(&handles, target.evaluated_at()).await {
            Ok(activity) => {
                info!(
                    "Activity for {}: {} repos, {} commits, {} contributors",
                    target.name, activity.repositories, activity.commits, activity.contributors
                );
                Capability::live(activity)
            }
            Err(e) => {
                warn!("Developer activity unavailable for {}: {}", target.name, e);
                e.into()
            }
        }
    }
}
