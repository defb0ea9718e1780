//! Audit/Bounty Connector
//!
//! Audits are found by searching the public repositories of known audit
//! firms. The bounty program is checked by fetching the platform page
//! directly, which may come back as HTML or JSON.

use async_trait::async_trait;
use diligence_core::{AuditRecord, AuditSecurity, BugBounty, Capability, DataSource, Degradation, Target};
use diligence_net::SharedFetcher;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::github::{GitHub, Repository};
use crate::{Connector, Endpoints, SourceError};

/// Audit-firm accounts searched, with display names
pub const AUDIT_FIRMS: &[(&str, &str)] = &[
    ("code-423n4", "Code4rena"),
    ("sherlock-audit", "Sherlock"),
    ("spearbit", "Spearbit"),
    ("trailofbits", "Trail of Bits"),
    ("Cyfrin", "Cyfrin"),
    ("pashov", "Pashov Audit Group"),
    ("ConsenSys", "ConsenSys Diligence"),
];

pub const BOUNTY_PLATFORM: &str = "Immunefi";

const SEARCH_LIMIT: usize = 30;

static PAYOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)max(?:imum)?\s+bounty\D{0,40}?\$\s?([\d,]+(?:\.\d+)?(?:\s?(?-i:[KMB])\b)?)").unwrap()
});

fn auditor_name(login: &str) -> String {
    AUDIT_FIRMS
        .iter()
        .find(|(account, _)| account.eq_ignore_ascii_case(login))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| login.to_string())
}

/// Search keyword for a target: the first segment of its slug
pub fn search_term(target: &Target) -> String {
    let slug = target.slug();
    slug.split('-').next().unwrap_or(&slug).to_string()
}

/// Keep firm repositories naming the protocol; drop judging and findings companions.
/// De-duplicated by URL and ordered by last update, newest first.
fn select_audits(term: &str, repos: Vec<Repository>) -> Vec<AuditRecord> {
    let term = term.to_lowercase();
    let mut seen = HashSet::new();
    let mut repos: Vec<Repository> = repos
        .into_iter()
        .filter(|r| {
            let name = r.name.to_lowercase();
            name.contains(&term) && !name.contains("judging") && !name.contains("findings")
        })
        .filter(|r| seen.insert(r.html_url.trim_end_matches('/').to_lowercase()))
        .collect();
    repos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    repos
        .into_iter()
        .map(|r| AuditRecord {
            auditor: auditor_name(&r.owner.login),
            date: r
                .updated_at
                .as_deref()
                .map(|d| d.chars().take(10).collect())
                .unwrap_or_default(),
            scope: r.name.clone(),
            findings_summary: r
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "See repository for findings".to_string()),
            report_url: r.html_url,
        })
        .collect()
}

/// Maximum payout mentioned on a bounty page, HTML or JSON
pub fn parse_max_payout(body: &str, is_json: bool) -> Option<String> {
    if is_json {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let payout = value.get("maxBounty").or_else(|| value.get("max_bounty"))?;
        return match payout {
            serde_json::Value::Number(n) => n.as_f64().map(diligence_core::format_usd),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        };
    }

    let document = Html::parse_document(body);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    PAYOUT
        .captures(&text)
        .map(|cap| format!("${}", cap[1].split_whitespace().collect::<String>()))
}

pub struct AuditConnector {
    fetcher: SharedFetcher,
    github: GitHub,
    bounty_base: String,
}

impl AuditConnector {
    pub fn new(fetcher: SharedFetcher, endpoints: &Endpoints) -> Self {
        Self {
            github: GitHub::new(fetcher.clone(), endpoints),
            fetcher,
            bounty_base: endpoints.bounty_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn audits(&self, target: &Target) -> Capability<Vec<AuditRecord>> {
        let term = search_term(target);
        if term.is_empty() {
            return Capability::unavailable(SourceError::NotListed("protocol has no searchable name".into()));
        }
        let firms = AUDIT_FIRMS
            .iter()
            .map(|(account, _)| format!("user:{}", account))
            .collect::<Vec<_>>()
            .join(" ");
        let query = format!("{} in:name {}", term, firms);

        debug!("Searching audit repositories for {}", term);
        match self.github.search_repositories(&query, "updated", SEARCH_LIMIT).await {
            Ok(repos) => Capability::live(select_audits(&term, repos)),
            Err(e) => {
                warn!("Audit search unavailable for {}: {}", term, e);
                e.into()
            }
        }
    }

    /// Check the bounty page. A 404 means there is no program.
    pub async fn bounty(&self, target: &Target) -> Capability<BugBounty> {
        let url = format!("{}/{}/", self.bounty_base, target.slug());
        debug!("Probing bounty page {}", url);

        match self.fetcher.get(&url).await {
            Ok(response) => Capability::live(BugBounty {
                active: true,
                platform: BOUNTY_PLATFORM.to_string(),
                max_payout: parse_max_payout(&response.body, response.is_json()),
                url: Some(url),
            }),
            Err(e) if e.is_not_found() => {
                debug!("No bounty program at {}", url);
                Capability::live(BugBounty::inactive(BOUNTY_PLATFORM))
            }
            Err(e) => {
                warn!("Bounty check failed for {}: {}", url, e);
                Capability::unavailable(e)
            }
        }
    }
}

#[async_trait]
impl Connector for AuditConnector {
    type Output = AuditSecurity;

    fn name(&self) -> &'static str {
        "audits"
    }

    async fn collect(&self, target: &Target) -> AuditSecurity {
        let (audits, bounty) = futures::join!(self.audits(target), self.bounty(target));

        let mut sources = Vec::new();
        let mut degraded = Vec::new();

        let audits = match audits {
            Capability::Live { value } => {
                sources.push("github");
                value
            }
            Capability::Unavailable { reason } => {
                degraded.push(Degradation::new("audits", reason));
                Vec::new()
            }
        };
        let bug_bounty = match bounty {
            Capability::Live { value } => {
                sources.push("immunefi");
                value
            }
            Capability::Unavailable { reason } => {
                degraded.push(Degradation::new("bug_bounty", reason));
                BugBounty::inactive(BOUNTY_PLATFORM)
            }
        };

        info!(
            "Audit/security for {}: {} audits, bounty active: {}",
            target.name,
            audits.len(),
            bug_bounty.active
        );

        AuditSecurity {
            audits,
            bug_bounty,
            data_source: DataSource::from_sources(sources, DataSource::Unavailable),
            degraded,
        }
    }
}
