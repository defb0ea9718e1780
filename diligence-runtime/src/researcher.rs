//! Research run
//!
//! Runs the connectors for one protocol concurrently over a shared fetcher,
//! builds the red-flag bundle from the rule engine and the contract check,
//! and assembles the scored report.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::info;

use diligence_core::rules::{self, RuleContext, RULES_SOURCE};
use diligence_core::{
    ContractCheck, DataSource, HackRecord, ProtocolDetail, ProtocolSnapshot, ResearchReport,
    ResearchSections, RiskAssessment, Target, VerificationStatus,
};
use diligence_net::{Fetcher, SharedFetcher};
use diligence_sources::{
    verification_flag, ActivityConnector, AuditConnector, Connector, ContractConnector, CoverageConnector,
    GovernanceConnector, SentimentConnector,
};

use crate::DiligenceConfig;

/// Which sections a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchMode {
    /// Protocol data plus all third-party research
    Full,
    /// Protocol data only; no third-party calls
    VerifiedOnly,
}

/// Build the red-flag bundle from the rule battery and the contract check
pub fn risk_assessment(
    detail: &ProtocolDetail,
    hacks: &[HackRecord],
    contract_check: Option<ContractCheck>,
    as_of: DateTime<Utc>,
) -> RiskAssessment {
    let mut flags = rules::evaluate(&RuleContext { detail, hacks, as_of });
    let mut sources = vec![RULES_SOURCE];

    if let Some(check) = &contract_check {
        if check.status != VerificationStatus::Unknown {
            sources.push("sourcify");
        }
        flags.extend(verification_flag(check));
    }

    let mut assessment = RiskAssessment::from_flags(flags, DataSource::from_sources(sources, DataSource::NoData));
    assessment.contract_check = contract_check;
    assessment
}

pub struct Researcher {
    coverage: CoverageConnector,
    audits: AuditConnector,
    sentiment: SentimentConnector,
    contracts: ContractConnector,
    history_days: usize,
}

impl Researcher {
    /// Create a researcher with a reqwest-backed fetcher
    pub fn new(config: &DiligenceConfig) -> Result<Self> {
        let fetch_config = config.fetch.to_fetch_config()?;
        let fetcher = Fetcher::new(fetch_config).context("Failed to create HTTP fetcher")?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a researcher over an existing fetcher
    pub fn with_fetcher(config: &DiligenceConfig, fetcher: SharedFetcher) -> Self {
        let endpoints = &config.endpoints;
        let activity = ActivityConnector::new(fetcher.clone(), endpoints, config.activity.clone());
        let governance = GovernanceConnector::new(fetcher.clone(), endpoints);
        Self {
            coverage: CoverageConnector::new(fetcher.clone(), endpoints, config.activity.max_orgs),
            audits: AuditConnector::new(fetcher.clone(), endpoints),
            sentiment: SentimentConnector::new(activity, governance),
            contracts: ContractConnector::new(fetcher, endpoints),
            history_days: config.report.history_days,
        }
    }

    /// Produce a report for `target`. Fails only when the target has no protocol record.
    pub async fn research(&self, target: &Target, mode: ResearchMode) -> Result<ResearchReport> {
        self.research_at(target, mode, Utc::now()).await
    }

    /// As [`Researcher::research`], with an explicit evaluation time
    pub async fn research_at(
        &self,
        target: &Target,
        mode: ResearchMode,
        as_of: DateTime<Utc>,
    ) -> Result<ResearchReport> {
        let detail = target
            .detail
            .as_ref()
            .with_context(|| format!("No protocol record for '{}'", target.name))?;

        info!("Researching {} ({:?})", target.name, mode);
        let target = &target.clone().with_as_of(as_of);
        let mut protocol = ProtocolSnapshot::from_detail(detail, &target.hacks, self.history_days);
        protocol.queried_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let sections = match mode {
            ResearchMode::VerifiedOnly => ResearchSections::default(),
            ResearchMode::Full => {
                let (analyst_coverage, audit_security, community_sentiment, contract_check) = futures::join!(
                    self.coverage.collect(target),
                    self.audits.collect(target),
                    self.sentiment.collect(target),
                    self.contracts.collect(target),
                );
                ResearchSections {
                    analyst_coverage: Some(analyst_coverage),
                    audit_security: Some(audit_security),
                    community_sentiment: Some(community_sentiment),
                    red_flags: Some(risk_assessment(detail, &target.hacks, contract_check, as_of)),
                }
            }
        };

        let report = ResearchReport::assemble(
            uuid::Uuid::new_v4().to_string(),
            as_of.to_rfc3339_opts(SecondsFormat::Secs, true),
            protocol,
            sections,
        );
        info!(
            "Report for {}: score {} ({:?}), confidence {:?}",
            target.name, report.score.score, report.score.label, report.confidence
        );
        Ok(report)
    }
}
