//! Output bundles and the assembled report
//!
//! The four research bundles are produced independently by the connectors.
//! The protocol snapshot, confidence, highlights and score are derived here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{
    format_usd, iso_date, scoring, AnalystCoverage, CompositeScore, DataSource, HackRecord,
    ProtocolDetail, RiskAssessment, ScoreInputs,
};

/// A capability that degraded, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub capability: String,
    pub reason: String,
}

impl Degradation {
    pub fn new(capability: &str, reason: impl fmt::Display) -> Self {
        Self {
            capability: capability.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A published security review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub auditor: String,
    pub date: String,
    pub scope: String,
    pub findings_summary: String,
    pub report_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugBounty {
    pub active: bool,
    pub platform: String,
    #[serde(default)]
    pub max_payout: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl BugBounty {
    pub fn inactive(platform: &str) -> Self {
        Self {
            active: false,
            platform: platform.to_string(),
            max_payout: None,
            url: None,
        }
    }
}

/// The audit/security bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSecurity {
    pub audits: Vec<AuditRecord>,
    pub bug_bounty: BugBounty,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Mixed,
    Negative,
}

impl Sentiment {
    /// Majority vote: two of a kind decide, anything else is mixed
    pub fn majority(votes: &[Sentiment]) -> Sentiment {
        let positive = votes.iter().filter(|v| **v == Self::Positive).count();
        let negative = votes.iter().filter(|v| **v == Self::Negative).count();
        if positive >= 2 {
            Self::Positive
        } else if negative >= 2 {
            Self::Negative
        } else {
            Self::Mixed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTopic {
    pub topic: String,
    pub sentiment: Sentiment,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceActivity {
    #[serde(default)]
    pub space: Option<String>,
    pub recent_proposals: u32,
    pub average_votes: f64,
}

/// The community-sentiment bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySentiment {
    pub overall_sentiment: Sentiment,
    pub key_topics: Vec<KeyTopic>,
    pub governance_activity: GovernanceActivity,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvlSample {
    pub date: String,
    pub tvl_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingSummary {
    pub date: String,
    pub round_type: Option<String>,
    pub amount_usd_millions: f64,
    pub lead_investors: Vec<String>,
    pub other_investors: Vec<String>,
    pub valuation: Option<f64>,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub date: String,
    pub amount_lost_usd: f64,
    pub returned_funds_usd: f64,
    pub chain: Vec<String>,
    pub classification: String,
    pub technique: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallmarkSummary {
    pub date: String,
    pub event: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HackSummary {
    pub total_hacks: usize,
    pub total_amount_lost_usd: f64,
    pub total_amount_returned_usd: f64,
    pub incidents: Vec<IncidentSummary>,
}

impl HackSummary {
    pub fn net_loss_usd(&self) -> f64 {
        self.incidents
            .iter()
            .map(|i| (i.amount_lost_usd - i.returned_funds_usd).max(0.0))
            .sum()
    }
}

/// Verified on-chain facts taken straight from the protocol record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    pub name: String,
    pub slug: String,
    pub category: String,
    pub description: String,
    pub url: String,
    pub logo: String,
    /// When the protocol record was read, RFC 3339; empty until stamped
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub queried_at: String,
    pub current_tvl_usd: f64,
    /// Last sample per calendar month inside the requested window
    pub tvl_history: Vec<TvlSample>,
    /// Real chains, largest TVL first
    pub deployed_chains: Vec<String>,
    pub chain_tvl: BTreeMap<String, f64>,
    pub total_raised_usd_millions: f64,
    pub funding_rounds: Vec<FundingSummary>,
    pub hacks: HackSummary,
    /// Milestones from the record, oldest first
    pub hallmarks: Vec<HallmarkSummary>,
}

impl ProtocolSnapshot {
    /// Build from the protocol record keeping the last `history_days` TVL points
    pub fn from_detail(detail: &ProtocolDetail, hacks: &[HackRecord], history_days: usize) -> Self {
        let start = detail.tvl.len().saturating_sub(history_days);
        let mut monthly: BTreeMap<String, TvlSample> = BTreeMap::new();
        for point in &detail.tvl[start..] {
            let date = iso_date(point.date);
            monthly.insert(
                date[..7].to_string(),
                TvlSample {
                    date,
                    tvl_usd: point.total_liquidity_usd,
                },
            );
        }

        let chains = detail.real_chain_tvls();

        let mut funding_rounds: Vec<FundingSummary> = detail
            .raises
            .iter()
            .map(|r| FundingSummary {
                date: iso_date(r.date),
                round_type: r.round.clone(),
                amount_usd_millions: r.amount,
                lead_investors: r.lead_investors.clone(),
                other_investors: r.other_investors.clone(),
                valuation: r.valuation,
                source_url: r.source.clone().unwrap_or_default(),
            })
            .collect();
        funding_rounds.sort_by(|a, b| a.date.cmp(&b.date));

        let mut incidents: Vec<IncidentSummary> = hacks
            .iter()
            .map(|h| IncidentSummary {
                date: iso_date(h.date),
                amount_lost_usd: h.amount,
                returned_funds_usd: h.returned_funds,
                chain: h.chain.clone(),
                classification: h.classification.clone().unwrap_or_default(),
                technique: h.technique.clone().unwrap_or_default(),
                source_url: h.source.clone().unwrap_or_default(),
            })
            .collect();
        incidents.sort_by(|a, b| b.date.cmp(&a.date));

        let mut hallmarks = detail.hallmarks.clone();
        hallmarks.sort_by_key(|h| h.date);

        Self {
            name: detail.name.clone(),
            slug: detail.slug(),
            category: detail
                .category
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            description: detail.description.clone().unwrap_or_default(),
            url: detail.url.clone().unwrap_or_default(),
            logo: detail.logo.clone().unwrap_or_default(),
            queried_at: String::new(),
            current_tvl_usd: detail.current_tvl(),
            tvl_history: monthly.into_values().collect(),
            deployed_chains: chains.iter().map(|(name, _)| name.clone()).collect(),
            chain_tvl: chains.into_iter().collect(),
            total_raised_usd_millions: detail.raises.iter().map(|r| r.amount).sum(),
            funding_rounds,
            hacks: HackSummary {
                total_hacks: incidents.len(),
                total_amount_lost_usd: incidents.iter().map(|i| i.amount_lost_usd).sum(),
                total_amount_returned_usd: incidents.iter().map(|i| i.returned_funds_usd).sum(),
                incidents,
            },
            hallmarks: hallmarks
                .into_iter()
                .map(|h| HallmarkSummary {
                    date: iso_date(h.date),
                    event: h.event,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// The research bundles produced by the connectors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_coverage: Option<AnalystCoverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_security: Option<AuditSecurity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_sentiment: Option<CommunitySentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<RiskAssessment>,
}

impl ResearchSections {
    fn data_sources(&self) -> Vec<&DataSource> {
        let mut sources = Vec::new();
        if let Some(s) = &self.analyst_coverage {
            sources.push(&s.data_source);
        }
        if let Some(s) = &self.audit_security {
            sources.push(&s.data_source);
        }
        if let Some(s) = &self.community_sentiment {
            sources.push(&s.data_source);
        }
        if let Some(s) = &self.red_flags {
            sources.push(&s.data_source);
        }
        sources
    }

    /// Confidence from how many included bundles used live data
    pub fn confidence(&self) -> (Confidence, &'static str) {
        let sources = self.data_sources();
        if sources.is_empty() {
            return (Confidence::High, "Verified protocol data only; third-party research not requested");
        }
        let degraded = sources.iter().filter(|s| !s.is_live()).count();
        match degraded {
            0 => (Confidence::High, "All data sections populated with live data"),
            1 | 2 => (Confidence::Medium, "Some third-party data sources were unavailable"),
            _ => (Confidence::Low, "Most third-party sections could not be populated"),
        }
    }
}

/// The fully assembled report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub report_id: String,
    pub generated_at: String,
    pub protocol: ProtocolSnapshot,
    #[serde(flatten)]
    pub sections: ResearchSections,
    pub confidence: Confidence,
    pub confidence_reason: String,
    pub top_risks: Vec<String>,
    pub positive_signals: Vec<String>,
    pub score: CompositeScore,
}

impl ResearchReport {
    pub fn assemble(
        report_id: String,
        generated_at: String,
        protocol: ProtocolSnapshot,
        sections: ResearchSections,
    ) -> Self {
        let (confidence, reason) = sections.confidence();
        let inputs = score_inputs(&protocol, &sections);
        Self {
            report_id,
            generated_at,
            top_risks: top_risks(&protocol, &sections),
            positive_signals: positive_signals(&protocol, &sections),
            confidence,
            confidence_reason: reason.to_string(),
            score: scoring::compute(&inputs),
            protocol,
            sections,
        }
    }

    /// Recompute the score from the report's current contents
    pub fn rescore(&self) -> CompositeScore {
        scoring::compute(&score_inputs(&self.protocol, &self.sections))
    }
}

/// Collect scoring inputs from an assembled report
pub fn score_inputs(protocol: &ProtocolSnapshot, sections: &ResearchSections) -> ScoreInputs {
    ScoreInputs {
        tvl_usd: protocol.current_tvl_usd,
        chain_count: protocol.deployed_chains.len(),
        hack_count: protocol.hacks.total_hacks,
        net_loss_usd: protocol.hacks.net_loss_usd(),
        total_raised_usd: protocol.total_raised_usd_millions * 1_000_000.0,
        flag_severities: sections
            .red_flags
            .as_ref()
            .map(|r| r.flags.iter().map(|f| f.severity).collect()),
        audit_count: sections
            .audit_security
            .as_ref()
            .map(|a| a.audits.len())
            .unwrap_or(0),
        bounty_active: sections
            .audit_security
            .as_ref()
            .map(|a| a.bug_bounty.active)
            .unwrap_or(false),
    }
}

/// Risk statements, most severe first
pub fn top_risks(protocol: &ProtocolSnapshot, sections: &ResearchSections) -> Vec<String> {
    let mut risks = Vec::new();

    if let Some(red_flags) = &sections.red_flags {
        for flag in red_flags.sorted_flags() {
            risks.push(format!(
                "[{}] {}: {}",
                flag.severity.as_str().to_uppercase(),
                flag.category,
                flag.description
            ));
        }
    }

    if protocol.hacks.total_amount_lost_usd > 0.0 {
        risks.push(format!(
            "Historical security incidents with {} in total losses",
            format_usd(protocol.hacks.total_amount_lost_usd)
        ));
    }

    if protocol.total_raised_usd_millions == 0.0 {
        risks.push("No publicly recorded funding rounds".to_string());
    }

    risks
}

pub fn positive_signals(protocol: &ProtocolSnapshot, sections: &ResearchSections) -> Vec<String> {
    let mut signals = Vec::new();

    let tvl = protocol.current_tvl_usd;
    if tvl >= 1_000_000_000.0 {
        signals.push(format!("Strong TVL of {} indicates significant market trust", format_usd(tvl)));
    } else if tvl >= 100_000_000.0 {
        signals.push(format!("Healthy TVL of {} shows established market presence", format_usd(tvl)));
    }

    let chains = protocol.deployed_chains.len();
    if chains >= 5 {
        signals.push(format!("Broad multi-chain deployment across {} networks", chains));
    } else if chains >= 2 {
        signals.push(format!("Multi-chain presence across {} networks", chains));
    }

    if let Some(audit) = &sections.audit_security {
        if audit.bug_bounty.active {
            signals.push(format!(
                "Active bug bounty program on {} (max {})",
                audit.bug_bounty.platform,
                audit.bug_bounty.max_payout.as_deref().unwrap_or("N/A")
            ));
        }
    }

    if let Some(sentiment) = &sections.community_sentiment {
        if sentiment.overall_sentiment == Sentiment::Positive {
            signals.push("Positive development and community activity".to_string());
        }
    }

    if protocol.total_raised_usd_millions > 0.0 {
        signals.push(format!(
            "Raised ${:.0}M in funding from institutional investors",
            protocol.total_raised_usd_millions
        ));
    }

    signals
}
