//! Composite scoring
//!
//! Six independently bounded dimensions are summed and rescaled to 0–10
//! against the sum of their maxima. Curves are continuous where the input is
//! continuous, with diminishing returns at the top end.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Severity;

/// Sum of every dimension's maximum
pub const NORMALIZATION: f64 = 11.0;

/// A scored dimension with its declared bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    TvlStrength,
    MultiChain,
    SecurityRecord,
    Funding,
    RiskProfile,
    AuditBounty,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Self::TvlStrength,
        Self::MultiChain,
        Self::SecurityRecord,
        Self::Funding,
        Self::RiskProfile,
        Self::AuditBounty,
    ];

    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Self::TvlStrength => (0.0, 2.5),
            Self::MultiChain => (0.0, 1.5),
            Self::SecurityRecord => (-3.0, 2.0),
            Self::Funding => (0.0, 1.5),
            Self::RiskProfile => (-2.0, 2.0),
            Self::AuditBounty => (0.0, 1.5),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TvlStrength => "TVL strength",
            Self::MultiChain => "Multi-chain breadth",
            Self::SecurityRecord => "Security record",
            Self::Funding => "Funding",
            Self::RiskProfile => "Risk profile",
            Self::AuditBounty => "Audit & bounty",
        }
    }
}

/// Everything the scoring function reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub tvl_usd: f64,
    pub chain_count: usize,
    pub hack_count: usize,
    /// Losses after returned funds, summed over incidents
    pub net_loss_usd: f64,
    pub total_raised_usd: f64,
    /// Severities of every red flag; `None` when no red-flag bundle exists
    pub flag_severities: Option<Vec<Severity>>,
    pub audit_count: usize,
    pub bounty_active: bool,
}

/// Per-dimension contributions. Every key is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoreBreakdown {
    pub tvl_strength: f64,
    pub multi_chain: f64,
    pub security_record: f64,
    pub funding: f64,
    pub risk_profile: f64,
    pub audit_bounty: f64,
}

impl ScoreBreakdown {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::TvlStrength => self.tvl_strength,
            Dimension::MultiChain => self.multi_chain,
            Dimension::SecurityRecord => self.security_record,
            Dimension::Funding => self.funding,
            Dimension::RiskProfile => self.risk_profile,
            Dimension::AuditBounty => self.audit_bounty,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    pub fn total(&self) -> f64 {
        self.iter().map(|(_, v)| v).sum()
    }
}

/// Qualitative band for a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreLabel {
    Excellent,
    Good,
    Fair,
    Weak,
}

impl ScoreLabel {
    pub fn for_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Excellent
        } else if score >= 6.0 {
            Self::Good
        } else if score >= 4.0 {
            Self::Fair
        } else {
            Self::Weak
        }
    }
}

impl fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Weak => "Weak",
        };
        f.write_str(s)
    }
}

/// Final score, recomputed from scratch on every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub label: ScoreLabel,
}

/// Score a fully assembled set of inputs
pub fn compute(inputs: &ScoreInputs) -> CompositeScore {
    let breakdown = ScoreBreakdown {
        tvl_strength: tvl_strength(inputs.tvl_usd),
        multi_chain: multi_chain(inputs.chain_count),
        security_record: security_record(inputs.hack_count, inputs.net_loss_usd),
        funding: funding(inputs.total_raised_usd),
        risk_profile: inputs
            .flag_severities
            .as_deref()
            .map(risk_profile)
            .unwrap_or(0.0),
        audit_bounty: audit_bounty(inputs.audit_count, inputs.bounty_active),
    };

    let scaled = (breakdown.total() / NORMALIZATION * 10.0).clamp(0.0, 10.0);
    let score = (scaled * 10.0).round() / 10.0;

    CompositeScore {
        score,
        breakdown,
        label: ScoreLabel::for_score(score),
    }
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Linear ramps between $1M, $100M, $1B and $10B, log taper above
pub fn tvl_strength(tvl: f64) -> f64 {
    const M: f64 = 1_000_000.0;
    const B: f64 = 1_000_000_000.0;
    let value = if tvl < M {
        0.0
    } else if tvl < 100.0 * M {
        lerp(tvl, M, 100.0 * M, 0.0, 1.0)
    } else if tvl < B {
        lerp(tvl, 100.0 * M, B, 1.0, 1.7)
    } else if tvl < 10.0 * B {
        lerp(tvl, B, 10.0 * B, 1.7, 2.0)
    } else {
        2.0 + 0.25 * (tvl / (10.0 * B)).log10()
    };
    value.clamp(0.0, 2.5)
}

/// 0.3 per chain up to 3, slower growth to 10, asymptotic taper beyond
pub fn multi_chain(chains: usize) -> f64 {
    let n = chains as f64;
    let value = if chains <= 1 {
        0.0
    } else if chains <= 3 {
        0.3 * n
    } else if chains <= 10 {
        0.9 + 0.03 * (n - 3.0)
    } else {
        1.11 + 0.39 * (1.0 - 10.0 / n)
    };
    value.clamp(0.0, 1.5)
}

/// Penalty tier by net loss after returned funds
fn loss_penalty(net_loss: f64) -> f64 {
    if net_loss <= 0.0 {
        0.0
    } else if net_loss < 1_000_000.0 {
        0.3
    } else if net_loss < 10_000_000.0 {
        0.8
    } else if net_loss < 100_000_000.0 {
        1.5
    } else {
        2.5
    }
}

pub fn security_record(hack_count: usize, net_loss: f64) -> f64 {
    if hack_count == 0 {
        return 2.0;
    }
    let repeat = 0.3 * (hack_count - 1).min(3) as f64;
    let penalty = 0.5 + loss_penalty(net_loss) + repeat;
    (2.0 - penalty).max(-3.0)
}

pub fn funding(total_raised_usd: f64) -> f64 {
    if total_raised_usd <= 0.0 {
        0.0
    } else if total_raised_usd < 10_000_000.0 {
        0.4
    } else if total_raised_usd < 50_000_000.0 {
        0.8
    } else if total_raised_usd < 100_000_000.0 {
        1.2
    } else {
        1.5
    }
}

fn flag_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 2.0,
        Severity::High => 1.5,
        Severity::Medium => 1.0,
        Severity::Low => 0.5,
    }
}

pub fn risk_profile(severities: &[Severity]) -> f64 {
    let penalty: f64 = severities.iter().copied().map(flag_penalty).sum();
    (2.0 - penalty).max(-2.0)
}

pub fn audit_bounty(audit_count: usize, bounty_active: bool) -> f64 {
    match (audit_count > 0, bounty_active) {
        (true, true) => 1.5,
        (true, false) => 1.0,
        (false, true) => 0.5,
        (false, false) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_security_record_without_hacks() {
        assert_eq!(security_record(0, 0.0), 2.0);
        assert_eq!(security_record(0, 1e12), 2.0);
    }

    #[test]
    fn test_security_record_single_large_hack() {
        // 0.5 base + 1.5 tier, no repeats
        assert!(close(security_record(1, 50_000_000.0), 0.0));
        assert!(close(security_record(1, 15_000_000.0), 0.0));
    }

    #[test]
    fn test_security_record_repeat_cap() {
        let four = security_record(4, 500_000_000.0);
        let nine = security_record(9, 500_000_000.0);
        assert_eq!(four, nine);
        assert!(four >= -3.0);
    }

    #[test]
    fn test_tvl_strength_curve() {
        assert_eq!(tvl_strength(500_000.0), 0.0);
        assert!(close(tvl_strength(2_500_000_000.0), 1.75));
        assert!(close(tvl_strength(1_000_000_000.0), 1.7));
        assert!(tvl_strength(50e9) > tvl_strength(10e9));
        assert!(tvl_strength(1e15) <= 2.5);
        // Monotonic over the ramp boundaries
        let mut prev = 0.0;
        for tvl in [1e6, 5e7, 1e8, 5e8, 1e9, 9e9, 1e10, 1e11] {
            let v = tvl_strength(tvl);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_multi_chain_curve() {
        assert_eq!(multi_chain(0), 0.0);
        assert_eq!(multi_chain(1), 0.0);
        assert!(close(multi_chain(3), 0.9));
        assert!(close(multi_chain(4), 0.93));
        assert!(close(multi_chain(10), 1.11));
        assert!(multi_chain(200) <= 1.5);
        assert!(multi_chain(30) > multi_chain(11));
    }

    #[test]
    fn test_funding_tiers() {
        assert_eq!(funding(0.0), 0.0);
        assert_eq!(funding(5e6), 0.4);
        assert_eq!(funding(20e6), 0.8);
        assert_eq!(funding(75e6), 1.2);
        assert_eq!(funding(100e6), 1.5);
    }

    #[test]
    fn test_risk_profile_floor() {
        assert_eq!(risk_profile(&[]), 2.0);
        assert!(close(risk_profile(&[Severity::High, Severity::Low]), 0.0));
        assert_eq!(risk_profile(&[Severity::Critical; 5]), -2.0);
    }

    #[test]
    fn test_audit_bounty() {
        assert_eq!(audit_bounty(2, true), 1.5);
        assert_eq!(audit_bounty(1, false), 1.0);
        assert_eq!(audit_bounty(0, true), 0.5);
        assert_eq!(audit_bounty(0, false), 0.0);
    }

    #[test]
    fn test_verified_only_scenario() {
        let score = compute(&ScoreInputs {
            tvl_usd: 2_500_000_000.0,
            chain_count: 4,
            ..Default::default()
        });
        assert!(close(score.breakdown.tvl_strength, 1.75));
        assert!(close(score.breakdown.multi_chain, 0.93));
        assert_eq!(score.breakdown.security_record, 2.0);
        assert_eq!(score.breakdown.funding, 0.0);
        assert_eq!(score.breakdown.risk_profile, 0.0);
        // (1.75 + 0.93 + 2.0) / 11 * 10
        assert_eq!(score.score, 4.3);
        assert_eq!(score.label, ScoreLabel::Fair);
    }

    #[test]
    fn test_hack_with_prior_flags_scenario() {
        let score = compute(&ScoreInputs {
            tvl_usd: 0.0,
            hack_count: 1,
            net_loss_usd: 15_000_000.0,
            flag_severities: Some(vec![Severity::High, Severity::Low]),
            ..Default::default()
        });
        assert!(close(score.breakdown.security_record, 0.0));
        assert!(close(score.breakdown.risk_profile, 0.0));
    }

    #[test]
    fn test_score_bounds() {
        let best = compute(&ScoreInputs {
            tvl_usd: 1e15,
            chain_count: 10_000,
            total_raised_usd: 1e9,
            flag_severities: Some(vec![]),
            audit_count: 3,
            bounty_active: true,
            ..Default::default()
        });
        assert!(best.score <= 10.0);
        assert_eq!(best.label, ScoreLabel::Excellent);

        let worst = compute(&ScoreInputs {
            hack_count: 12,
            net_loss_usd: 1e9,
            flag_severities: Some(vec![Severity::Critical; 8]),
            ..Default::default()
        });
        assert_eq!(worst.score, 0.0);
        assert_eq!(worst.label, ScoreLabel::Weak);
        for (dimension, value) in worst.breakdown.iter() {
            let (lo, hi) = dimension.bounds();
            assert!(value >= lo && value <= hi, "{} out of bounds", dimension.label());
        }
    }

    #[test]
    fn test_breakdown_keys_always_present() {
        let score = compute(&ScoreInputs::default());
        let json = serde_json::to_value(score.breakdown).unwrap();
        let keys = json.as_object().unwrap();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys["funding"], 0.0);
    }
}
