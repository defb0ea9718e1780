//! Red-flag rule engine
//!
//! A fixed battery of independent checks over protocol metadata, hack history
//! and funding history. Each rule is a pure function of its context and may
//! emit any number of flags; rule order does not affect the result set.

use chrono::{DateTime, Duration, Utc};

use crate::{format_usd, HackRecord, ProtocolDetail, RedFlag, Severity};

/// Source tag for flags derived from protocol metadata
pub const RULES_SOURCE: &str = "defillama";

/// Trailing window for the TVL decline check
pub const DECLINE_WINDOW_DAYS: i64 = 90;

/// Inputs shared by every rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub detail: &'a ProtocolDetail,
    pub hacks: &'a [HackRecord],
    pub as_of: DateTime<Utc>,
}

type Rule = fn(&RuleContext<'_>) -> Vec<RedFlag>;

/// The standard battery, by name
pub const RULES: &[(&str, Rule)] = &[
    ("chain_concentration", chain_concentration),
    ("tvl_decline", tvl_decline),
    ("protocol_age", protocol_age),
    ("hack_history", hack_history),
    ("no_funding", no_funding),
];

/// Run every rule and collect their flags
pub fn evaluate(ctx: &RuleContext<'_>) -> Vec<RedFlag> {
    let mut flags = Vec::new();
    for (name, rule) in RULES {
        let emitted = rule(ctx);
        if !emitted.is_empty() {
            tracing::debug!("Rule {} emitted {} flag(s)", name, emitted.len());
        }
        flags.extend(emitted);
    }
    flags
}

/// Single-chain deployment or one dominant chain
pub fn chain_concentration(ctx: &RuleContext<'_>) -> Vec<RedFlag> {
    let chains = ctx.detail.real_chain_tvls();
    if chains.len() == 1 {
        return vec![RedFlag::new(
            Severity::Medium,
            "Chain Concentration",
            format!("Deployed on a single chain ({})", chains[0].0),
            RULES_SOURCE,
        )];
    }

    let total: f64 = chains.iter().map(|(_, tvl)| tvl).sum();
    if total <= 0.0 {
        return vec![];
    }
    match chains.first() {
        Some((name, tvl)) if tvl / total > 0.9 => vec![RedFlag::new(
            Severity::Low,
            "Chain Concentration",
            format!(
                "{:.0}% of TVL sits on {} across {} chains",
                tvl / total * 100.0,
                name,
                chains.len()
            ),
            RULES_SOURCE,
        )],
        _ => vec![],
    }
}

/// Peak-to-latest decline inside the trailing window
pub fn tvl_decline(ctx: &RuleContext<'_>) -> Vec<RedFlag> {
    let cutoff = (ctx.as_of - Duration::days(DECLINE_WINDOW_DAYS)).timestamp();
    let window: Vec<f64> = ctx
        .detail
        .tvl
        .iter()
        .filter(|p| p.date >= cutoff)
        .map(|p| p.total_liquidity_usd)
        .collect();
    if window.len() < 2 {
        return vec![];
    }

    let peak = window.iter().copied().fold(f64::MIN, f64::max);
    let latest = window[window.len() - 1];
    if peak <= 0.0 {
        return vec![];
    }
    let decline = (peak - latest) / peak;

    let severity = if decline > 0.5 {
        Severity::High
    } else if decline > 0.3 {
        Severity::Medium
    } else {
        return vec![];
    };

    vec![RedFlag::new(
        severity,
        "TVL Decline",
        format!(
            "TVL fell {:.0}% from its {}-day peak ({} to {})",
            decline * 100.0,
            DECLINE_WINDOW_DAYS,
            format_usd(peak),
            format_usd(latest)
        ),
        RULES_SOURCE,
    )]
}

/// Young protocols, measured from the first TVL data point
pub fn protocol_age(ctx: &RuleContext<'_>) -> Vec<RedFlag> {
    let Some(first) = ctx.detail.tvl.first() else {
        return vec![];
    };
    let age_days = (ctx.as_of.timestamp() - first.date) / 86_400;

    let severity = if age_days < 90 {
        Severity::Medium
    } else if age_days < 180 {
        Severity::Low
    } else {
        return vec![];
    };

    vec![RedFlag::new(
        severity,
        "Protocol Maturity",
        format!("Protocol has only {} days of TVL history", age_days.max(0)),
        RULES_SOURCE,
    )]
}

/// One flag per incident plus one for repeated incidents
pub fn hack_history(ctx: &RuleContext<'_>) -> Vec<RedFlag> {
    let mut flags: Vec<RedFlag> = ctx
        .hacks
        .iter()
        .map(|hack| {
            let severity = if hack.amount > 10_000_000.0 {
                Severity::Critical
            } else if hack.amount > 1_000_000.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            let technique = hack
                .technique
                .as_deref()
                .or(hack.classification.as_deref())
                .unwrap_or("undisclosed technique");
            RedFlag::new(
                severity,
                "Security Incident",
                format!(
                    "{} lost on {} ({})",
                    format_usd(hack.amount),
                    crate::iso_date(hack.date),
                    technique
                ),
                RULES_SOURCE,
            )
        })
        .collect();

    if ctx.hacks.len() > 1 {
        flags.push(RedFlag::new(
            Severity::Medium,
            "Repeated Incidents",
            format!("{} separate security incidents on record", ctx.hacks.len()),
            RULES_SOURCE,
        ));
    }
    flags
}

/// No funding rounds on record
pub fn no_funding(ctx: &RuleContext<'_>) -> Vec<RedFlag> {
    if !ctx.detail.raises.is_empty() {
        return vec![];
    }
    vec![RedFlag::new(
        Severity::Low,
        "Funding",
        "No publicly recorded funding rounds".to_string(),
        RULES_SOURCE,
    )]
}
