//! Protocol records supplied by the upstream TVL aggregator
//!
//! These mirror the provider's JSON field names and make every defaulting
//! rule explicit: missing numbers become `0.0`, missing lists become empty.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Keys in `currentChainTvls` that are accounting buckets rather than chains
pub const AGGREGATE_TVL_KEYS: &[&str] = &[
    "borrowed",
    "staking",
    "pool2",
    "vesting",
    "offers",
    "treasury",
    "doublecounted",
    "liquidstaking",
    "dcandlsoverlap",
];

/// One point of the TVL time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvlPoint {
    /// Unix timestamp (seconds)
    #[serde(deserialize_with = "de_timestamp")]
    pub date: i64,
    /// Total value locked in USD
    #[serde(rename = "totalLiquidityUSD", default, deserialize_with = "de_amount")]
    pub total_liquidity_usd: f64,
}

/// A funding round. `amount` is expressed in millions of USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRound {
    #[serde(deserialize_with = "de_timestamp")]
    pub date: i64,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(default, deserialize_with = "de_string_list")]
    pub lead_investors: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub other_investors: Vec<String>,
    #[serde(default)]
    pub valuation: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

impl FundingRound {
    /// Round size in USD
    pub fn amount_usd(&self) -> f64 {
        self.amount * 1_000_000.0
    }
}

/// A dated milestone pinned to the protocol's TVL chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hallmark {
    pub date: i64,
    pub event: String,
}

impl Hallmark {
    /// Read a `[timestamp, "event", ...]` pair, or a `{date, event}` object.
    /// Entries with fewer than two parts or unusable parts yield `None`.
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        let (date, event) = match value {
            Value::Array(parts) if parts.len() >= 2 => (&parts[0], &parts[1]),
            Value::Object(map) => (map.get("date")?, map.get("event")?),
            _ => return None,
        };
        let date = match date {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
            Value::String(s) => s.trim().parse::<f64>().ok()? as i64,
            _ => return None,
        };
        let event = match event {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!event.is_empty()).then_some(Self { date, event })
    }
}

/// Canonical protocol record. Immutable for the duration of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDetail {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    /// Source-code organization handles
    #[serde(default, deserialize_with = "de_string_list")]
    pub github: Vec<String>,
    /// `platform:identifier` strings, e.g. `snapshot:aave.eth`
    #[serde(rename = "governanceID", default, deserialize_with = "de_string_list")]
    pub governance_id: Vec<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "audit_links", default, deserialize_with = "de_string_list")]
    pub audit_links: Vec<String>,
    #[serde(default)]
    pub tvl: Vec<TvlPoint>,
    #[serde(default)]
    pub current_chain_tvls: BTreeMap<String, f64>,
    #[serde(default)]
    pub raises: Vec<FundingRound>,
    #[serde(default, deserialize_with = "de_hallmarks")]
    pub hallmarks: Vec<Hallmark>,
}

impl ProtocolDetail {
    /// Slug used in provider URLs, derived from the name when absent
    pub fn slug(&self) -> String {
        match &self.slug {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => self.name.trim().to_lowercase().replace(' ', "-"),
        }
    }

    /// Latest TVL value, `0.0` without history
    pub fn current_tvl(&self) -> f64 {
        self.tvl.last().map(|p| p.total_liquidity_usd).unwrap_or(0.0)
    }

    /// Real chains with their TVL, largest first
    pub fn real_chain_tvls(&self) -> Vec<(String, f64)> {
        let mut chains: Vec<(String, f64)> = self
            .current_chain_tvls
            .iter()
            .filter(|(key, _)| is_real_chain(key))
            .map(|(key, value)| (key.clone(), *value))
            .collect();
        chains.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        chains
    }

    /// Sum of all funding rounds in USD
    pub fn total_raised_usd(&self) -> f64 {
        self.raises.iter().map(FundingRound::amount_usd).sum()
    }
}

/// True when a `currentChainTvls` key names an actual chain
pub fn is_real_chain(key: &str) -> bool {
    if key.contains('-') {
        return false;
    }
    let lowered = key.to_lowercase();
    !AGGREGATE_TVL_KEYS.contains(&lowered.as_str())
}

/// A historical security incident
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HackRecord {
    #[serde(deserialize_with = "de_timestamp")]
    pub date: i64,
    #[serde(default)]
    pub name: Option<String>,
    /// Loss in USD
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub returned_funds: f64,
    #[serde(default, deserialize_with = "de_string_list")]
    pub chain: Vec<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub technique: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl HackRecord {
    /// Loss after returned funds, never negative
    pub fn net_loss(&self) -> f64 {
        (self.amount - self.returned_funds).max(0.0)
    }
}

/// Everything the connectors and rules need to know about one protocol
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub name: String,
    pub detail: Option<ProtocolDetail>,
    pub hacks: Vec<HackRecord>,
    /// Evaluation time of the run; unset means the wall clock
    pub as_of: Option<DateTime<Utc>>,
}

impl Target {
    pub fn new(detail: ProtocolDetail, hacks: Vec<HackRecord>) -> Self {
        Self {
            name: detail.name.clone(),
            detail: Some(detail),
            hacks,
            as_of: None,
        }
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// The pinned evaluation time, or now
    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Source-code handles, trimmed and de-duplicated in order
    pub fn github_handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = Vec::new();
        if let Some(detail) = &self.detail {
            for handle in &detail.github {
                let handle = handle.trim().trim_start_matches('@').to_string();
                if !handle.is_empty() && !handles.iter().any(|h| h.eq_ignore_ascii_case(&handle)) {
                    handles.push(handle);
                }
            }
        }
        handles
    }

    pub fn slug(&self) -> String {
        match &self.detail {
            Some(detail) => detail.slug(),
            None => self.name.trim().to_lowercase().replace(' ', "-"),
        }
    }
}

/// Convert a unix timestamp to a UTC datetime, clamping invalid values to the epoch
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

/// `YYYY-MM-DD` for a unix timestamp
pub fn iso_date(ts: i64) -> String {
    timestamp_to_datetime(ts).format("%Y-%m-%d").to_string()
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => Ok(n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0)),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f as i64)
            .map_err(serde::de::Error::custom),
        _ => Ok(0),
    }
}

fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Keeps the well-formed entries of a hallmark list; anything else is empty
fn de_hallmarks<'de, D>(deserializer: D) -> Result<Vec<Hallmark>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(entries)) => entries.iter().filter_map(Hallmark::from_value).collect(),
        _ => Vec::new(),
    })
}

/// Accepts a list, a single string, or null
fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}
