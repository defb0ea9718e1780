//! Severity-tagged red flags and the derived risk level

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DataSource;

/// Flag severity, totally ordered: low < medium < high < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single risk indicator. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlag {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub source: String,
}

impl RedFlag {
    pub fn new(severity: Severity, category: &str, description: String, source: &str) -> Self {
        Self {
            severity,
            category: category.to_string(),
            description,
            source: source.to_string(),
        }
    }
}

/// Highest severity among `flags`, `Low` when there are none
pub fn max_severity(flags: &[RedFlag]) -> Severity {
    flags
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::Low)
}

/// Outcome of the contract verification lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Unverified,
    /// The check could not be completed
    Unknown,
}

/// Record of the contract check attached to the red-flag bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCheck {
    pub address: String,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The red-flag bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub flags: Vec<RedFlag>,
    pub risk_level: Severity,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_check: Option<ContractCheck>,
}

impl RiskAssessment {
    pub fn from_flags(flags: Vec<RedFlag>, data_source: DataSource) -> Self {
        let risk_level = max_severity(&flags);
        Self {
            flags,
            risk_level,
            data_source,
            contract_check: None,
        }
    }

    /// Flags ordered most severe first; ties keep emission order
    pub fn sorted_flags(&self) -> Vec<&RedFlag> {
        let mut flags: Vec<&RedFlag> = self.flags.iter().collect();
        flags.sort_by(|a, b| b.severity.cmp(&a.severity));
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(severity: Severity) -> RedFlag {
        RedFlag::new(severity, "Test", "test flag".to_string(), "rules")
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_risk_level_is_max_severity() {
        for top in Severity::ALL {
            let flags: Vec<RedFlag> = Severity::ALL
                .iter()
                .filter(|s| **s <= top)
                .rev()
                .map(|s| flag(*s))
                .collect();
            let assessment = RiskAssessment::from_flags(flags, DataSource::single("rules"));
            assert_eq!(assessment.risk_level, top);
        }
    }

    #[test]
    fn test_empty_flags_is_low() {
        let assessment = RiskAssessment::from_flags(vec![], DataSource::NoData);
        assert_eq!(assessment.risk_level, Severity::Low);
    }

    #[test]
    fn test_serialized_shape() {
        let assessment =
            RiskAssessment::from_flags(vec![flag(Severity::High)], DataSource::single("defillama"));
        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["riskLevel"], "high");
        assert_eq!(json["dataSource"], "defillama");
        assert_eq!(json["flags"][0]["severity"], "high");
    }

    #[test]
    fn test_sorted_flags() {
        let assessment = RiskAssessment::from_flags(
            vec![flag(Severity::Low), flag(Severity::Critical), flag(Severity::Medium)],
            DataSource::NoData,
        );
        let order: Vec<Severity> = assessment.sorted_flags().iter().map(|f| f.severity).collect();
        assert_eq!(order, vec![Severity::Critical, Severity::Medium, Severity::Low]);
    }
}
