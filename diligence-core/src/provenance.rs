//! Provenance tags and per-capability outcomes
//!
//! Every bundle declares where its data came from, even when empty.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel for a bundle whose sources all failed
pub const UNAVAILABLE: &str = "unavailable";
/// Sentinel for a bundle whose sources answered with nothing
pub const NO_DATA: &str = "no_data";

/// Where a bundle's data came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// One or more named sources, in contribution order
    Sources(Vec<String>),
    /// Every source that was tried failed
    Unavailable,
    /// Sources answered but there was nothing to report
    NoData,
}

impl DataSource {
    pub fn single(name: &str) -> Self {
        Self::Sources(vec![name.to_string()])
    }

    /// Build from contributing source names; empty input yields `fallback`
    pub fn from_sources<I, S>(sources: I, fallback: DataSource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for source in sources {
            let source = source.into();
            if !names.contains(&source) {
                names.push(source);
            }
        }
        if names.is_empty() {
            fallback
        } else {
            Self::Sources(names)
        }
    }

    /// True when at least one live source contributed
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Sources(names) if !names.is_empty())
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sources(names) => write!(f, "{}", names.join(", ")),
            Self::Unavailable => f.write_str(UNAVAILABLE),
            Self::NoData => f.write_str(NO_DATA),
        }
    }
}

impl Serialize for DataSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim() {
            UNAVAILABLE => Self::Unavailable,
            NO_DATA | "" => Self::NoData,
            joined => Self::Sources(
                joined
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        })
    }
}

/// Outcome of one capability inside a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Capability<T> {
    /// The source answered
    Live { value: T },
    /// The source could not be used
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn live(value: T) -> Self {
        Self::Live { value }
    }

    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Live { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Live { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Live { .. } => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for Capability<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::live(value),
            Err(e) => Self::unavailable(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_display() {
        let joined = DataSource::from_sources(["github", "snapshot", "github"], DataSource::NoData);
        assert_eq!(joined.to_string(), "github, snapshot");
        assert_eq!(DataSource::Unavailable.to_string(), "unavailable");
        assert_eq!(
            DataSource::from_sources(Vec::<String>::new(), DataSource::NoData),
            DataSource::NoData
        );
    }

    #[test]
    fn test_data_source_serde() {
        let source = DataSource::Sources(vec!["defillama".into(), "readme".into()]);
        let json = serde_json::to_string(&source).unwrap();
        assert_eq!(json, "\"defillama, readme\"");
        let back: DataSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, source);

        let sentinel: DataSource = serde_json::from_str("\"unavailable\"").unwrap();
        assert!(!sentinel.is_live());
    }

    #[test]
    fn test_capability_from_result() {
        let ok: Capability<u32> = Ok::<u32, String>(3).into();
        assert_eq!(ok.value(), Some(&3));

        let failed: Capability<u32> = Err::<u32, String>("timeout".into()).into();
        assert!(!failed.is_live());
        assert_eq!(failed.reason(), Some("timeout"));
    }
}
