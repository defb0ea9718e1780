//! Contract-Verification Connector
//!
//! Checks the protocol's main contract against Sourcify. Only an explicit
//! "not verified" answer raises a flag; a failed check is recorded as
//! `unknown` on the red-flag bundle.

use async_trait::async_trait;
use diligence_core::{ContractCheck, RedFlag, Severity, Target, VerificationStatus};
use diligence_net::{FetchRequest, SharedFetcher};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::{Connector, Endpoints, SourceError};

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

/// Mainnet chain id
const CHAIN_ID: &str = "1";

#[derive(Debug, Deserialize)]
struct ChainStatus {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    chain_ids: Vec<ChainStatus>,
}

impl AddressStatus {
    fn verification(&self) -> Option<VerificationStatus> {
        let statuses = self
            .status
            .iter()
            .chain(self.chain_ids.iter().filter_map(|c| c.status.as_ref()))
            .map(|s| s.to_lowercase());
        let mut seen_false = false;
        for status in statuses {
            match status.as_str() {
                "perfect" | "partial" | "full" | "exact_match" | "match" => {
                    return Some(VerificationStatus::Verified)
                }
                "false" => seen_false = true,
                _ => {}
            }
        }
        seen_false.then_some(VerificationStatus::Unverified)
    }
}

/// Normalize a metadata address. Returns `None` for malformed addresses
/// and for chains other than Ethereum.
pub fn parse_address(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let address = match raw.split_once(':') {
        Some((chain, rest)) if chain.eq_ignore_ascii_case("ethereum") => rest.trim(),
        Some(_) => return None,
        None => raw,
    };
    ADDRESS.is_match(address).then(|| address.to_string())
}

/// High-severity flag for an explicitly unverified contract
pub fn verification_flag(check: &ContractCheck) -> Option<RedFlag> {
    (check.status == VerificationStatus::Unverified).then(|| {
        RedFlag::new(
            Severity::High,
            "Contract Verification",
            format!("Contract {} has no verified source code on Sourcify", check.address),
            "sourcify",
        )
    })
}

pub struct ContractConnector {
    fetcher: SharedFetcher,
    endpoint: String,
}

impl ContractConnector {
    pub fn new(fetcher: SharedFetcher, endpoints: &Endpoints) -> Self {
        Self {
            fetcher,
            endpoint: format!("{}/check-by-addresses", endpoints.sourcify.trim_end_matches('/')),
        }
    }

    async fn status(&self, address: &str) -> Result<VerificationStatus, SourceError> {
        let request = FetchRequest::get(&self.endpoint)
            .param("addresses", address)
            .param("chainIds", CHAIN_ID);
        let statuses: Vec<AddressStatus> = self.fetcher.fetch_json(request).await?;
        statuses
            .iter()
            .find_map(AddressStatus::verification)
            .ok_or_else(|| SourceError::Parse("no verification status in response".to_string()))
    }
}

#[async_trait]
impl Connector for ContractConnector {
    type Output = Option<ContractCheck>;

    fn name(&self) -> &'static str {
        "sourcify"
    }

    async fn collect(&self, target: &Target) -> Option<ContractCheck> {
        let raw = target.detail.as_ref()?.address.as_deref()?;
        let Some(address) = parse_address(raw) else {
            debug!("Skipping contract check for {}: {} is not an Ethereum address", target.name, raw);
            return None;
        };

        let check = match self.status(&address).await {
            Ok(status) => {
                info!("Contract {} verification: {:?}", address, status);
                ContractCheck {
                    address,
                    status,
                    reason: None,
                }
            }
            Err(e) => {
                warn!("Contract check failed for {}: {}", address, e);
                ContractCheck {
                    address,
                    status: VerificationStatus::Unknown,
                    reason: Some(e.to_string()),
                }
            }
        };
        Some(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diligence_core::ProtocolDetail;
    use diligence_net::testing::ScriptedTransport;
    use diligence_net::{FetchConfig, Fetcher, TransportError};
    use serde_json::json;
    use std::sync::Arc;

    const CHECK: &str = "https://sourcify.dev/server/check-by-addresses";
    const ADDR: &str = "0x7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9";

    fn connector(transport: &Arc<ScriptedTransport>) -> ContractConnector {
        let fetcher = Arc::new(Fetcher::with_transport(FetchConfig::default(), transport.clone()));
        ContractConnector::new(fetcher, &Endpoints::default())
    }

    fn target(address: Option<&str>) -> Target {
        Target::new(
            ProtocolDetail {
                name: "Aave".into(),
                address: address.map(str::to_string),
                ..Default::default()
            },
            vec![],
        )
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address(ADDR).as_deref(), Some(ADDR));
        assert_eq!(parse_address(&format!("ethereum:{}", ADDR)).as_deref(), Some(ADDR));
        assert_eq!(parse_address(&format!("arbitrum:{}", ADDR)), None);
        assert_eq!(parse_address("0x1234"), None);
        assert_eq!(parse_address("7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9"), None);
    }

    #[tokio::test]
    async fn test_unverified_raises_high_flag() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(CHECK, json!([{"address": ADDR, "status": "false"}]));

        let check = connector(&transport).collect(&target(Some(ADDR))).await.unwrap();

        assert_eq!(check.status, VerificationStatus::Unverified);
        let flag = verification_flag(&check).unwrap();
        assert_eq!(flag.severity, Severity::High);
        assert_eq!(flag.category, "Contract Verification");

        let sent = &transport.requests()[0];
        assert!(sent.params.contains(&("addresses".to_string(), ADDR.to_string())));
    }

    #[tokio::test]
    async fn test_verified_per_chain_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            CHECK,
            json!([{"address": ADDR, "chainIds": [{"chainId": "1", "status": "perfect"}]}]),
        );

        let check = connector(&transport).collect(&target(Some(ADDR))).await.unwrap();

        assert_eq!(check.status, VerificationStatus::Verified);
        assert!(verification_flag(&check).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_unknown_without_flag() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail(CHECK, TransportError::Connect("reset".into()));

        let check = connector(&transport).collect(&target(Some(ADDR))).await.unwrap();

        assert_eq!(check.status, VerificationStatus::Unknown);
        assert!(check.reason.is_some());
        assert!(verification_flag(&check).is_none());
    }

    #[tokio::test]
    async fn test_missing_or_foreign_address_skipped() {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = connector(&transport);

        assert!(connector.collect(&target(None)).await.is_none());
        assert!(connector
            .collect(&target(Some("solana:So11111111111111111111111111111111111111112")))
            .await
            .is_none());
        assert!(transport.requests().is_empty());
    }
}
