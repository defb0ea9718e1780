//! Diligence Sources - Connectors to third-party research providers
//!
//! Each connector turns one provider's data into a typed signal and folds
//! its failures into degraded capabilities instead of errors:
//! - **Activity**: GitHub repositories, open issues and recent commits
//! - **Governance**: Snapshot proposal participation
//! - **Audits**: audit-firm repositories and the Immunefi bounty page
//! - **Contracts**: Sourcify verification of the main contract
//! - **Coverage**: metadata and README links

mod github;

pub mod traits;
pub mod activity;
pub mod governance;
pub mod sentiment;
pub mod audits;
pub mod contracts;
pub mod discovery;

pub use traits::*;
pub use activity::{ActivityConnector, DevActivity};
pub use governance::GovernanceConnector;
pub use sentiment::{community_sentiment, SentimentConnector};
pub use audits::AuditConnector;
pub use contracts::{verification_flag, ContractConnector};
pub use discovery::CoverageConnector;
