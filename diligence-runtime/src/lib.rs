//! Diligence Runtime - Assembles research reports
//!
//! Wires the shared fetcher and the connectors together from a
//! [`DiligenceConfig`] and produces scored [`diligence_core::ResearchReport`]s.

pub mod config;
pub mod researcher;

pub use config::*;
pub use researcher::*;
