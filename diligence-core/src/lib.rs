//! Diligence Core - Domain model and scoring for DeFi due diligence
//!
//! This crate provides the pure, I/O-free parts of a research run:
//! - Protocol records and hack history as supplied upstream
//! - Provenance tags and per-capability outcomes
//! - Coverage link aggregation with source-priority de-duplication
//! - The red-flag rule engine
//! - The composite 0–10 scoring function

pub mod model;
pub mod provenance;
pub mod flags;
pub mod rules;
pub mod coverage;
pub mod scoring;
pub mod report;

pub use model::*;
pub use provenance::*;
pub use flags::*;
pub use coverage::*;
pub use scoring::{CompositeScore, Dimension, ScoreBreakdown, ScoreInputs, ScoreLabel};
pub use report::*;

/// Default number of TVL points kept in the report history
pub const DEFAULT_HISTORY_DAYS: usize = 180;

/// Format dollar amounts as `$27.7B`, `$45.3M`, `$8.5K` or `$750`
pub fn format_usd(amount: f64) -> String {
    if amount == 0.0 || !amount.is_finite() {
        return "$0".to_string();
    }
    let abs = amount.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.1}B", amount / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.1}M", amount / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.1}K", amount / 1_000.0)
    } else {
        format!("${:.0}", amount)
    }
}
