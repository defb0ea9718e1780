//! Diligence Net - Rate-limited HTTP access for research connectors
//!
//! All outbound calls pass through one [`Fetcher`], which keeps a minimum
//! spacing per host and retries transient failures with exponential backoff.

pub mod client;
pub mod request;
pub mod limiter;
pub mod fetcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::*;
pub use request::*;
pub use limiter::RateLimiter;
pub use fetcher::{Fetcher, SharedFetcher};
