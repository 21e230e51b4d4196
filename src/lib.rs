//! Read-only service for ECB euro foreign exchange reference rates.
//!
//! Answers "what was the rate of currency X against the euro on date D",
//! falling back to the most recent earlier publication day when D has no
//! published observation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod observation;
pub mod rate_limiter;
pub mod resolver;
pub mod response;
pub mod retry;
pub mod sdmx_csv;
pub mod upstream;
