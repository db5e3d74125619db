//! Decision stages of the event-logging pipeline.
//!
//! This crate provides:
//! - [`AuditCorrelator`] attributing events to actors via a bounded audit-log lookback
//! - [`PolicyFilter`] applying a guild's ignore lists and conditions
//! - [`RateLimiter`] token buckets keyed by `(guild, category)`

pub mod correlator;
pub mod error;
pub mod policy;
pub mod rate_limit;

pub use correlator::{AuditCorrelator, AuditLogSource};
pub use error::AuditError;
pub use policy::{PolicyFilter, Rejection, Verdict};
pub use rate_limit::RateLimiter;
