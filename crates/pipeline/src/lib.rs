//! Event-logging pipeline wiring.
//!
//! This crate provides:
//! - [`ConfigStore`] and the YAML-seeded [`MemoryConfigStore`]
//! - [`Pipeline`], running one event through correlation, policy, rate
//!   limiting, composition and delivery
//! - [`EventQueue`], a bounded work queue in front of the pipeline
//! - [`HttpAuditLog`], the REST-backed audit-log source

pub mod audit_http;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod stats;
pub mod store;

pub use audit_http::HttpAuditLog;
pub use error::{LoadResult, LoadStatus, StoreError};
pub use pipeline::{Pipeline, PipelineOutcome, SkipReason};
pub use queue::{EventQueue, QueueClosed};
pub use stats::{PipelineStats, StatsSnapshot};
pub use store::{ConfigStore, MemoryConfigStore};
