//! Shared model for the guild event-logging pipeline.
//!
//! Identifiers, raw events, audit records and the per-guild configuration
//! record live here so the rules, notify and pipeline crates agree on one
//! vocabulary.

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod guild_config;
pub mod ids;

pub use audit::{AuditAction, AuditLogEntry, AuditMatch, Confidence};
pub use config::Settings;
pub use error::{CoreError, Result};
pub use event::{ActorKind, Category, EventKind, FieldChange, RawEvent, TargetKind, UserRef};
pub use guild_config::{
    ConfigKey, Conditions, DisplayConfig, EscalationConfig, GuildEventConfig, LengthRange,
    RateLimitConfig, WebhookConfig, WebhookTarget,
};
pub use ids::{ChannelId, GuildId, RoleId, UserId};
