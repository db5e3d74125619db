//! Per-guild, per-category logging configuration.
//!
//! One [`GuildEventConfig`] exists for each `(guild_id, category)` pair. It is
//! written by the configuration front end; the pipeline only reads it, apart
//! from the trigger-tracking fields (`last_triggered_at`, `trigger_count`).
//! Every field carries a serde default so partial YAML documents load.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Category;
use crate::ids::{ChannelId, GuildId, RoleId, UserId};

/// Storage key of a configuration record.
pub type ConfigKey = (GuildId, Category);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildEventConfig {
    pub guild_id: GuildId,
    pub category: Category,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub primary_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub ignored_channel_ids: BTreeSet<ChannelId>,
    #[serde(default)]
    pub ignored_role_ids: BTreeSet<RoleId>,
    #[serde(default)]
    pub ignored_user_ids: BTreeSet<UserId>,
    #[serde(default)]
    pub include_bots: bool,
    #[serde(default)]
    pub include_webhook_actors: bool,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Bumped by the front end on every mutation; read-only here.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trigger_count: u64,
}

fn default_retention_days() -> u32 {
    30
}

impl GuildEventConfig {
    /// A disabled record with every option at its default.
    pub fn new(guild_id: GuildId, category: Category) -> Self {
        Self {
            guild_id,
            category,
            enabled: false,
            primary_channel_id: None,
            ignored_channel_ids: BTreeSet::new(),
            ignored_role_ids: BTreeSet::new(),
            ignored_user_ids: BTreeSet::new(),
            include_bots: false,
            include_webhook_actors: false,
            conditions: Conditions::default(),
            rate_limit: RateLimitConfig::default(),
            display: DisplayConfig::default(),
            webhook: WebhookConfig::default(),
            escalation: EscalationConfig::default(),
            retention_days: default_retention_days(),
            version: 0,
            last_triggered_at: None,
            trigger_count: 0,
        }
    }

    pub fn key(&self) -> ConfigKey {
        (self.guild_id, self.category)
    }

    /// Whether at least one delivery target is configured.
    ///
    /// Role pings ride on the primary channel, so they do not count on
    /// their own.
    pub fn has_destination(&self) -> bool {
        self.primary_channel_id.is_some()
            || self.webhook.active_target().is_some()
            || !self.escalation.dm_user_ids.is_empty()
    }

    /// Apply a successful trigger. Commutative: the counter only grows and
    /// the timestamp only moves forward, so concurrent updates can land in
    /// any order.
    pub fn record_trigger(&mut self, at: DateTime<Utc>) {
        self.trigger_count += 1;
        self.last_triggered_at = Some(match self.last_triggered_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

/// Extra conditions an event must satisfy to be logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default)]
    pub min_account_age_secs: Option<u64>,
    #[serde(default)]
    pub min_membership_secs: Option<u64>,
    /// Actor must hold at least one of these roles.
    #[serde(default)]
    pub required_role_ids: BTreeSet<RoleId>,
    /// Actor must hold none of these roles.
    #[serde(default)]
    pub excluded_role_ids: BTreeSet<RoleId>,
    #[serde(default)]
    pub message_length: Option<LengthRange>,
}

/// Inclusive bounds on message content length, in characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRange {
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
}

impl LengthRange {
    pub fn contains(&self, len: usize) -> bool {
        self.min.map_or(true, |min| len >= min) && self.max.map_or(true, |max| len <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_per_minute() -> u32 {
    30
}

fn default_burst() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            per_minute: default_per_minute(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// RGB colour; falls back to [`Category::default_color`].
    #[serde(default)]
    pub embed_color: Option<u32>,
    #[serde(default = "default_true")]
    pub show_timestamp: bool,
    #[serde(default = "default_true")]
    pub show_actor_avatar: bool,
    #[serde(default = "default_true")]
    pub show_thumbnail: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            embed_color: None,
            show_timestamp: true,
            show_actor_avatar: true,
            show_thumbnail: true,
        }
    }
}

/// Where a webhook destination posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebhookTarget {
    Url { url: String },
    Credentials { id: u64, token: String },
}

impl WebhookTarget {
    /// Full URL of the webhook, resolving id+token against `api_base`.
    pub fn url(&self, api_base: &str) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Credentials { id, token } => {
                format!("{}/webhooks/{}/{}", api_base.trim_end_matches('/'), id, token)
            }
        }
    }

    /// Identity safe to log: never includes the token.
    pub fn redacted(&self) -> String {
        match self {
            Self::Url { url } => match url.rsplit_once('/') {
                Some((head, _)) => format!("{head}/***"),
                None => "***".to_string(),
            },
            Self::Credentials { id, .. } => format!("webhook:{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub target: Option<WebhookTarget>,
}

impl WebhookConfig {
    /// Target to post to, if the webhook is enabled and configured.
    pub fn active_target(&self) -> Option<&WebhookTarget> {
        if self.enabled {
            self.target.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default)]
    pub ping_role_ids: Vec<RoleId>,
    #[serde(default)]
    pub dm_user_ids: Vec<UserId>,
}
