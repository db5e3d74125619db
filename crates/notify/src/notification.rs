//! Destination-agnostic notification model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use guildwatch_core::{
    Category, ChannelId, DisplayConfig, EventKind, GuildEventConfig, GuildId, RoleId, UserId,
    WebhookTarget,
};

/// One name/value pair shown with the notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl NotificationField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }

    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inline: true,
            ..Self::new(name, value)
        }
    }
}

/// Who performed the action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub user_id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A delivery target resolved from a guild's configuration.
///
/// Serializes as its redacted label so reports can be logged or exported
/// without leaking webhook tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Channel { channel_id: ChannelId },
    Webhook { target: WebhookTarget },
    /// Lightweight follow-up in the primary channel mentioning roles.
    RolePing { channel_id: ChannelId, role_ids: Vec<RoleId> },
    DirectMessage { user_id: UserId },
}

impl Destination {
    /// Every destination enabled in `config`, primary channel first.
    pub fn resolve(config: &GuildEventConfig) -> Vec<Destination> {
        let mut destinations = Vec::new();

        if let Some(channel_id) = config.primary_channel_id {
            destinations.push(Destination::Channel { channel_id });
        }

        if let Some(target) = config.webhook.active_target() {
            destinations.push(Destination::Webhook {
                target: target.clone(),
            });
        }

        if let Some(channel_id) = config.primary_channel_id {
            if !config.escalation.ping_role_ids.is_empty() {
                destinations.push(Destination::RolePing {
                    channel_id,
                    role_ids: config.escalation.ping_role_ids.clone(),
                });
            }
        }

        for user_id in &config.escalation.dm_user_ids {
            destinations.push(Destination::DirectMessage { user_id: *user_id });
        }

        destinations
    }

    /// Short label for logs: never contains webhook tokens.
    pub fn label(&self) -> String {
        match self {
            Self::Channel { channel_id } => format!("channel:{channel_id}"),
            Self::Webhook { target } => target.redacted(),
            Self::RolePing { channel_id, .. } => format!("role_ping:{channel_id}"),
            Self::DirectMessage { user_id } => format!("dm:{user_id}"),
        }
    }
}

impl Serialize for Destination {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// A composed notification, ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub guild_id: GuildId,
    pub category: Category,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    pub fields: Vec<NotificationField>,
    pub color: u32,
    /// When the underlying action happened, not when it was processed.
    pub timestamp: DateTime<Utc>,
    pub actor: Option<Attribution>,
    pub reason: Option<String>,
    pub thumbnail_url: Option<String>,
    pub display: DisplayConfig,
    #[serde(skip)]
    pub destinations: Vec<Destination>,
}

impl Notification {
    /// Fixed sample used to check a guild's destinations end to end.
    pub fn sample(config: &GuildEventConfig) -> Self {
        Self {
            guild_id: config.guild_id,
            category: config.category,
            kind: sample_kind(config.category),
            title: "Test notification".to_string(),
            description: format!(
                "Logging for **{}** is configured to deliver here.",
                config.category
            ),
            fields: vec![NotificationField::inline("Category", config.category.as_str())],
            color: config
                .display
                .embed_color
                .unwrap_or_else(|| config.category.default_color()),
            timestamp: Utc::now(),
            actor: None,
            reason: None,
            thumbnail_url: None,
            display: config.display.clone(),
            destinations: Destination::resolve(config),
        }
    }

    pub fn field(&self, name: &str) -> Option<&NotificationField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn sample_kind(category: Category) -> EventKind {
    match category {
        Category::Channels => EventKind::ChannelUpdate,
        Category::Members => EventKind::MemberUpdate,
        Category::Roles => EventKind::RoleUpdate,
        Category::Messages => EventKind::MessageUpdate,
        Category::Guild => EventKind::GuildUpdate,
        Category::Emojis => EventKind::EmojiUpdate,
        Category::Invites => EventKind::InviteCreate,
        Category::Moderation => EventKind::MemberBan,
        Category::Threads => EventKind::ThreadUpdate,
        Category::Voice => EventKind::VoiceMove,
    }
}
