//! Wire payload posted to channels, webhooks and DMs.

use serde::Serialize;

use guildwatch_core::RoleId;

use crate::notification::Notification;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    pub allowed_mentions: AllowedMentions,
}

/// Mentions the platform is allowed to turn into pings.
///
/// Defaults to none: mentions inside embeds render as links but never
/// notify anyone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl MessagePayload {
    /// Full embed for channel, webhook and DM destinations.
    pub fn from_notification(n: &Notification) -> Self {
        let display = &n.display;

        let embed = Embed {
            title: n.title.clone(),
            description: n.description.clone(),
            color: n.color,
            fields: n
                .fields
                .iter()
                .map(|f| EmbedField {
                    name: f.name.clone(),
                    value: f.value.clone(),
                    inline: f.inline,
                })
                .collect(),
            timestamp: display.show_timestamp.then(|| n.timestamp.to_rfc3339()),
            author: n.actor.as_ref().map(|actor| EmbedAuthor {
                name: actor.name.clone(),
                icon_url: if display.show_actor_avatar {
                    actor.avatar_url.clone()
                } else {
                    None
                },
            }),
            thumbnail: n
                .thumbnail_url
                .as_ref()
                .filter(|_| display.show_thumbnail)
                .map(|url| EmbedImage { url: url.clone() }),
            footer: Some(EmbedFooter {
                text: format!("{} · {}", n.category, n.kind),
            }),
        };

        Self {
            content: None,
            embeds: vec![embed],
            allowed_mentions: AllowedMentions::default(),
        }
    }

    /// Short follow-up that pings `role_ids` about `n`.
    ///
    /// It goes out alongside the embed rather than after it, and transports
    /// only report success or failure, so there is no posted message id to
    /// reference. The ping repeats the title instead.
    pub fn role_ping(n: &Notification, role_ids: &[RoleId]) -> Self {
        let mentions: Vec<String> = role_ids.iter().map(|id| format!("<@&{id}>")).collect();
        Self {
            content: Some(format!("{} {}", mentions.join(" "), n.title)),
            embeds: Vec::new(),
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                roles: role_ids.iter().map(|id| id.to_string()).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Attribution, NotificationField};
    use chrono::{TimeZone, Utc};
    use guildwatch_core::{Category, DisplayConfig, EventKind, GuildId, UserId};

    fn notification(display: DisplayConfig) -> Notification {
        Notification {
            guild_id: GuildId(1),
            category: Category::Channels,
            kind: EventKind::ChannelCreate,
            title: "Channel created".into(),
            description: "<#10> was created.".into(),
            fields: vec![NotificationField::inline("Target", "<#10>")],
            color: 0x123456,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            actor: Some(Attribution {
                user_id: UserId(7),
                name: "mod".into(),
                avatar_url: Some("https://cdn.example/a.png".into()),
            }),
            reason: None,
            thumbnail_url: Some("https://cdn.example/t.png".into()),
            display,
            destinations: Vec::new(),
        }
    }

    #[test]
    fn embed_honours_display_options() {
        let full = MessagePayload::from_notification(&notification(DisplayConfig::default()));
        let embed = &full.embeds[0];
        assert_eq!(embed.timestamp.as_deref(), Some("2026-01-02T03:04:05+00:00"));
        assert!(embed.author.as_ref().unwrap().icon_url.is_some());
        assert!(embed.thumbnail.is_some());

        let bare = MessagePayload::from_notification(&notification(DisplayConfig {
            embed_color: None,
            show_timestamp: false,
            show_actor_avatar: false,
            show_thumbnail: false,
        }));
        let embed = &bare.embeds[0];
        assert!(embed.timestamp.is_none());
        assert_eq!(embed.author.as_ref().unwrap().name, "mod");
        assert!(embed.author.as_ref().unwrap().icon_url.is_none());
        assert!(embed.thumbnail.is_none());
    }

    #[test]
    fn embed_mentions_never_ping() {
        let payload = MessagePayload::from_notification(&notification(DisplayConfig::default()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["allowed_mentions"]["parse"], serde_json::json!([]));
        assert!(json.get("content").is_none());
    }

    #[test]
    fn role_ping_allows_only_listed_roles() {
        let n = notification(DisplayConfig::default());
        let payload = MessagePayload::role_ping(&n, &[RoleId(3), RoleId(4)]);
        assert_eq!(payload.content.as_deref(), Some("<@&3> <@&4> Channel created"));
        assert_eq!(payload.allowed_mentions.roles, vec!["3", "4"]);
        assert!(payload.embeds.is_empty());

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("message_reference").is_none());
    }
}
