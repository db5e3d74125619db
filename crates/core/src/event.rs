//! Raw platform events as handed to the pipeline by the gateway feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;
use crate::ids::{ChannelId, GuildId, RoleId, UserId};

/// Logical grouping of event kinds sharing one configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Channels,
    Members,
    Roles,
    Messages,
    Guild,
    Emojis,
    Invites,
    Moderation,
    Threads,
    Voice,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Channels,
        Category::Members,
        Category::Roles,
        Category::Messages,
        Category::Guild,
        Category::Emojis,
        Category::Invites,
        Category::Moderation,
        Category::Threads,
        Category::Voice,
    ];

    /// Returns the canonical lowercase label for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Members => "members",
            Self::Roles => "roles",
            Self::Messages => "messages",
            Self::Guild => "guild",
            Self::Emojis => "emojis",
            Self::Invites => "invites",
            Self::Moderation => "moderation",
            Self::Threads => "threads",
            Self::Voice => "voice",
        }
    }

    /// Embed colour used when the guild has not configured one.
    pub fn default_color(self) -> u32 {
        match self {
            Self::Channels => 0x3498DB,
            Self::Members => 0x2ECC71,
            Self::Roles => 0x9B59B6,
            Self::Messages => 0xF1C40F,
            Self::Guild => 0x1ABC9C,
            Self::Emojis => 0xE67E22,
            Self::Invites => 0x95A5A6,
            Self::Moderation => 0xE74C3C,
            Self::Threads => 0x5865F2,
            Self::Voice => 0x206694,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Error returned when parsing an unknown category string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event category: {0}")]
pub struct ParseCategoryError(pub String);

/// The kind of entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Channel,
    Member,
    Role,
    Message,
    Guild,
    Emoji,
    Invite,
    Thread,
    VoiceState,
}

/// Concrete platform action carried by a [`RawEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MemberJoin,
    MemberLeave,
    MemberUpdate,
    MemberRoleUpdate,
    MemberBan,
    MemberUnban,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    MessageUpdate,
    MessageDelete,
    MessageBulkDelete,
    GuildUpdate,
    EmojiCreate,
    EmojiUpdate,
    EmojiDelete,
    InviteCreate,
    InviteDelete,
    ThreadCreate,
    ThreadUpdate,
    ThreadDelete,
    VoiceJoin,
    VoiceLeave,
    VoiceMove,
}

impl EventKind {
    pub fn category(self) -> Category {
        use EventKind::*;
        match self {
            ChannelCreate | ChannelUpdate | ChannelDelete => Category::Channels,
            MemberJoin | MemberLeave | MemberUpdate | MemberRoleUpdate => Category::Members,
            MemberBan | MemberUnban => Category::Moderation,
            RoleCreate | RoleUpdate | RoleDelete => Category::Roles,
            MessageUpdate | MessageDelete | MessageBulkDelete => Category::Messages,
            GuildUpdate => Category::Guild,
            EmojiCreate | EmojiUpdate | EmojiDelete => Category::Emojis,
            InviteCreate | InviteDelete => Category::Invites,
            ThreadCreate | ThreadUpdate | ThreadDelete => Category::Threads,
            VoiceJoin | VoiceLeave | VoiceMove => Category::Voice,
        }
    }

    pub fn target_kind(self) -> TargetKind {
        use EventKind::*;
        match self {
            ChannelCreate | ChannelUpdate | ChannelDelete => TargetKind::Channel,
            MemberJoin | MemberLeave | MemberUpdate | MemberRoleUpdate | MemberBan
            | MemberUnban => TargetKind::Member,
            RoleCreate | RoleUpdate | RoleDelete => TargetKind::Role,
            MessageUpdate | MessageDelete | MessageBulkDelete => TargetKind::Message,
            GuildUpdate => TargetKind::Guild,
            EmojiCreate | EmojiUpdate | EmojiDelete => TargetKind::Emoji,
            InviteCreate | InviteDelete => TargetKind::Invite,
            ThreadCreate | ThreadUpdate | ThreadDelete => TargetKind::Thread,
            VoiceJoin | VoiceLeave | VoiceMove => TargetKind::VoiceState,
        }
    }

    /// Audit-log operation recorded by the platform for this action.
    ///
    /// `None` means the platform never writes an audit entry for it (self
    /// actions such as joining or editing one's own message), so the
    /// correlator skips the lookback entirely.
    pub fn audit_action(self) -> Option<AuditAction> {
        use EventKind::*;
        match self {
            ChannelCreate => Some(AuditAction::ChannelCreate),
            ChannelUpdate => Some(AuditAction::ChannelUpdate),
            ChannelDelete => Some(AuditAction::ChannelDelete),
            MemberLeave => Some(AuditAction::MemberKick),
            MemberUpdate => Some(AuditAction::MemberUpdate),
            MemberRoleUpdate => Some(AuditAction::MemberRoleUpdate),
            MemberBan => Some(AuditAction::MemberBanAdd),
            MemberUnban => Some(AuditAction::MemberBanRemove),
            RoleCreate => Some(AuditAction::RoleCreate),
            RoleUpdate => Some(AuditAction::RoleUpdate),
            RoleDelete => Some(AuditAction::RoleDelete),
            MessageDelete => Some(AuditAction::MessageDelete),
            MessageBulkDelete => Some(AuditAction::MessageBulkDelete),
            GuildUpdate => Some(AuditAction::GuildUpdate),
            EmojiCreate => Some(AuditAction::EmojiCreate),
            EmojiUpdate => Some(AuditAction::EmojiUpdate),
            EmojiDelete => Some(AuditAction::EmojiDelete),
            InviteCreate => Some(AuditAction::InviteCreate),
            InviteDelete => Some(AuditAction::InviteDelete),
            ThreadCreate => Some(AuditAction::ThreadCreate),
            ThreadUpdate => Some(AuditAction::ThreadUpdate),
            ThreadDelete => Some(AuditAction::ThreadDelete),
            MemberJoin | MessageUpdate | VoiceJoin | VoiceLeave | VoiceMove => None,
        }
    }

    /// snake_case label, also the key of the composer's template table.
    pub fn as_str(self) -> &'static str {
        use EventKind::*;
        match self {
            ChannelCreate => "channel_create",
            ChannelUpdate => "channel_update",
            ChannelDelete => "channel_delete",
            MemberJoin => "member_join",
            MemberLeave => "member_leave",
            MemberUpdate => "member_update",
            MemberRoleUpdate => "member_role_update",
            MemberBan => "member_ban",
            MemberUnban => "member_unban",
            RoleCreate => "role_create",
            RoleUpdate => "role_update",
            RoleDelete => "role_delete",
            MessageUpdate => "message_update",
            MessageDelete => "message_delete",
            MessageBulkDelete => "message_bulk_delete",
            GuildUpdate => "guild_update",
            EmojiCreate => "emoji_create",
            EmojiUpdate => "emoji_update",
            EmojiDelete => "emoji_delete",
            InviteCreate => "invite_create",
            InviteDelete => "invite_delete",
            ThreadCreate => "thread_create",
            ThreadUpdate => "thread_update",
            ThreadDelete => "thread_delete",
            VoiceJoin => "voice_join",
            VoiceLeave => "voice_leave",
            VoiceMove => "voice_move",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an account acts on the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    #[default]
    User,
    Bot,
    Webhook,
}

/// A user as seen by the pipeline: enough to attribute and filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub kind: ActorKind,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Account creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the user joined the guild the event belongs to.
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

impl UserRef {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ActorKind::User,
            avatar_url: None,
            created_at: None,
            joined_at: None,
            role_ids: Vec::new(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    pub fn is_bot(&self) -> bool {
        self.kind == ActorKind::Bot
    }

    pub fn is_webhook(&self) -> bool {
        self.kind == ActorKind::Webhook
    }
}

/// One changed attribute of the target entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

/// An event received from the gateway feed, already tagged with its kind.
///
/// Everything past `occurred_at` is event-specific payload; the pipeline
/// reads only what filtering and composition need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    pub guild_id: GuildId,
    /// Id of the channel/member/role/... the event is about.
    pub target_id: u64,
    /// When the underlying action happened on the platform.
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub target_name: Option<String>,
    /// Channel the event happened in, when meaningful.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// Actor supplied by the gateway itself (message author, joining member).
    #[serde(default)]
    pub actor_hint: Option<UserRef>,
    /// Author of the affected message, for message events.
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub content_length: Option<usize>,
    /// Roles touched by the event (granted, revoked, or the role itself).
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    /// Image associated with the target (avatar, emoji, icon).
    #[serde(default)]
    pub image_url: Option<String>,
}

impl RawEvent {
    pub fn new(kind: EventKind, guild_id: GuildId, target_id: u64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            guild_id,
            target_id,
            occurred_at,
            target_name: None,
            channel_id: None,
            actor_hint: None,
            author_id: None,
            content_length: None,
            role_ids: Vec::new(),
            changes: Vec::new(),
            image_url: None,
        }
    }

    /// Parse one event from a JSON document (one line of the gateway feed).
    pub fn from_json(input: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Id the platform records as the audit-entry target for this event.
    ///
    /// Message deletions are logged against the message author, not the
    /// message itself.
    pub fn audit_target_id(&self) -> u64 {
        match (self.kind, self.author_id) {
            (EventKind::MessageDelete, Some(author)) => author.get(),
            _ => self.target_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("nope".parse::<Category>().is_err());
    }

    #[test]
    fn self_actions_have_no_audit_action() {
        assert!(EventKind::MemberJoin.audit_action().is_none());
        assert!(EventKind::MessageUpdate.audit_action().is_none());
        assert_eq!(
            EventKind::ChannelCreate.audit_action(),
            Some(AuditAction::ChannelCreate)
        );
    }

    #[test]
    fn message_delete_targets_author() {
        let mut event = RawEvent::new(EventKind::MessageDelete, GuildId(1), 999, Utc::now());
        assert_eq!(event.audit_target_id(), 999);
        event.author_id = Some(UserId(55));
        assert_eq!(event.audit_target_id(), 55);

        let mut create = RawEvent::new(EventKind::ChannelCreate, GuildId(1), 10, Utc::now());
        create.author_id = Some(UserId(55));
        assert_eq!(create.audit_target_id(), 10);
    }

    #[test]
    fn raw_event_parses_with_minimal_payload() {
        let json = r#"{
            "kind": "channel_create",
            "guild_id": 1,
            "target_id": 20,
            "occurred_at": "2026-01-01T00:00:00Z"
        }"#;
        let event = RawEvent::from_json(json).unwrap();
        assert_eq!(event.category(), Category::Channels);
        assert!(event.role_ids.is_empty());
        assert!(event.actor_hint.is_none());
    }

    #[test]
    fn malformed_event_is_an_error() {
        let err = RawEvent::from_json(r#"{"kind": "teleport"}"#).unwrap_err();
        assert!(err.to_string().starts_with("Malformed event"));
    }
}
