//! Audit-log records and the correlation result attached to each event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::UserRef;

/// Audit-log operation types, with the platform's numeric action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    GuildUpdate,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MemberKick,
    MemberBanAdd,
    MemberBanRemove,
    MemberUpdate,
    MemberRoleUpdate,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    InviteCreate,
    InviteDelete,
    EmojiCreate,
    EmojiUpdate,
    EmojiDelete,
    MessageDelete,
    MessageBulkDelete,
    ThreadCreate,
    ThreadUpdate,
    ThreadDelete,
}

impl AuditAction {
    /// Numeric `action_type` used by the audit-log endpoint.
    pub fn code(self) -> u16 {
        match self {
            Self::GuildUpdate => 1,
            Self::ChannelCreate => 10,
            Self::ChannelUpdate => 11,
            Self::ChannelDelete => 12,
            Self::MemberKick => 20,
            Self::MemberBanAdd => 22,
            Self::MemberBanRemove => 23,
            Self::MemberUpdate => 24,
            Self::MemberRoleUpdate => 25,
            Self::RoleCreate => 30,
            Self::RoleUpdate => 31,
            Self::RoleDelete => 32,
            Self::InviteCreate => 40,
            Self::InviteDelete => 42,
            Self::EmojiCreate => 60,
            Self::EmojiUpdate => 61,
            Self::EmojiDelete => 62,
            Self::MessageDelete => 72,
            Self::MessageBulkDelete => 73,
            Self::ThreadCreate => 110,
            Self::ThreadUpdate => 111,
            Self::ThreadDelete => 112,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// A single entry returned by the audit-log lookback query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Declared target of the action; some actions have none.
    #[serde(default)]
    pub target_id: Option<u64>,
    pub actor: UserRef,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// How sure the correlator is about the attributed actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Exact,
    None,
}

/// Result of correlating an event with the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMatch {
    pub actor: Option<UserRef>,
    pub reason: Option<String>,
    pub confidence: Confidence,
}

impl AuditMatch {
    /// No attributable actor.
    pub fn none() -> Self {
        Self {
            actor: None,
            reason: None,
            confidence: Confidence::None,
        }
    }

    pub fn exact(actor: UserRef, reason: Option<String>) -> Self {
        Self {
            actor: Some(actor),
            reason,
            confidence: Confidence::Exact,
        }
    }

    pub fn is_attributed(&self) -> bool {
        self.actor.is_some()
    }
}

impl From<AuditLogEntry> for AuditMatch {
    fn from(entry: AuditLogEntry) -> Self {
        Self::exact(entry.actor, entry.reason)
    }
}
