//! [`AuditLogSource`] backed by the platform's audit-log REST endpoint.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use guildwatch_core::config::ApiSettings;
use guildwatch_core::{ActorKind, AuditAction, AuditLogEntry, GuildId, UserRef};
use guildwatch_rules::{AuditError, AuditLogSource};

/// Milliseconds between the Unix epoch and the platform's id epoch.
const ID_EPOCH_MS: i64 = 1_420_070_400_000;

#[derive(Debug, Clone)]
pub struct HttpAuditLog {
    api_base: String,
    auth_header: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AuditLogPage {
    #[serde(default)]
    audit_log_entries: Vec<WireEntry>,
    #[serde(default)]
    users: Vec<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    id: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
    #[serde(default)]
    avatar: Option<String>,
}

impl HttpAuditLog {
    pub fn new(api: &ApiSettings, client: reqwest::Client) -> Self {
        Self {
            api_base: api.base_url.trim_end_matches('/').to_string(),
            auth_header: api.bot_token.as_ref().map(|t| format!("Bot {t}")),
            client,
        }
    }
}

#[async_trait::async_trait]
impl AuditLogSource for HttpAuditLog {
    async fn query_recent(
        &self,
        guild_id: GuildId,
        action: AuditAction,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let auth = self.auth_header.as_deref().ok_or(AuditError::Forbidden)?;
        let url = format!(
            "{}/guilds/{}/audit-logs?action_type={}&limit={}",
            self.api_base,
            guild_id,
            action.code(),
            limit
        );

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AuditError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuditError::Forbidden);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AuditError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let page: AuditLogPage = response
            .json()
            .await
            .map_err(|e| AuditError::Decode(e.to_string()))?;
        Ok(page.into_entries())
    }
}

impl AuditLogPage {
    fn into_entries(self) -> Vec<AuditLogEntry> {
        let users: HashMap<&str, &WireUser> =
            self.users.iter().map(|u| (u.id.as_str(), u)).collect();

        self.audit_log_entries
            .iter()
            .filter_map(|entry| {
                let created_at = id_timestamp(&entry.id)?;
                let actor_id = entry.user_id.as_deref()?;
                let actor = match users.get(actor_id) {
                    Some(user) => user.to_ref()?,
                    None => UserRef::new(actor_id.parse::<u64>().ok()?, actor_id),
                };
                Some(AuditLogEntry {
                    target_id: entry.target_id.as_deref().and_then(|t| t.parse().ok()),
                    actor,
                    created_at,
                    reason: entry.reason.clone(),
                })
            })
            .collect()
    }
}

impl WireUser {
    fn to_ref(&self) -> Option<UserRef> {
        let id: u64 = self.id.parse().ok()?;
        let mut user = UserRef::new(id, self.username.clone());
        if self.bot {
            user.kind = ActorKind::Bot;
        }
        user.created_at = id_timestamp(&self.id);
        user.avatar_url = self
            .avatar
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/avatars/{id}/{hash}.png"));
        Some(user)
    }
}

/// Creation time encoded in a platform id.
fn id_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let raw: u64 = id.parse().ok()?;
    let ms = (raw >> 22) as i64 + ID_EPOCH_MS;
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "audit_log_entries": [
            {"id": "1100000000000000000", "user_id": "42", "target_id": "10", "action_type": 10, "reason": "tidy"},
            {"id": "1099999999999999999", "user_id": "43", "target_id": null, "action_type": 10},
            {"id": "not-a-number", "user_id": "42", "target_id": "10", "action_type": 10}
        ],
        "users": [
            {"id": "42", "username": "mod", "avatar": "abc"},
            {"id": "43", "username": "automation", "bot": true}
        ]
    }"#;

    #[test]
    fn decodes_entries_and_joins_users() {
        let page: AuditLogPage = serde_json::from_str(PAGE).unwrap();
        let entries = page.into_entries();
        assert_eq!(entries.len(), 2, "entries with unparseable ids are dropped");

        let first = &entries[0];
        assert_eq!(first.target_id, Some(10));
        assert_eq!(first.actor.name, "mod");
        assert_eq!(first.reason.as_deref(), Some("tidy"));
        assert_eq!(
            first.actor.avatar_url.as_deref(),
            Some("https://cdn.discordapp.com/avatars/42/abc.png")
        );
        assert_eq!(first.actor.id.get(), 42);

        assert!(entries[1].actor.is_bot());
        assert_eq!(entries[1].target_id, None);
    }

    #[test]
    fn id_timestamp_decodes_platform_epoch() {
        // 175928847299117063 is the documented example id: 2016-04-30 11:18:25.796 UTC.
        let ts = id_timestamp("175928847299117063").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_462_015_105_796);
    }

    #[tokio::test]
    async fn missing_token_is_forbidden() {
        let log = HttpAuditLog::new(&ApiSettings::default(), reqwest::Client::new());
        let err = log
            .query_recent(GuildId(1), AuditAction::ChannelCreate, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Forbidden));
    }
}
