//! Attribute raw events to the actor who caused them.
//!
//! The platform's audit log is eventually consistent: the entry for an
//! action may show up a moment after the gateway event, or never (system
//! changes). The correlator performs exactly one bounded lookback per event
//! and never waits for a late entry. Anything that goes wrong degrades to an
//! unattributed [`AuditMatch`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use guildwatch_core::config::CorrelationSettings;
use guildwatch_core::{AuditAction, AuditLogEntry, AuditMatch, GuildId, RawEvent};

use crate::error::AuditError;

/// Read access to a guild's audit log.
#[async_trait::async_trait]
pub trait AuditLogSource: Send + Sync {
    /// Most recent entries of `action`, newest first, at most `limit`.
    async fn query_recent(
        &self,
        guild_id: GuildId,
        action: AuditAction,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, AuditError>;
}

/// Matches events to audit entries using a bounded time window.
pub struct AuditCorrelator {
    source: Arc<dyn AuditLogSource>,
    window: Duration,
    lookback: usize,
    timeout: Duration,
}

impl AuditCorrelator {
    pub fn new(source: Arc<dyn AuditLogSource>, settings: &CorrelationSettings) -> Self {
        Self {
            source,
            window: settings.window,
            lookback: settings.lookback.max(1),
            timeout: settings.timeout,
        }
    }

    /// Correlate using the current time as the event's arrival time.
    pub async fn correlate(&self, event: &RawEvent) -> AuditMatch {
        self.correlate_at(event, Utc::now()).await
    }

    /// Correlate an event that arrived at `now`.
    pub async fn correlate_at(&self, event: &RawEvent, now: DateTime<Utc>) -> AuditMatch {
        let Some(action) = event.kind.audit_action() else {
            // The platform does not audit self actions; the gateway's own
            // actor hint is the only attribution there is.
            return match &event.actor_hint {
                Some(actor) => AuditMatch::exact(actor.clone(), None),
                None => AuditMatch::none(),
            };
        };

        let query = self
            .source
            .query_recent(event.guild_id, action, self.lookback);

        let entries = match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!(
                    guild_id = %event.guild_id,
                    action = %action,
                    error = %e,
                    "audit log lookback failed, continuing unattributed"
                );
                return AuditMatch::none();
            }
            Err(_) => {
                warn!(
                    guild_id = %event.guild_id,
                    action = %action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "audit log lookback timed out, continuing unattributed"
                );
                return AuditMatch::none();
            }
        };

        let target_id = event.audit_target_id();
        match select_match(&entries, target_id, now, self.window) {
            Some(entry) => {
                debug!(
                    guild_id = %event.guild_id,
                    kind = %event.kind,
                    target_id,
                    actor_id = %entry.actor.id,
                    "event attributed"
                );
                AuditMatch::from(entry.clone())
            }
            None => {
                debug!(
                    guild_id = %event.guild_id,
                    kind = %event.kind,
                    target_id,
                    candidates = entries.len(),
                    "no audit entry within window"
                );
                AuditMatch::none()
            }
        }
    }
}

/// Pick the entry for `target_id` created within `window` of `now`.
///
/// The window is symmetric to tolerate clock skew between the platform and
/// this process. Among several qualifying entries the most recently created
/// one wins.
pub fn select_match(
    entries: &[AuditLogEntry],
    target_id: u64,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<&AuditLogEntry> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

    entries
        .iter()
        .filter(|e| e.target_id == Some(target_id))
        .filter(|e| {
            let delta = now.signed_duration_since(e.created_at);
            delta <= window && delta >= -window
        })
        .max_by_key(|e| e.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildwatch_core::{EventKind, UserRef};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        entries: Vec<AuditLogEntry>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AuditLogSource for FixedSource {
        async fn query_recent(
            &self,
            _guild_id: GuildId,
            _action: AuditAction,
            limit: usize,
        ) -> Result<Vec<AuditLogEntry>, AuditError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.iter().take(limit).cloned().collect())
        }
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl AuditLogSource for FailingSource {
        async fn query_recent(
            &self,
            _guild_id: GuildId,
            _action: AuditAction,
            _limit: usize,
        ) -> Result<Vec<AuditLogEntry>, AuditError> {
            Err(AuditError::Forbidden)
        }
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl AuditLogSource for SlowSource {
        async fn query_recent(
            &self,
            _guild_id: GuildId,
            _action: AuditAction,
            _limit: usize,
        ) -> Result<Vec<AuditLogEntry>, AuditError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn entry(target: u64, actor: u64, created_at: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            target_id: Some(target),
            actor: UserRef::new(actor, format!("user-{actor}")),
            created_at,
            reason: Some(format!("by {actor}")),
        }
    }

    fn correlator(source: Arc<dyn AuditLogSource>) -> AuditCorrelator {
        AuditCorrelator::new(source, &CorrelationSettings::default())
    }

    fn channel_create(target: u64) -> RawEvent {
        RawEvent::new(EventKind::ChannelCreate, GuildId(1), target, Utc::now())
    }

    #[tokio::test]
    async fn matching_entry_within_window_is_attributed() {
        let now = Utc::now();
        let source = Arc::new(FixedSource {
            entries: vec![entry(10, 7, now - chrono::Duration::seconds(2))],
            calls: AtomicUsize::new(0),
        });
        let m = correlator(source.clone())
            .correlate_at(&channel_create(10), now)
            .await;
        assert_eq!(m.actor.unwrap().id.get(), 7);
        assert_eq!(m.reason.as_deref(), Some("by 7"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn later_of_two_qualifying_entries_wins() {
        let now = Utc::now();
        let source = Arc::new(FixedSource {
            entries: vec![
                entry(10, 1, now - chrono::Duration::seconds(4)),
                entry(10, 2, now - chrono::Duration::seconds(1)),
                entry(10, 3, now - chrono::Duration::seconds(3)),
            ],
            calls: AtomicUsize::new(0),
        });
        let m = correlator(source).correlate_at(&channel_create(10), now).await;
        assert_eq!(m.actor.unwrap().id.get(), 2);
    }

    #[tokio::test]
    async fn entries_outside_window_or_for_other_targets_are_ignored() {
        let now = Utc::now();
        let source = Arc::new(FixedSource {
            entries: vec![
                entry(10, 1, now - chrono::Duration::seconds(30)),
                entry(11, 2, now),
            ],
            calls: AtomicUsize::new(0),
        });
        let m = correlator(source).correlate_at(&channel_create(10), now).await;
        assert!(m.actor.is_none());
        assert_eq!(m.confidence, guildwatch_core::Confidence::None);
    }

    #[tokio::test]
    async fn window_boundary_is_inclusive() {
        let now = Utc::now();
        let entries = vec![entry(10, 1, now - chrono::Duration::seconds(5))];
        assert!(select_match(&entries, 10, now, Duration::from_secs(5)).is_some());
        let entries = vec![entry(10, 1, now - chrono::Duration::milliseconds(5001))];
        assert!(select_match(&entries, 10, now, Duration::from_secs(5)).is_none());
    }

    #[tokio::test]
    async fn query_failure_degrades_to_unattributed() {
        let m = correlator(Arc::new(FailingSource))
            .correlate(&channel_create(10))
            .await;
        assert!(!m.is_attributed());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookback_times_out() {
        let m = correlator(Arc::new(SlowSource))
            .correlate(&channel_create(10))
            .await;
        assert!(!m.is_attributed());
    }

    #[tokio::test]
    async fn self_actions_use_actor_hint_without_querying() {
        let source = Arc::new(FixedSource {
            entries: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let mut event = RawEvent::new(EventKind::MemberJoin, GuildId(1), 42, Utc::now());
        event.actor_hint = Some(UserRef::new(42u64, "newcomer"));

        let m = correlator(source.clone()).correlate(&event).await;
        assert_eq!(m.actor.unwrap().name, "newcomer");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn message_delete_matches_on_author() {
        let now = Utc::now();
        let source = Arc::new(FixedSource {
            entries: vec![entry(55, 9, now)],
            calls: AtomicUsize::new(0),
        });
        let mut event = RawEvent::new(EventKind::MessageDelete, GuildId(1), 1000, now);
        event.author_id = Some(guildwatch_core::UserId(55));
        let m = correlator(source).correlate_at(&event, now).await;
        assert_eq!(m.actor.unwrap().id.get(), 9);
    }
}
