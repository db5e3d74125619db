//! Layered admission policy for attributed events.
//!
//! Checks run in a fixed, cheap-first order and stop at the first rejection:
//!
//! 1. category enabled and a destination configured
//! 2. bot / webhook actors
//! 3. ignore lists (user, channel, roles)
//! 4. conditions (account age, membership, roles, message length)
//!
//! Only the first check applies when the actor is unknown. A missing audit
//! entry must never be the reason a notification disappears.

use chrono::{DateTime, Utc};

use guildwatch_core::{
    AuditMatch, ChannelId, GuildEventConfig, RawEvent, RoleId, UserId, UserRef,
};

/// Why an event was suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Disabled,
    NoDestination,
    BotActor,
    WebhookActor,
    IgnoredUser(UserId),
    IgnoredChannel(ChannelId),
    IgnoredRole(RoleId),
    AccountTooNew { age_secs: i64, min_secs: u64 },
    MembershipTooShort { member_secs: i64, min_secs: u64 },
    MissingRequiredRole,
    ExcludedRole(RoleId),
    MessageLength(usize),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "category disabled"),
            Self::NoDestination => write!(f, "no destination configured"),
            Self::BotActor => write!(f, "actor is a bot"),
            Self::WebhookActor => write!(f, "actor is a webhook"),
            Self::IgnoredUser(id) => write!(f, "user {id} is ignored"),
            Self::IgnoredChannel(id) => write!(f, "channel {id} is ignored"),
            Self::IgnoredRole(id) => write!(f, "role {id} is ignored"),
            Self::AccountTooNew { age_secs, min_secs } => {
                write!(f, "account age {age_secs}s below minimum {min_secs}s")
            }
            Self::MembershipTooShort {
                member_secs,
                min_secs,
            } => write!(f, "membership {member_secs}s below minimum {min_secs}s"),
            Self::MissingRequiredRole => write!(f, "actor lacks a required role"),
            Self::ExcludedRole(id) => write!(f, "actor holds excluded role {id}"),
            Self::MessageLength(len) => write!(f, "message length {len} out of range"),
        }
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }

    /// Human-readable reason, suitable for logs.
    pub fn reason(&self) -> String {
        match self {
            Self::Admit => "admitted".to_string(),
            Self::Reject(r) => r.to_string(),
        }
    }
}

/// Stateless evaluator of a guild's filter policy.
pub struct PolicyFilter;

impl PolicyFilter {
    pub fn admit(event: &RawEvent, matched: &AuditMatch, config: &GuildEventConfig) -> Verdict {
        Self::admit_at(event, matched, config, Utc::now())
    }

    /// Evaluate against a fixed clock, for age and membership conditions.
    pub fn admit_at(
        event: &RawEvent,
        matched: &AuditMatch,
        config: &GuildEventConfig,
        now: DateTime<Utc>,
    ) -> Verdict {
        match evaluate(event, matched.actor.as_ref(), config, now) {
            Ok(()) => Verdict::Admit,
            Err(rejection) => Verdict::Reject(rejection),
        }
    }
}

fn evaluate(
    event: &RawEvent,
    actor: Option<&UserRef>,
    config: &GuildEventConfig,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    check_enabled(config)?;
    // Without attribution nothing past the enablement check may reject.
    let Some(actor) = actor else {
        return Ok(());
    };
    check_actor_kind(actor, config)?;
    check_ignored(event, actor, config)?;
    check_conditions(event, actor, config, now)?;
    Ok(())
}

fn check_enabled(config: &GuildEventConfig) -> Result<(), Rejection> {
    if !config.enabled {
        return Err(Rejection::Disabled);
    }
    if !config.has_destination() {
        return Err(Rejection::NoDestination);
    }
    Ok(())
}

fn check_actor_kind(actor: &UserRef, config: &GuildEventConfig) -> Result<(), Rejection> {
    if actor.is_bot() && !config.include_bots {
        return Err(Rejection::BotActor);
    }
    if actor.is_webhook() && !config.include_webhook_actors {
        return Err(Rejection::WebhookActor);
    }
    Ok(())
}

fn check_ignored(
    event: &RawEvent,
    actor: &UserRef,
    config: &GuildEventConfig,
) -> Result<(), Rejection> {
    if config.ignored_user_ids.contains(&actor.id) {
        return Err(Rejection::IgnoredUser(actor.id));
    }
    if let Some(role) = actor
        .role_ids
        .iter()
        .find(|r| config.ignored_role_ids.contains(*r))
    {
        return Err(Rejection::IgnoredRole(*role));
    }

    if let Some(channel) = event.channel_id {
        if config.ignored_channel_ids.contains(&channel) {
            return Err(Rejection::IgnoredChannel(channel));
        }
    }

    if let Some(role) = event
        .role_ids
        .iter()
        .find(|r| config.ignored_role_ids.contains(*r))
    {
        return Err(Rejection::IgnoredRole(*role));
    }

    Ok(())
}

fn check_conditions(
    event: &RawEvent,
    actor: &UserRef,
    config: &GuildEventConfig,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    let conditions = &config.conditions;

    if let (Some(min_secs), Some(created_at)) = (conditions.min_account_age_secs, actor.created_at) {
        let age_secs = now.signed_duration_since(created_at).num_seconds();
        if age_secs < min_secs as i64 {
            return Err(Rejection::AccountTooNew { age_secs, min_secs });
        }
    }

    if let (Some(min_secs), Some(joined_at)) = (conditions.min_membership_secs, actor.joined_at) {
        let member_secs = now.signed_duration_since(joined_at).num_seconds();
        if member_secs < min_secs as i64 {
            return Err(Rejection::MembershipTooShort {
                member_secs,
                min_secs,
            });
        }
    }

    if !conditions.required_role_ids.is_empty()
        && !actor
            .role_ids
            .iter()
            .any(|r| conditions.required_role_ids.contains(r))
    {
        return Err(Rejection::MissingRequiredRole);
    }

    if let Some(role) = actor
        .role_ids
        .iter()
        .find(|r| conditions.excluded_role_ids.contains(*r))
    {
        return Err(Rejection::ExcludedRole(*role));
    }

    if let (Some(range), Some(len)) = (conditions.message_length, event.content_length) {
        if !range.contains(len) {
            return Err(Rejection::MessageLength(len));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildwatch_core::{ActorKind, Category, EventKind, GuildId, LengthRange};

    fn enabled_config() -> GuildEventConfig {
        let mut cfg = GuildEventConfig::new(GuildId(1), Category::Channels);
        cfg.enabled = true;
        cfg.primary_channel_id = Some(ChannelId(500));
        cfg
    }

    fn event() -> RawEvent {
        let mut e = RawEvent::new(EventKind::ChannelCreate, GuildId(1), 10, Utc::now());
        e.channel_id = Some(ChannelId(10));
        e
    }

    fn attributed(actor: UserRef) -> AuditMatch {
        AuditMatch::exact(actor, None)
    }

    fn bot(id: u64) -> UserRef {
        let mut u = UserRef::new(id, "bot");
        u.kind = ActorKind::Bot;
        u
    }

    #[test]
    fn disabled_category_rejects_first() {
        let mut cfg = enabled_config();
        cfg.enabled = false;
        let v = PolicyFilter::admit(&event(), &AuditMatch::none(), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::Disabled));
    }

    #[test]
    fn missing_destination_rejects() {
        let mut cfg = enabled_config();
        cfg.primary_channel_id = None;
        let v = PolicyFilter::admit(&event(), &AuditMatch::none(), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::NoDestination));
    }

    #[test]
    fn bot_actor_rejected_regardless_of_other_conditions() {
        let mut cfg = enabled_config();
        cfg.conditions.message_length = Some(LengthRange {
            min: None,
            max: Some(10_000),
        });
        let v = PolicyFilter::admit(&event(), &attributed(bot(3)), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::BotActor));

        cfg.include_bots = true;
        assert!(PolicyFilter::admit(&event(), &attributed(bot(3)), &cfg).is_admitted());
    }

    #[test]
    fn webhook_actor_needs_opt_in() {
        let mut cfg = enabled_config();
        let mut hook = UserRef::new(4u64, "hook");
        hook.kind = ActorKind::Webhook;
        let v = PolicyFilter::admit(&event(), &attributed(hook.clone()), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::WebhookActor));
        cfg.include_webhook_actors = true;
        assert!(PolicyFilter::admit(&event(), &attributed(hook), &cfg).is_admitted());
    }

    #[test]
    fn ignored_user_rejected_even_when_conditions_pass() {
        let mut cfg = enabled_config();
        cfg.ignored_user_ids.insert(UserId(7));
        let v = PolicyFilter::admit(&event(), &attributed(UserRef::new(7u64, "mod")), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::IgnoredUser(UserId(7))));
    }

    #[test]
    fn ignored_channel_and_touched_roles() {
        let actor = || attributed(UserRef::new(9u64, "mod"));
        let mut cfg = enabled_config();
        cfg.ignored_channel_ids.insert(ChannelId(10));
        let v = PolicyFilter::admit(&event(), &actor(), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::IgnoredChannel(ChannelId(10))));

        let mut cfg = enabled_config();
        cfg.ignored_role_ids.insert(RoleId(77));
        let mut e = event();
        e.role_ids = vec![RoleId(1), RoleId(77)];
        let v = PolicyFilter::admit(&e, &actor(), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::IgnoredRole(RoleId(77))));
    }

    #[test]
    fn unknown_actor_passes_actor_checks_vacuously() {
        let mut cfg = enabled_config();
        cfg.include_bots = false;
        cfg.conditions.min_account_age_secs = Some(86_400);
        cfg.conditions.required_role_ids.insert(RoleId(5));
        cfg.ignored_channel_ids.insert(ChannelId(10));
        let v = PolicyFilter::admit(&event(), &AuditMatch::none(), &cfg);
        assert!(v.is_admitted());
        assert_eq!(v.reason(), "admitted");
    }

    #[test]
    fn young_accounts_and_new_members_are_filtered() {
        let now = Utc::now();
        let mut cfg = enabled_config();
        cfg.conditions.min_account_age_secs = Some(3_600);
        let mut actor = UserRef::new(8u64, "fresh");
        actor.created_at = Some(now - chrono::Duration::seconds(60));
        let v = PolicyFilter::admit_at(&event(), &attributed(actor.clone()), &cfg, now);
        assert!(matches!(v, Verdict::Reject(Rejection::AccountTooNew { .. })));

        actor.created_at = Some(now - chrono::Duration::days(30));
        cfg.conditions.min_membership_secs = Some(600);
        actor.joined_at = Some(now - chrono::Duration::seconds(10));
        let v = PolicyFilter::admit_at(&event(), &attributed(actor.clone()), &cfg, now);
        assert!(matches!(v, Verdict::Reject(Rejection::MembershipTooShort { .. })));

        actor.joined_at = Some(now - chrono::Duration::seconds(601));
        assert!(PolicyFilter::admit_at(&event(), &attributed(actor), &cfg, now).is_admitted());
    }

    #[test]
    fn required_and_excluded_roles() {
        let mut cfg = enabled_config();
        cfg.conditions.required_role_ids.insert(RoleId(5));
        cfg.conditions.excluded_role_ids.insert(RoleId(6));

        let mut actor = UserRef::new(8u64, "member");
        let v = PolicyFilter::admit(&event(), &attributed(actor.clone()), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::MissingRequiredRole));

        actor.role_ids = vec![RoleId(5), RoleId(6)];
        let v = PolicyFilter::admit(&event(), &attributed(actor.clone()), &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::ExcludedRole(RoleId(6))));

        actor.role_ids = vec![RoleId(5)];
        assert!(PolicyFilter::admit(&event(), &attributed(actor), &cfg).is_admitted());
    }

    #[test]
    fn message_length_bounds() {
        let mut cfg = enabled_config();
        cfg.conditions.message_length = Some(LengthRange {
            min: Some(3),
            max: Some(50),
        });
        let author = attributed(UserRef::new(8u64, "author"));
        let mut e = event();
        e.content_length = Some(2);
        let v = PolicyFilter::admit(&e, &author, &cfg);
        assert_eq!(v, Verdict::Reject(Rejection::MessageLength(2)));
        assert_eq!(v.reason(), "message length 2 out of range");

        e.content_length = Some(20);
        assert!(PolicyFilter::admit(&e, &author, &cfg).is_admitted());
        e.content_length = None;
        assert!(PolicyFilter::admit(&e, &author, &cfg).is_admitted());
    }
}
