//! Turn an admitted event into a destination-agnostic [`Notification`].

use tracing::warn;

use guildwatch_core::config::DeliverySettings;
use guildwatch_core::{AuditMatch, GuildEventConfig, RawEvent};

use crate::notification::{Attribution, Destination, Notification, NotificationField};
use crate::templating::{code, target_label, TemplateContext, TemplateRenderer};

/// At most this many change entries become fields.
pub const MAX_CHANGE_FIELDS: usize = 10;

/// Upper bound on a single field value.
pub const MAX_FIELD_VALUE_CHARS: usize = 1024;

pub struct NotificationComposer {
    renderer: TemplateRenderer,
    reason_max_chars: usize,
}

impl NotificationComposer {
    pub fn new(settings: &DeliverySettings) -> Self {
        Self {
            renderer: TemplateRenderer::new(),
            reason_max_chars: settings.reason_max_chars.max(1),
        }
    }

    /// Build the notification for `event`.
    ///
    /// Never fails: a template that cannot render falls back to the event
    /// kind as title and the target label as description.
    pub fn compose(
        &self,
        event: &RawEvent,
        matched: &AuditMatch,
        config: &GuildEventConfig,
    ) -> Notification {
        let ctx = TemplateContext::from_event(event);
        let (title, description) = match self.renderer.render_kind(event.kind, &ctx) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(kind = %event.kind, error = %e, "notification template failed");
                (event.kind.as_str().to_string(), target_label(event))
            }
        };

        let reason = matched
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| truncate_chars(r, self.reason_max_chars));

        let mut fields = event_fields(event, &ctx);

        if let Some(actor) = &matched.actor {
            fields.push(NotificationField::inline(
                "Actor",
                format!("{} ({})", actor.mention(), code(&actor.name)),
            ));
        }
        if let Some(reason) = &reason {
            fields.push(NotificationField::new("Reason", reason.clone()));
        }

        Notification {
            guild_id: event.guild_id,
            category: event.category(),
            kind: event.kind,
            title,
            description,
            fields,
            color: config
                .display
                .embed_color
                .unwrap_or_else(|| event.category().default_color()),
            timestamp: event.occurred_at,
            actor: matched.actor.as_ref().map(|actor| Attribution {
                user_id: actor.id,
                name: actor.name.clone(),
                avatar_url: actor.avatar_url.clone(),
            }),
            reason,
            thumbnail_url: event.image_url.clone(),
            display: config.display.clone(),
            destinations: Destination::resolve(config),
        }
    }
}

fn event_fields(event: &RawEvent, ctx: &TemplateContext) -> Vec<NotificationField> {
    let mut fields = vec![NotificationField::inline("Target", ctx.target.clone())];

    if let Some(channel) = &ctx.channel {
        fields.push(NotificationField::inline("Channel", channel.clone()));
    }
    if !ctx.roles.is_empty() {
        fields.push(NotificationField::new(
            "Roles",
            truncate_chars(&ctx.roles.join(" "), MAX_FIELD_VALUE_CHARS),
        ));
    }
    if let Some(len) = event.content_length {
        fields.push(NotificationField::inline("Length", format!("{len} characters")));
    }

    for change in event.changes.iter().take(MAX_CHANGE_FIELDS) {
        let before = change.before.as_deref().map_or("*none*".to_string(), code);
        let after = change.after.as_deref().map_or("*none*".to_string(), code);
        fields.push(NotificationField::new(
            change.field.clone(),
            truncate_chars(&format!("{before} → {after}"), MAX_FIELD_VALUE_CHARS),
        ));
    }

    fields
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
