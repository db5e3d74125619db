//! Minijinja template rendering for notification text.
//!
//! Every [`EventKind`] has one title and one description template. They are
//! the only per-kind variation in the pipeline; correlation, filtering and
//! delivery are shared. Descriptions talk about the target only: actor
//! attribution is added by the composer as a separate field so an
//! unattributed event never renders a dangling "by ...".

use guildwatch_core::{EventKind, RawEvent, TargetKind};

use crate::traits::DeliveryError;

/// Title and description templates for one event kind.
#[derive(Debug, Clone, Copy)]
pub struct KindTemplates {
    pub title: &'static str,
    pub description: &'static str,
}

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub kind: &'static str,
    pub category: &'static str,
    /// Mention or label of the target, with its name when known.
    pub target: String,
    pub target_name: Option<String>,
    /// Mention of the channel the event happened in.
    pub channel: Option<String>,
    /// Mentions of the roles the event touched.
    pub roles: Vec<String>,
    /// Mention of the affected message's author.
    pub author: Option<String>,
    pub content_length: Option<usize>,
    pub change_count: usize,
}

impl TemplateContext {
    pub fn from_event(event: &RawEvent) -> Self {
        Self {
            kind: event.kind.as_str(),
            category: event.category().as_str(),
            target: target_label(event),
            target_name: event.target_name.clone(),
            channel: event.channel_id.map(|id| format!("<#{id}>")),
            roles: event.role_ids.iter().map(|id| format!("<@&{id}>")).collect(),
            author: event.author_id.map(|id| format!("<@{id}>")),
            content_length: event.content_length,
            change_count: event.changes.len(),
        }
    }
}

/// Mention syntax for the target, followed by its name in code style when
/// the platform can render the mention itself.
pub fn target_label(event: &RawEvent) -> String {
    let id = event.target_id;
    let mention = match event.kind.target_kind() {
        TargetKind::Channel | TargetKind::Thread => Some(format!("<#{id}>")),
        TargetKind::Member | TargetKind::VoiceState => Some(format!("<@{id}>")),
        TargetKind::Role => Some(format!("<@&{id}>")),
        TargetKind::Message | TargetKind::Guild | TargetKind::Emoji | TargetKind::Invite => None,
    };

    match (mention, event.target_name.as_deref()) {
        (Some(mention), Some(name)) => format!("{mention} ({})", code(name)),
        (Some(mention), None) => mention,
        (None, Some(name)) => code(name),
        (None, None) => code(&id.to_string()),
    }
}

macro_rules! updated {
    ($subject:literal) => {
        concat!(
            $subject,
            " was updated{% if change_count %} ({{ change_count }} change{{ change_count|pluralize }}){% endif %}."
        )
    };
}

/// Template pair for `kind`.
pub fn templates(kind: EventKind) -> KindTemplates {
    use EventKind::*;
    let (title, description) = match kind {
        ChannelCreate => ("Channel created", "{{ target }} was created."),
        ChannelUpdate => ("Channel updated", updated!("{{ target }}")),
        ChannelDelete => ("Channel deleted", "{{ target }} was deleted."),
        MemberJoin => ("Member joined", "{{ target }} joined the server."),
        MemberLeave => ("Member left", "{{ target }} left the server."),
        MemberUpdate => ("Member updated", updated!("{{ target }}")),
        MemberRoleUpdate => (
            "Member roles updated",
            "Roles of {{ target }} changed{% if roles %}: {{ roles|join(\", \") }}{% endif %}.",
        ),
        MemberBan => ("Member banned", "{{ target }} was banned."),
        MemberUnban => ("Member unbanned", "{{ target }} was unbanned."),
        RoleCreate => ("Role created", "{{ target }} was created."),
        RoleUpdate => ("Role updated", updated!("{{ target }}")),
        RoleDelete => ("Role deleted", "{{ target }} was deleted."),
        MessageUpdate => (
            "Message edited",
            "A message{% if author %} by {{ author }}{% endif %} was edited{% if channel %} in {{ channel }}{% endif %}.",
        ),
        MessageDelete => (
            "Message deleted",
            "A message{% if author %} by {{ author }}{% endif %} was deleted{% if channel %} in {{ channel }}{% endif %}.",
        ),
        MessageBulkDelete => (
            "Messages purged",
            "Messages were bulk deleted{% if channel %} in {{ channel }}{% endif %}.",
        ),
        GuildUpdate => ("Server updated", updated!("The server")),
        EmojiCreate => ("Emoji created", "{{ target }} was added."),
        EmojiUpdate => ("Emoji updated", updated!("{{ target }}")),
        EmojiDelete => ("Emoji deleted", "{{ target }} was removed."),
        InviteCreate => (
            "Invite created",
            "Invite {{ target }} was created{% if channel %} for {{ channel }}{% endif %}.",
        ),
        InviteDelete => ("Invite deleted", "Invite {{ target }} was deleted."),
        ThreadCreate => (
            "Thread created",
            "{{ target }} was created{% if channel %} in {{ channel }}{% endif %}.",
        ),
        ThreadUpdate => ("Thread updated", updated!("{{ target }}")),
        ThreadDelete => ("Thread deleted", "{{ target }} was deleted."),
        VoiceJoin => (
            "Voice channel joined",
            "{{ target }} joined {% if channel %}{{ channel }}{% else %}a voice channel{% endif %}.",
        ),
        VoiceLeave => (
            "Voice channel left",
            "{{ target }} left {% if channel %}{{ channel }}{% else %}a voice channel{% endif %}.",
        ),
        VoiceMove => (
            "Voice channel switched",
            "{{ target }} moved to {% if channel %}{{ channel }}{% else %}another voice channel{% endif %}.",
        ),
    };
    KindTemplates { title, description }
}

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    env: minijinja::Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            env: Self::build_env(),
        }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("code", code_filter);
        env.add_filter("pluralize", pluralize_filter);
        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, DeliveryError> {
        self.env
            .render_str(template_str, ctx)
            .map_err(|e| DeliveryError::Template(e.to_string()))
    }

    /// Render the title and description for `ctx`'s event kind.
    pub fn render_kind(
        &self,
        kind: EventKind,
        ctx: &TemplateContext,
    ) -> Result<(String, String), DeliveryError> {
        let templates = templates(kind);
        Ok((
            self.render(templates.title, ctx)?,
            self.render(templates.description, ctx)?,
        ))
    }

    /// Check that a template string parses.
    pub fn validate(&self, template_str: &str) -> Result<(), DeliveryError> {
        self.env
            .template_from_str(template_str)
            .map_err(|e| DeliveryError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a value in inline code, stripping backticks that would break out.
pub fn code(value: &str) -> String {
    format!("`{}`", value.replace('`', "'"))
}

fn code_filter(value: String) -> String {
    code(&value)
}

fn pluralize_filter(count: i64) -> String {
    if count == 1 {
        String::new()
    } else {
        "s".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use guildwatch_core::{ChannelId, FieldChange, GuildId, RoleId, UserId};

    const ALL_KINDS: [EventKind; 27] = {
        use EventKind::*;
        [
            ChannelCreate, ChannelUpdate, ChannelDelete, MemberJoin, MemberLeave, MemberUpdate,
            MemberRoleUpdate, MemberBan, MemberUnban, RoleCreate, RoleUpdate, RoleDelete,
            MessageUpdate, MessageDelete, MessageBulkDelete, GuildUpdate, EmojiCreate, EmojiUpdate,
            EmojiDelete, InviteCreate, InviteDelete, ThreadCreate, ThreadUpdate, ThreadDelete,
            VoiceJoin, VoiceLeave, VoiceMove,
        ]
    };

    fn event(kind: EventKind) -> RawEvent {
        RawEvent::new(kind, GuildId(1), 10, Utc::now())
    }

    #[test]
    fn every_kind_renders() {
        let renderer = TemplateRenderer::new();
        for kind in ALL_KINDS {
            let ctx = TemplateContext::from_event(&event(kind));
            let (title, description) = renderer.render_kind(kind, &ctx).unwrap();
            assert!(!title.is_empty(), "{kind} title");
            assert!(description.ends_with('.'), "{kind}: {description}");
        }
    }

    #[test]
    fn mentions_follow_target_kind() {
        let mut e = event(EventKind::ChannelCreate);
        assert_eq!(target_label(&e), "<#10>");
        e.target_name = Some("general".into());
        assert_eq!(target_label(&e), "<#10> (`general`)");

        assert_eq!(target_label(&event(EventKind::MemberBan)), "<@10>");
        assert_eq!(target_label(&event(EventKind::RoleDelete)), "<@&10>");
        assert_eq!(target_label(&event(EventKind::InviteCreate)), "`10`");

        let mut emoji = event(EventKind::EmojiCreate);
        emoji.target_name = Some("party`parrot".into());
        assert_eq!(target_label(&emoji), "`party'parrot`");
    }

    #[test]
    fn description_includes_channel_and_author_when_known() {
        let renderer = TemplateRenderer::new();
        let mut e = event(EventKind::MessageDelete);
        let ctx = TemplateContext::from_event(&e);
        let (_, bare) = renderer.render_kind(e.kind, &ctx).unwrap();
        assert_eq!(bare, "A message was deleted.");

        e.channel_id = Some(ChannelId(5));
        e.author_id = Some(UserId(7));
        let ctx = TemplateContext::from_event(&e);
        let (title, full) = renderer.render_kind(e.kind, &ctx).unwrap();
        assert_eq!(title, "Message deleted");
        assert_eq!(full, "A message by <@7> was deleted in <#5>.");
    }

    #[test]
    fn change_count_suffix() {
        let renderer = TemplateRenderer::new();
        let mut e = event(EventKind::RoleUpdate);
        e.changes = vec![
            FieldChange { field: "name".into(), before: None, after: None },
            FieldChange { field: "color".into(), before: None, after: None },
        ];
        let ctx = TemplateContext::from_event(&e);
        let (_, description) = renderer.render_kind(e.kind, &ctx).unwrap();
        assert_eq!(description, "<@&10> was updated (2 changes).");
    }

    #[test]
    fn role_list_is_joined() {
        let renderer = TemplateRenderer::new();
        let mut e = event(EventKind::MemberRoleUpdate);
        e.role_ids = vec![RoleId(1), RoleId(2)];
        let ctx = TemplateContext::from_event(&e);
        let (_, description) = renderer.render_kind(e.kind, &ctx).unwrap();
        assert_eq!(description, "Roles of <@10> changed: <@&1>, <@&2>.");
    }

    #[test]
    fn custom_filters() {
        let renderer = TemplateRenderer::new();
        let ctx = TemplateContext::from_event(&event(EventKind::GuildUpdate));
        let out = renderer
            .render("{{ kind|code }} x{{ 2|pluralize }}", &ctx)
            .unwrap();
        assert_eq!(out, "`guild_update` xs");
    }

    #[test]
    fn invalid_template_is_reported() {
        let renderer = TemplateRenderer::new();
        let err = renderer.validate("{% if %}").unwrap_err();
        assert!(matches!(err, DeliveryError::Template(_)));
    }
}
