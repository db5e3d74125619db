//! Delivery transport trait and shared error types.

use std::time::Duration;

use guildwatch_core::{ChannelId, UserId, WebhookTarget};

use crate::payload::MessagePayload;

/// Errors that can occur while delivering to one destination.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response: missing permission, deleted channel, revoked
    /// webhook and so on.
    #[error("destination returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("delivery timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Template error: {0}")]
    Template(String),
}

/// Outbound calls to the platform. Each call reports success or failure
/// only; no response body is consumed by the pipeline.
#[async_trait::async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Post a message to a guild channel.
    async fn post_to_channel(
        &self,
        channel_id: ChannelId,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError>;

    /// Execute a webhook.
    async fn post_to_webhook(
        &self,
        target: &WebhookTarget,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError>;

    /// Send a direct message to a user.
    async fn send_direct_message(
        &self,
        user_id: UserId,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError>;
}
