//! reqwest-backed [`DeliveryTransport`] against the platform REST API.
//!
//! Channel posts and DM channel creation authenticate with the bot token;
//! webhook executions carry their own credentials in the URL. Environment
//! variable references (`${VAR_NAME}`) in webhook URLs are resolved per
//! request so secrets can stay out of the config documents.

use std::time::Duration;

use serde::Deserialize;

use guildwatch_core::config::ApiSettings;
use guildwatch_core::{ChannelId, UserId, WebhookTarget};

use crate::payload::MessagePayload;
use crate::traits::{DeliveryError, DeliveryTransport};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    api_base: String,
    bot_token: Option<String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

impl HttpTransport {
    /// Build a transport from API settings.
    ///
    /// `timeout` bounds each request; the dispatcher applies its own
    /// per-destination timeout on top.
    pub fn new(api: &ApiSettings, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("guildwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            api_base: api.base_url.trim_end_matches('/').to_string(),
            bot_token: api.bot_token.clone(),
            client,
        })
    }

    fn authorization(&self) -> Result<String, DeliveryError> {
        self.bot_token
            .as_deref()
            .map(|token| format!("Bot {token}"))
            .ok_or_else(|| DeliveryError::Config("bot token is not configured".to_string()))
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        authorized: bool,
    ) -> Result<reqwest::Response, DeliveryError> {
        let mut request = self.client.post(url).json(body);
        if authorized {
            request = request.header(reqwest::header::AUTHORIZATION, self.authorization()?);
        }
        let response = request.send().await?;
        check_status(response).await
    }
}

#[async_trait::async_trait]
impl DeliveryTransport for HttpTransport {
    async fn post_to_channel(
        &self,
        channel_id: ChannelId,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        self.post_json(&url, payload, true).await?;
        tracing::debug!(%channel_id, "channel message posted");
        Ok(())
    }

    async fn post_to_webhook(
        &self,
        target: &WebhookTarget,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError> {
        let url = resolve_env_vars(&target.url(&self.api_base))?;
        self.post_json(&url, payload, false).await?;
        tracing::debug!(webhook = %target.redacted(), "webhook executed");
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user_id: UserId,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}/users/@me/channels", self.api_base);
        let body = serde_json::json!({ "recipient_id": user_id.to_string() });
        let channel: DmChannel = self.post_json(&url, &body, true).await?.json().await?;

        let channel_id = channel
            .id
            .parse::<u64>()
            .map(ChannelId::from)
            .map_err(|e| DeliveryError::Config(format!("invalid DM channel id '{}': {e}", channel.id)))?;

        self.post_to_channel(channel_id, payload).await
    }
}

/// Map non-2xx responses to errors, keeping the body for diagnostics.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Handle rate limiting (HTTP 429).
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let header_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let retry_after = header_secs
            .or_else(|| body.get("retry_after").and_then(|v| v.as_f64()))
            .unwrap_or(5.0);
        return Err(DeliveryError::RateLimited {
            retry_after_secs: retry_after.ceil() as u64,
        });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(DeliveryError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Resolve `${VAR_NAME}` references against the process environment.
fn resolve_env_vars(input: &str) -> Result<String, DeliveryError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                // Never echo the input: it may be a webhook URL with a token.
                return Err(DeliveryError::Config(
                    "unclosed env var reference in webhook url".to_string(),
                ));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| DeliveryError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
