//! Fans a notification out to its destinations.
//!
//! Every destination is sent in parallel with its own timeout. A failing
//! destination never blocks or fails the others, and there is no automatic
//! retry: the next event of the same category is the natural retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use guildwatch_core::config::DeliverySettings;
use guildwatch_core::{Category, GuildEventConfig, GuildId};

use crate::notification::{Destination, Notification};
use crate::payload::MessagePayload;
use crate::traits::{DeliveryError, DeliveryTransport};

/// Result of one destination delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub destination: Destination,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Per-destination results of one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub guild_id: GuildId,
    pub category: Category,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn new(guild_id: GuildId, category: Category) -> Self {
        Self {
            guild_id,
            category,
            outcomes: Vec::new(),
        }
    }

    /// At least one destination accepted the notification.
    pub fn triggered(&self) -> bool {
        self.outcomes.iter().any(|o| o.success)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome_for(&self, destination: &Destination) -> Option<&DeliveryOutcome> {
        self.outcomes.iter().find(|o| &o.destination == destination)
    }

    /// Replace the entry for `outcome.destination`, or append it.
    fn record(&mut self, outcome: DeliveryOutcome) {
        match self
            .outcomes
            .iter_mut()
            .find(|o| o.destination == outcome.destination)
        {
            Some(slot) => *slot = outcome,
            None => self.outcomes.push(outcome),
        }
    }
}

pub struct Dispatcher {
    transport: Arc<dyn DeliveryTransport>,
    /// Per-destination bound, so one slow destination cannot hold a worker.
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn DeliveryTransport>, settings: &DeliverySettings) -> Self {
        Self::with_timeout(transport, settings.timeout)
    }

    pub fn with_timeout(transport: Arc<dyn DeliveryTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Deliver `notification` to all of its destinations.
    pub async fn dispatch(&self, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::new(notification.guild_id, notification.category);

        if notification.destinations.is_empty() {
            debug!(
                guild_id = %notification.guild_id,
                category = %notification.category,
                "No destinations configured"
            );
            return report;
        }

        let payload = MessagePayload::from_notification(notification);
        let sends = notification
            .destinations
            .iter()
            .map(|destination| self.deliver(notification, destination, &payload));

        report.outcomes = join_all(sends).await;
        report
    }

    /// Send `notification` to one destination again and overwrite only that
    /// destination's entry in `report`. Returns whether it succeeded.
    pub async fn redeliver(
        &self,
        notification: &Notification,
        destination: &Destination,
        report: &mut DeliveryReport,
    ) -> bool {
        let payload = MessagePayload::from_notification(notification);
        let outcome = self.deliver(notification, destination, &payload).await;
        let success = outcome.success;
        report.record(outcome);
        success
    }

    /// Send a sample notification to every destination of `config`.
    pub async fn send_test(&self, config: &GuildEventConfig) -> DeliveryReport {
        let notification = Notification::sample(config);
        info!(
            guild_id = %config.guild_id,
            category = %config.category,
            destinations = notification.destinations.len(),
            "Sending test notification"
        );
        self.dispatch(&notification).await
    }

    async fn deliver(
        &self,
        notification: &Notification,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> DeliveryOutcome {
        let start = Instant::now();
        let send = self.send(notification, destination, payload);
        let result = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                info!(
                    guild_id = %notification.guild_id,
                    category = %notification.category,
                    destination = %destination,
                    duration_ms,
                    "Notification delivered"
                );
                (true, None)
            }
            Err(e) => {
                warn!(
                    guild_id = %notification.guild_id,
                    category = %notification.category,
                    destination = %destination,
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        DeliveryOutcome {
            destination: destination.clone(),
            success,
            error,
            duration_ms,
        }
    }

    async fn send(
        &self,
        notification: &Notification,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<(), DeliveryError> {
        match destination {
            Destination::Channel { channel_id } => {
                self.transport.post_to_channel(*channel_id, payload).await
            }
            Destination::Webhook { target } => self.transport.post_to_webhook(target, payload).await,
            Destination::RolePing {
                channel_id,
                role_ids,
            } => {
                let ping = MessagePayload::role_ping(notification, role_ids);
                self.transport.post_to_channel(*channel_id, &ping).await
            }
            Destination::DirectMessage { user_id } => {
                self.transport.send_direct_message(*user_id, payload).await
            }
        }
    }
}
