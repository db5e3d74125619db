//! Per-event orchestration.
//!
//! `RawEvent -> config lookup -> correlation -> policy -> rate limit ->
//! compose -> dispatch -> record trigger`. Every stage failure is contained
//! in the returned [`PipelineOutcome`]; nothing here is fatal to the process.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use guildwatch_core::{GuildEventConfig, RawEvent, Settings};
use guildwatch_notify::{DeliveryReport, DeliveryTransport, Dispatcher, NotificationComposer};
use guildwatch_rules::{AuditCorrelator, AuditLogSource, PolicyFilter, RateLimiter, Rejection, Verdict};

use crate::stats::PipelineStats;
use crate::store::ConfigStore;

/// Why an event was dropped before policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No configuration record for the guild and category.
    NoConfig,
    Disabled,
    /// The config store failed; treated like a missing record.
    StoreUnavailable,
}

/// What happened to one event.
#[derive(Debug)]
pub enum PipelineOutcome {
    Skipped(SkipReason),
    Rejected(Rejection),
    RateLimited,
    /// At least one destination accepted the notification.
    Delivered(DeliveryReport),
    /// Every destination failed.
    Undelivered(DeliveryReport),
}

impl PipelineOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            Self::Delivered(report) | Self::Undelivered(report) => Some(report),
            _ => None,
        }
    }
}

/// The event-logging pipeline and everything it depends on.
///
/// Built once at startup and shared by reference (`Arc<Pipeline>`) across
/// event tasks.
pub struct Pipeline {
    store: Arc<dyn ConfigStore>,
    correlator: AuditCorrelator,
    limiter: RateLimiter,
    composer: NotificationComposer,
    dispatcher: Dispatcher,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn ConfigStore>,
        audit: Arc<dyn AuditLogSource>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        Self {
            store,
            correlator: AuditCorrelator::new(audit, &settings.correlation),
            limiter: RateLimiter::new(),
            composer: NotificationComposer::new(&settings.delivery),
            dispatcher: Dispatcher::new(transport, &settings.delivery),
            stats: PipelineStats::new(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Process one event to completion.
    pub async fn handle_event(&self, event: RawEvent) -> PipelineOutcome {
        let arrived_at = Utc::now();
        self.stats.record_received();
        let category = event.category();

        let config = match self.load_config(&event).await {
            Ok(config) => config,
            Err(reason) => {
                self.stats.record_skipped();
                debug!(guild_id = %event.guild_id, %category, kind = %event.kind, ?reason, "event skipped");
                return PipelineOutcome::Skipped(reason);
            }
        };

        let matched = self.correlator.correlate_at(&event, arrived_at).await;
        if matched.is_attributed() {
            self.stats.record_attributed();
        }

        if let Verdict::Reject(rejection) = PolicyFilter::admit(&event, &matched, &config) {
            self.stats.record_rejected();
            debug!(
                guild_id = %event.guild_id,
                %category,
                kind = %event.kind,
                reason = %rejection,
                "event rejected by policy"
            );
            return PipelineOutcome::Rejected(rejection);
        }

        // Tokens are taken before any delivery I/O, so abandoning the
        // dispatch later never charges twice.
        if !self.limiter.admit(config.key(), &config.rate_limit) {
            self.stats.record_rate_limited();
            info!(
                guild_id = %event.guild_id,
                %category,
                kind = %event.kind,
                per_minute = config.rate_limit.per_minute,
                burst = config.rate_limit.burst,
                "event rate limited"
            );
            return PipelineOutcome::RateLimited;
        }

        let notification = self.composer.compose(&event, &matched, &config);
        let report = self.dispatcher.dispatch(&notification).await;

        if !report.triggered() {
            self.stats.record_undelivered();
            warn!(
                guild_id = %event.guild_id,
                %category,
                kind = %event.kind,
                destinations = report.outcomes.len(),
                "no destination accepted the notification"
            );
            return PipelineOutcome::Undelivered(report);
        }

        self.stats.record_delivered();
        if let Err(e) = self
            .store
            .record_trigger(event.guild_id, category, Utc::now())
            .await
        {
            warn!(guild_id = %event.guild_id, %category, error = %e, "failed to record trigger");
        }
        PipelineOutcome::Delivered(report)
    }

    /// Spawn [`handle_event`](Self::handle_event) on the runtime.
    pub fn spawn_event(self: &Arc<Self>, event: RawEvent) -> tokio::task::JoinHandle<PipelineOutcome> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.handle_event(event).await })
    }

    async fn load_config(&self, event: &RawEvent) -> Result<GuildEventConfig, SkipReason> {
        match self.store.get(event.guild_id, event.category()).await {
            Ok(Some(config)) if config.enabled => Ok(config),
            Ok(Some(_)) => Err(SkipReason::Disabled),
            Ok(None) => Err(SkipReason::NoConfig),
            Err(e) => {
                warn!(
                    guild_id = %event.guild_id,
                    category = %event.category(),
                    error = %e,
                    "config lookup failed, skipping event"
                );
                Err(SkipReason::StoreUnavailable)
            }
        }
    }
}
