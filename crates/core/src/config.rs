use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Largest page the audit-log endpoint serves.
pub const MAX_AUDIT_LOOKBACK: usize = 100;

// ── Top-level settings ────────────────────────────────────────

/// Process-wide tuning for the pipeline.
///
/// Correlation window and lookback size are tunables rather than fixed
/// constants; the defaults match what the platform's audit log usually
/// needs to surface a fresh entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub correlation: CorrelationSettings,
    pub delivery: DeliverySettings,
    pub queue: QueueSettings,
    pub api: ApiSettings,
}

impl Settings {
    /// Build settings from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            correlation: CorrelationSettings::from_env(),
            delivery: DeliverySettings::from_env(),
            queue: QueueSettings::from_env(),
            api: ApiSettings::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Settings loaded:");
        tracing::info!(
            "  correlation: window={}s, lookback={}, timeout={}s",
            self.correlation.window.as_secs(),
            self.correlation.lookback,
            self.correlation.timeout.as_secs()
        );
        tracing::info!(
            "  delivery:    timeout={}s, reason_max_chars={}",
            self.delivery.timeout.as_secs(),
            self.delivery.reason_max_chars
        );
        tracing::info!(
            "  queue:       capacity={}, concurrency={}",
            self.queue.capacity,
            self.queue.concurrency
        );
        tracing::info!(
            "  api:         base={}, token={}",
            self.api.base_url,
            if self.api.bot_token.is_some() { "set" } else { "(none)" }
        );
    }
}

// ── Correlation ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationSettings {
    /// Max distance between an audit entry and event arrival.
    pub window: Duration,
    /// Audit entries fetched per lookback query.
    pub lookback: usize,
    /// Upper bound on one lookback query.
    pub timeout: Duration,
}

impl CorrelationSettings {
    fn from_env() -> Self {
        Self {
            window: Duration::from_secs(env_u64("GUILDWATCH_CORRELATION_WINDOW_SECS", 5)),
            lookback: env_usize("GUILDWATCH_AUDIT_LOOKBACK", 10).clamp(1, MAX_AUDIT_LOOKBACK),
            timeout: Duration::from_secs(env_u64("GUILDWATCH_AUDIT_TIMEOUT_SECS", 5)),
        }
    }
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            lookback: 10,
            timeout: Duration::from_secs(5),
        }
    }
}

// ── Delivery ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Upper bound on one destination call.
    pub timeout: Duration,
    /// Audit reasons longer than this are truncated.
    pub reason_max_chars: usize,
}

impl DeliverySettings {
    fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(env_u64("GUILDWATCH_DELIVERY_TIMEOUT_SECS", 10)),
            reason_max_chars: env_usize("GUILDWATCH_REASON_MAX_CHARS", 200),
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            reason_max_chars: 200,
        }
    }
}

// ── Work queue ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    pub capacity: usize,
    /// Max events processed at once.
    pub concurrency: usize,
}

impl QueueSettings {
    fn from_env() -> Self {
        Self {
            capacity: env_usize("GUILDWATCH_QUEUE_CAPACITY", 1024).max(1),
            concurrency: env_usize("GUILDWATCH_WORKER_CONCURRENCY", 32).max(1),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            concurrency: 32,
        }
    }
}

// ── Platform API ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
}

impl ApiSettings {
    fn from_env() -> Self {
        Self {
            base_url: env_or("GUILDWATCH_API_BASE", "https://discord.com/api/v10"),
            bot_token: env_opt("GUILDWATCH_BOT_TOKEN"),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://discord.com/api/v10".to_string(),
            bot_token: None,
        }
    }
}
