//! guildwatch-worker: runs the event-logging pipeline over a feed of events.
//!
//! Reads one JSON-encoded `RawEvent` per line from a file or stdin, pushes
//! each through the bounded work queue, and delivers notifications via the
//! platform REST API. Guild configuration is seeded from a directory of
//! YAML documents.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};

use guildwatch_core::config::load_dotenv;
use guildwatch_core::{RawEvent, Settings};
use guildwatch_notify::HttpTransport;
use guildwatch_pipeline::{EventQueue, HttpAuditLog, LoadStatus, MemoryConfigStore, Pipeline};

// ── CLI ─────────────────────────────────────────────────────────────

/// Guild event-logging worker.
#[derive(Parser, Debug)]
#[command(name = "guildwatch-worker", version, about)]
struct Cli {
    /// Directory of guild configuration YAML files (scanned recursively).
    #[arg(long, env = "GUILDWATCH_CONFIG_DIR", default_value = "config/guilds")]
    config_dir: PathBuf,

    /// JSON-lines event file. Reads stdin when omitted or `-`.
    #[arg(long, env = "GUILDWATCH_EVENTS")]
    input: Option<PathBuf>,

    /// Override the platform API base URL.
    #[arg(long)]
    api_base: Option<String>,

    /// Override the bot token.
    #[arg(long, hide_env_values = true, env = "GUILDWATCH_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Send a test notification for every enabled config, then exit.
    #[arg(long)]
    send_test: bool,

    /// Evict rate-limit buckets idle for this many seconds.
    #[arg(long, env = "GUILDWATCH_BUCKET_IDLE_SECS", default_value_t = 600)]
    bucket_idle_secs: u64,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(base) = cli.api_base.clone() {
        settings.api.base_url = base;
    }
    if let Some(token) = cli.bot_token.clone() {
        settings.api.bot_token = Some(token);
    }
    settings.log_summary();

    let store = Arc::new(MemoryConfigStore::new());
    let results = store.load_dir(&cli.config_dir)?;
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
        .count();
    info!(
        path = %cli.config_dir.display(),
        configs = store.len(),
        files = results.len(),
        failed,
        "guild configs loaded"
    );

    let transport = Arc::new(HttpTransport::new(&settings.api, settings.delivery.timeout)?);
    let audit_client = reqwest::Client::builder()
        .timeout(settings.correlation.timeout)
        .build()?;
    let audit = Arc::new(HttpAuditLog::new(&settings.api, audit_client));
    let pipeline = Arc::new(Pipeline::new(&settings, store.clone(), audit, transport));

    if cli.send_test {
        for config in store.configs().into_iter().filter(|c| c.enabled) {
            let report = pipeline.dispatcher().send_test(&config).await;
            info!(
                guild_id = %config.guild_id,
                category = %config.category,
                succeeded = report.succeeded(),
                failed = report.failed(),
                "test notification sent"
            );
        }
        return Ok(());
    }

    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.notify_one();
            }
        });
    }

    let idle = Duration::from_secs(cli.bucket_idle_secs.max(1));
    {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle);
            loop {
                ticker.tick().await;
                let evicted = pipeline.rate_limiter().evict_idle(Instant::now(), idle);
                if evicted > 0 {
                    tracing::debug!(evicted, "idle rate-limit buckets evicted");
                }
            }
        });
    }

    let queue = EventQueue::start(pipeline.clone(), &settings.queue);

    // A file is replayed with backpressure; a live stdin feed drops newest
    // when the queue is full.
    let (reader, live): (Box<dyn AsyncBufRead + Unpin + Send>, bool) = match &cli.input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path).await?;
            info!(path = %path.display(), "reading events from file");
            (Box::new(BufReader::new(file)), false)
        }
        _ => {
            info!("reading events from stdin");
            (Box::new(BufReader::new(tokio::io::stdin())), true)
        }
    };

    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let interrupted = loop {
        tokio::select! {
            _ = shutdown.notified() => break true,
            line = lines.next_line() => {
                let Some(line) = line? else { break false };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let event = match RawEvent::from_json(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(line = line_no, error = %e, "skipping malformed event");
                        continue;
                    }
                };
                if live {
                    queue.try_submit(event);
                    continue;
                }
                match queue.submit_until(event, &shutdown).await {
                    Ok(true) => {}
                    Ok(false) => break true,
                    Err(_) => {
                        warn!("event queue closed early");
                        break false;
                    }
                }
            }
        }
    };

    if interrupted {
        queue.shutdown().await;
    } else {
        queue.drain().await;
    }

    let stats = pipeline.stats().snapshot();
    info!(stats = %serde_json::to_string(&stats)?, "guildwatch-worker exited cleanly");

    Ok(())
}
