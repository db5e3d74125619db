//! Bounded work queue in front of the pipeline.
//!
//! Ingestion pushes events into a bounded channel; a single worker pulls
//! them and spawns one task per event, with a semaphore capping how many
//! run at once. A full queue drops the newest event, which is the right
//! call for live notifications where a stale alert has no value.

use std::sync::Arc;

use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use guildwatch_core::config::QueueSettings;
use guildwatch_core::RawEvent;

use crate::pipeline::Pipeline;

/// Returned by [`EventQueue::submit`] once the queue has stopped.
#[derive(Debug, thiserror::Error)]
#[error("event queue is closed")]
pub struct QueueClosed(pub RawEvent);

pub struct EventQueue {
    tx: mpsc::Sender<RawEvent>,
    shutdown: Arc<Notify>,
    worker: JoinHandle<()>,
    pipeline: Arc<Pipeline>,
}

impl EventQueue {
    /// Start the worker on the current runtime.
    pub fn start(pipeline: Arc<Pipeline>, settings: &QueueSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        let concurrency = settings.concurrency.clamp(1, u32::MAX as usize) as u32;
        let shutdown = Arc::new(Notify::new());

        let worker = tokio::spawn(run(
            Arc::clone(&pipeline),
            rx,
            Arc::clone(&shutdown),
            concurrency,
        ));

        info!(
            capacity = settings.capacity,
            concurrency, "event queue started"
        );

        Self {
            tx,
            shutdown,
            worker,
            pipeline,
        }
    }

    /// Enqueue without waiting. Returns `false` if the event was dropped.
    pub fn try_submit(&self, event: RawEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.pipeline.stats().record_dropped();
                warn!(
                    guild_id = %event.guild_id,
                    kind = %event.kind,
                    "event queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.pipeline.stats().record_dropped();
                false
            }
        }
    }

    /// Enqueue, waiting for room.
    pub async fn submit(&self, event: RawEvent) -> Result<(), QueueClosed> {
        self.tx.send(event).await.map_err(|e| QueueClosed(e.0))
    }

    /// Like [`submit`](Self::submit), but gives up once `stop` is notified.
    ///
    /// Returns `Ok(false)` when the wait was cut short; the event is not
    /// enqueued in that case.
    pub async fn submit_until(&self, event: RawEvent, stop: &Notify) -> Result<bool, QueueClosed> {
        tokio::select! {
            _ = stop.notified() => Ok(false),
            sent = self.submit(event) => sent.map(|()| true),
        }
    }

    /// Stop accepting events, process everything already queued and wait
    /// for in-flight tasks.
    pub async fn drain(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!(error = %e, "event queue worker panicked");
        }
    }

    /// Stop immediately: queued events are abandoned, in-flight tasks are
    /// allowed to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let Self { tx, worker, .. } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!(error = %e, "event queue worker panicked");
        }
    }
}

async fn run(
    pipeline: Arc<Pipeline>,
    mut rx: mpsc::Receiver<RawEvent>,
    shutdown: Arc<Notify>,
    concurrency: u32,
) {
    let limit = Arc::new(Semaphore::new(concurrency as usize));

    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            break;
        };
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = pipeline.handle_event(event).await;
            debug!(?outcome, "event processed");
        });
    }

    rx.close();
    let mut abandoned = 0usize;
    while rx.try_recv().is_ok() {
        pipeline.stats().record_dropped();
        abandoned += 1;
    }
    if abandoned > 0 {
        info!(abandoned, "queued events abandoned on shutdown");
    }

    // Every permit back means every spawned task has finished.
    if limit.acquire_many(concurrency).await.is_err() {
        warn!("event queue semaphore closed while waiting for in-flight tasks");
    }
    info!("event queue stopped");
}
