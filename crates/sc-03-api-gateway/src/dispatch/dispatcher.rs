//! Async job dispatcher.
//!
//! Submissions go onto a bounded queue drained by a fixed pool of worker
//! tasks. Each worker runs the CPU-bound pipeline on the blocking thread pool
//! and pushes the result to the submitter's live channel, if one is open.
//!
//! ```text
//! submit ──try_send──→ [ bounded mpsc ] ──→ worker 0..N ──spawn_blocking──→ pipeline
//!                                                │
//!                                                └──deliver──→ LiveChannelRegistry
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sc_02_enhancement_pipeline::{EnhancementPipeline, FilterConfig, PipelineOutcome};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::channels::{DeliveryMiss, LiveChannelRegistry, ResultMessage};

/// Message text of a successful run
pub const PROCESSED_MESSAGE: &str = "Image processed successfully";

/// One queued pipeline run. Owns everything the run needs.
#[derive(Debug, Clone)]
pub struct Job {
    pub session_id: String,
    pub image: Vec<u8>,
    pub mime_type: String,
    /// Snapshot of the session configuration at submission time
    pub config: FilterConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Server is busy, try again later")]
    QueueFull,

    #[error("Dispatcher is shut down")]
    Closed,
}

/// Dispatcher counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub submitted: AtomicU64,
    pub delivered: AtomicU64,
    pub missed: AtomicU64,
    pub failed: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub submitted: u64,
    pub delivered: u64,
    pub missed: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle for submitting jobs. Dropping it aborts the workers.
pub struct Dispatcher {
    tx: mpsc::Sender<Job>,
    stats: Arc<DispatchStats>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn `workers` worker tasks sharing a queue of `queue_depth` slots.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        pipeline: EnhancementPipeline,
        channels: Arc<LiveChannelRegistry>,
        workers: usize,
        queue_depth: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(DispatchStats::default());

        let workers = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&rx),
                    pipeline.clone(),
                    Arc::clone(&channels),
                    Arc::clone(&stats),
                ))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), queue_depth, "Dispatcher started");

        Self { tx, stats, workers }
    }

    /// Queue a job without waiting.
    pub fn submit(&self, job: Job) -> Result<(), DispatchError> {
        let session_id = job.session_id.clone();
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!(session_id = %session_id, "Job queue full; rejecting submission");
                DispatchError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })?;

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(session_id = %session_id, "Job queued");
        Ok(())
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    pipeline: EnhancementPipeline,
    channels: Arc<LiveChannelRegistry>,
    stats: Arc<DispatchStats>,
) {
    loop {
        // Lock only while waiting for the next job, not while running it.
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            debug!(worker, "Job queue closed; worker exiting");
            break;
        };
        process(worker, job, &pipeline, &channels, &stats).await;
    }
}

async fn process(
    worker: usize,
    job: Job,
    pipeline: &EnhancementPipeline,
    channels: &LiveChannelRegistry,
    stats: &DispatchStats,
) {
    let Job {
        session_id,
        image,
        mime_type,
        config,
    } = job;

    let outcome = task::spawn_blocking({
        let pipeline = pipeline.clone();
        move || pipeline.run(&image, &mime_type, &config)
    })
    .await;

    let outcome = match outcome {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(worker, session_id = %session_id, error = %e, "Pipeline run failed");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Err(e) => {
            error!(worker, session_id = %session_id, error = %e, "Pipeline task aborted");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    match channels.deliver(&session_id, Arc::new(result_message(outcome))) {
        Ok(connection_id) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            info!(worker, session_id = %session_id, connection = %connection_id, "Result delivered");
        }
        Err(DeliveryMiss::NoChannel) => {
            stats.missed.fetch_add(1, Ordering::Relaxed);
            info!(worker, session_id = %session_id, "No live channel; result dropped");
        }
        Err(DeliveryMiss::Closed) => {
            stats.missed.fetch_add(1, Ordering::Relaxed);
            warn!(worker, session_id = %session_id, "Live channel closed before delivery");
        }
    }
}

/// Build the client payload for a finished run.
pub fn result_message(outcome: PipelineOutcome) -> ResultMessage {
    ResultMessage {
        message: PROCESSED_MESSAGE.to_string(),
        image: STANDARD.encode(&outcome.encoded),
        duration: outcome.durations,
        errors: outcome.errors,
    }
}
