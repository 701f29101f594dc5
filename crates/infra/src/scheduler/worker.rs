//! Async queue worker with retry, backoff, and dead-letter routing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use promoforge_events::{DeadLetterPayload, dead_letter_type};

use crate::outbox::OutboxStore;

use super::store::{JobStore, JobStoreError};
use super::types::{JobStatus, RetentionPolicy, ScheduledJob};

/// How a handler failed.
///
/// Retryable failures go through the job's backoff policy; fatal failures
/// (precondition/ordering violations) dead-letter immediately — retrying a
/// logic error cannot fix it.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Retryable(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(m) | Self::Fatal(m) => m,
        }
    }
}

/// Handles one job. Handlers are async, must not block the worker thread
/// synchronously, and must tolerate at-least-once delivery.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ScheduledJob) -> Result<(), HandlerError>;
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to poll when the queue is empty.
    pub poll_interval: Duration,
    /// Name for logging.
    pub name: String,
    /// Terminal-job retention.
    pub retention: RetentionPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "queue-worker".to_string(),
            retention: RetentionPolicy::default(),
        }
    }
}

/// Handle to control a running worker task.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: tokio::sync::watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Background queue worker.
///
/// Polls the job store for ready jobs, executes them with registered
/// handlers, applies the retry policy, and routes exhausted jobs' original
/// events to the dead-letter store. Multiple workers may consume from the
/// same store.
pub struct QueueWorker {
    store: Arc<dyn JobStore>,
    outbox: Arc<dyn OutboxStore>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    config: WorkerConfig,
}

impl QueueWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        outbox: Arc<dyn OutboxStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            outbox,
            handlers: HashMap::new(),
            config,
        }
    }

    /// Register a handler for an event name.
    pub fn register_handler(&mut self, event_name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(event_name.into(), handler);
    }

    /// Claim and execute at most one ready job. Returns whether a job was
    /// processed. `now` is explicit so tests can drive time.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<bool, JobStoreError> {
        let Some(mut job) = self.store.claim_next(now).await? else {
            return Ok(false);
        };

        debug!(
            worker = %self.config.name,
            job_key = %job.key,
            event_name = %job.event_name,
            attempt = job.attempt,
            "claimed job"
        );

        self.execute(&mut job).await;

        // Bound terminal history; housekeeping only.
        if let Err(e) = self.store.prune(&self.config.retention).await {
            warn!(worker = %self.config.name, error = %e, "prune failed");
        }

        Ok(true)
    }

    async fn execute(&self, job: &mut ScheduledJob) {
        let started = Utc::now();

        let outcome = match self.handlers.get(&job.event_name) {
            Some(handler) => handler.handle(job).await,
            None => Err(HandlerError::fatal(format!(
                "no handler registered for event: {}",
                job.event_name
            ))),
        };

        match outcome {
            Ok(()) => {
                job.mark_completed(started);
                if let Err(e) = self.store.update(job).await {
                    error!(job_key = %job.key, error = %e, "failed to persist completed job");
                }
                debug!(job_key = %job.key, "job completed");
            }
            Err(err) => {
                if err.is_fatal() {
                    job.mark_exhausted(err.message().to_string(), started);
                } else {
                    job.mark_failed(err.message().to_string(), started);
                }

                if let Err(e) = self.store.update(job).await {
                    error!(job_key = %job.key, error = %e, "failed to persist failed job");
                }

                match &job.status {
                    JobStatus::Exhausted { .. } => {
                        warn!(
                            job_key = %job.key,
                            event_name = %job.event_name,
                            error = %err,
                            "job exhausted; routing to dead-letter store"
                        );
                        self.dead_letter(job, err.message()).await;
                    }
                    _ => {
                        debug!(
                            job_key = %job.key,
                            attempt = job.attempt,
                            error = %err,
                            "job failed; retry scheduled"
                        );
                    }
                }
            }
        }
    }

    /// Park the original event so it can be replayed verbatim.
    async fn dead_letter(&self, job: &ScheduledJob, reason: &str) {
        let payload = DeadLetterPayload::new(job.event_name.clone(), job.data.clone(), reason);
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                error!(job_key = %job.key, error = %e, "failed to serialize dead-letter payload");
                return;
            }
        };

        match self
            .outbox
            .append(&dead_letter_type(&job.event_name), job.campaign_id, payload)
            .await
        {
            Ok(event_id) => {
                info!(job_key = %job.key, %event_id, "event dead-lettered");
            }
            Err(e) => {
                // The job record still holds the exhausted status and error,
                // so the failure is reported even if parking it failed.
                error!(job_key = %job.key, error = %e, "failed to write dead-letter row");
            }
        }
    }

    /// Spawn the worker as a background task.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
        let name = self.config.name.clone();
        let poll = self.config.poll_interval;

        let join = tokio::spawn(async move {
            info!(worker = %name, "queue worker started");
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                match self.run_once(Utc::now()).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::select! {
                            _ = tokio::time::sleep(poll) => {}
                            _ = shutdown_rx.changed() => {}
                        }
                    }
                    Err(e) => {
                        error!(worker = %name, error = %e, "failed to claim job");
                        tokio::time::sleep(poll).await;
                    }
                }
            }
            info!(worker = %name, "queue worker stopped");
        });

        WorkerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}
