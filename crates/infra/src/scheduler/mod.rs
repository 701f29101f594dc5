//! Persistent, time-ordered scheduler queue.
//!
//! ## Design
//!
//! - Jobs carry a caller-supplied, deterministic key: re-submitting the same
//!   logical unit of work is duplicate suppression, not an error
//! - Immediate and future-dated execution (`execute_at`)
//! - Per-job retry policy with exponential backoff
//! - Retry exhaustion routes the original event to the dead-letter store
//! - Completed/exhausted jobs are pruned to a bounded tail
//!
//! ## Components
//!
//! - `ScheduledJob`: the job record with payload, policy and attempt history
//! - `JobStore`: persistence boundary (in-memory for tests/dev; the broker
//!   backing may be shared by multiple worker processes)
//! - `QueueWorker`: async poll loop executing jobs via registered handlers

pub mod store;
pub mod types;
pub mod worker;

pub use store::{EnqueueOutcome, InMemoryJobStore, JobStore, JobStoreError, QueueStats};
pub use types::{
    BackoffStrategy, JobAttemptRecord, JobPriority, JobStatus, RetentionPolicy, RetryPolicy,
    ScheduledJob,
};
pub use worker::{HandlerError, JobHandler, QueueWorker, WorkerConfig, WorkerHandle};
