//! Orchestrator configuration.
//!
//! The engine never reads process-wide globals; a single `OrchestratorConfig`
//! is constructed at the composition root and passed down explicitly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the campaign orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long a published campaign runs before its close job fires.
    pub campaign_duration_minutes: u64,

    /// How far past `close_at` a still-in-progress campaign must be before
    /// the stuck scan reports it. Diagnostic only.
    pub stuck_threshold_minutes: u64,

    /// Retry attempts for close-sequence delivery jobs.
    pub close_max_attempts: u32,

    /// Exponential backoff base for close-sequence retries.
    pub close_backoff_base_secs: u64,

    /// Default retry attempts for event delivery jobs.
    pub delivery_max_attempts: u32,

    /// Exponential backoff base for default event delivery retries.
    pub delivery_backoff_base_millis: u64,

    /// Completed jobs kept for inspection before pruning.
    pub retain_completed_jobs: usize,

    /// Exhausted/failed jobs kept for inspection before pruning.
    pub retain_failed_jobs: usize,

    /// Scheduler worker poll interval.
    pub worker_poll_millis: u64,

    /// Additional critical-failure patterns beyond the built-in set.
    #[serde(default)]
    pub extra_critical_patterns: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            campaign_duration_minutes: 24 * 60,
            stuck_threshold_minutes: 30,
            close_max_attempts: 5,
            close_backoff_base_secs: 30,
            delivery_max_attempts: 3,
            delivery_backoff_base_millis: 500,
            retain_completed_jobs: 100,
            retain_failed_jobs: 500,
            worker_poll_millis: 100,
            extra_critical_patterns: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn campaign_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.campaign_duration_minutes as i64)
    }

    pub fn stuck_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stuck_threshold_minutes as i64)
    }

    pub fn close_backoff_base(&self) -> Duration {
        Duration::from_secs(self.close_backoff_base_secs)
    }

    pub fn delivery_backoff_base(&self) -> Duration {
        Duration::from_millis(self.delivery_backoff_base_millis)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_millis)
    }
}
