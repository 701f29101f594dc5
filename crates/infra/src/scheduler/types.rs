//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use promoforge_core::{CampaignId, JobKey};

/// Delivery priority. Higher priorities are claimed first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to become ready.
    Pending,
    /// Currently being executed.
    Running,
    /// Completed successfully.
    Completed,
    /// Failed, will be retried after backoff.
    Failed { error: String, attempt: u32 },
    /// Retries exhausted (or failure was fatal); original event routed to
    /// the dead-letter store.
    Exhausted { error: String, attempts: u32 },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Exhausted { .. })
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, JobStatus::Failed { .. })
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1).
    #[default]
    Exponential,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total tries allowed (0 = dead-letter on first failure).
    pub max_attempts: u32,
    /// Base delay between retries.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Backoff strategy.
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10 * 60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy that dead-letters on the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Fixed delay between a bounded number of tries.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Exponential backoff starting at `base_delay`.
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Delay before the given attempt number (1-indexed) is retried.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((attempt - 1) as i32);
                (base_ms * exp).min(max_ms)
            }
        };

        Duration::from_millis(delay_ms as u64)
    }

    /// Check if more tries are allowed after `attempt` tries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Bounds how many terminal jobs are kept for inspection.
///
/// Housekeeping only — correctness never depends on retained history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub retain_completed: usize,
    pub retain_failed: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retain_completed: 100,
            retain_failed: 500,
        }
    }
}

/// Record of a job execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

/// A scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Deterministic, caller-supplied identity of the logical unit of work.
    pub key: JobKey,
    /// Event name routed to the matching handler.
    pub event_name: String,
    /// Campaign this job belongs to, when it has one.
    pub campaign_id: Option<CampaignId>,
    /// JSON payload handed to the handler.
    pub data: JsonValue,
    pub priority: JobPriority,
    pub retry: RetryPolicy,
    /// Current attempt number (starts at 0, increments when claimed).
    pub attempt: u32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the job becomes ready (None = immediately).
    pub execute_at: Option<DateTime<Utc>>,
    /// Errors from previous attempts.
    pub history: Vec<JobAttemptRecord>,
}

impl ScheduledJob {
    pub fn new(key: JobKey, event_name: impl Into<String>, data: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            key,
            event_name: event_name.into(),
            campaign_id: None,
            data,
            priority: JobPriority::Normal,
            retry: RetryPolicy::default(),
            attempt: 0,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            execute_at: None,
            history: Vec::new(),
        }
    }

    pub fn with_campaign(mut self, campaign_id: Option<CampaignId>) -> Self {
        self.campaign_id = campaign_id;
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Schedule for a fixed point in time.
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.execute_at = Some(at);
        self
    }

    /// Schedule with a delay from now.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.execute_at = Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());
        self
    }

    /// Ready to execute at `now`?
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self.execute_at {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// Mark claimed for execution.
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.updated_at = Utc::now();
    }

    /// Mark completed.
    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: true,
            error: None,
        });
    }

    /// Mark failed: schedules a backoff retry, or exhausts the job when the
    /// policy allows no more tries.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
        });

        if self.retry.should_retry(self.attempt) {
            let delay = self.retry.delay_for_attempt(self.attempt);
            self.execute_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = JobStatus::Failed {
                error,
                attempt: self.attempt,
            };
        } else {
            self.status = JobStatus::Exhausted {
                error,
                attempts: self.attempt,
            };
        }
    }

    /// Mark exhausted immediately, bypassing remaining retries. Used for
    /// fatal (precondition) failures that retrying cannot fix.
    pub fn mark_exhausted(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
        });
        self.status = JobStatus::Exhausted {
            error,
            attempts: self.attempt,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoforge_core::EventId;

    fn test_key(n: i64) -> JobKey {
        JobKey::delivery("test", EventId::new(n))
    }

    #[test]
    fn exponential_backoff_doubles_each_retry() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(30));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(120));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(240));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(300),
            strategy: BackoffStrategy::Exponential,
        };

        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(300));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn should_retry_bounds_total_tries() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(1));

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn job_lifecycle() {
        let mut job = ScheduledJob::new(test_key(1), "campaign.close", serde_json::json!({}));

        assert!(matches!(job.status, JobStatus::Pending));
        assert_eq!(job.attempt, 0);

        job.mark_running();
        assert!(matches!(job.status, JobStatus::Running));
        assert_eq!(job.attempt, 1);

        job.mark_completed(Utc::now());
        assert!(matches!(job.status, JobStatus::Completed));
        assert!(job.history[0].success);
    }

    #[test]
    fn failure_schedules_backoff_then_exhausts() {
        let mut job = ScheduledJob::new(test_key(2), "campaign.close", serde_json::json!({}))
            .with_retry_policy(RetryPolicy::exponential(2, Duration::from_secs(1)));

        job.mark_running();
        job.mark_failed("error 1".to_string(), Utc::now());
        assert!(matches!(job.status, JobStatus::Failed { .. }));
        assert!(job.execute_at.is_some());

        job.mark_running();
        job.mark_failed("error 2".to_string(), Utc::now());
        assert!(matches!(job.status, JobStatus::Exhausted { .. }));
    }

    #[test]
    fn zero_attempts_exhausts_on_first_failure() {
        let mut job = ScheduledJob::new(test_key(3), "x", serde_json::json!({}))
            .with_retry_policy(RetryPolicy::no_retry());

        job.mark_running();
        job.mark_failed("boom".to_string(), Utc::now());
        assert!(matches!(
            job.status,
            JobStatus::Exhausted { attempts: 1, .. }
        ));
    }

    #[test]
    fn delayed_jobs_are_not_ready_early() {
        let job = ScheduledJob::new(test_key(4), "x", serde_json::json!({}))
            .delayed(Duration::from_secs(3600));

        assert!(!job.is_ready(Utc::now()));
        assert!(job.is_ready(Utc::now() + chrono::Duration::hours(2)));
    }
}
