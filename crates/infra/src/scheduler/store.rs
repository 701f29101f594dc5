//! Job storage.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

use promoforge_core::{CampaignId, JobKey};

use super::types::{JobPriority, JobStatus, RetentionPolicy, ScheduledJob};

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Job accepted.
    Queued,
    /// A job with the same key is already queued; submission suppressed.
    Duplicate,
}

/// Job store error.
#[derive(Debug, Clone, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobKey),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Queue statistics, surfaced by the health endpoints.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub delayed: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub exhausted: usize,
}

/// Job store abstraction.
///
/// The backing store may be shared by several worker processes; claim
/// semantics must hold under concurrent consumers.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Enqueue a job. A live (non-terminal) job with the same key suppresses
    /// the submission — this is what guarantees "at most one scheduled job
    /// per campaign stage".
    async fn enqueue(&self, job: ScheduledJob) -> Result<EnqueueOutcome, JobStoreError>;

    /// Get a job by key.
    async fn get(&self, key: &JobKey) -> Result<Option<ScheduledJob>, JobStoreError>;

    /// Persist an updated job.
    async fn update(&self, job: &ScheduledJob) -> Result<(), JobStoreError>;

    /// Claim the next job that is ready at `now`, marking it running.
    /// Higher priority first, then oldest ready time.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<ScheduledJob>, JobStoreError>;

    /// Live (non-terminal) jobs for a campaign.
    async fn pending_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<ScheduledJob>, JobStoreError>;

    /// Queue statistics.
    async fn stats(&self) -> Result<QueueStats, JobStoreError>;

    /// Prune terminal jobs beyond the retention bounds. Returns how many
    /// were removed.
    async fn prune(&self, retention: &RetentionPolicy) -> Result<usize, JobStoreError>;
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, ScheduledJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, ScheduledJob>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: ScheduledJob) -> Result<EnqueueOutcome, JobStoreError> {
        let mut jobs = self.locked()?;
        if let Some(existing) = jobs.get(job.key.as_str()) {
            if !existing.status.is_terminal() {
                return Ok(EnqueueOutcome::Duplicate);
            }
        }
        jobs.insert(job.key.as_str().to_string(), job);
        Ok(EnqueueOutcome::Queued)
    }

    async fn get(&self, key: &JobKey) -> Result<Option<ScheduledJob>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))?;
        Ok(jobs.get(key.as_str()).cloned())
    }

    async fn update(&self, job: &ScheduledJob) -> Result<(), JobStoreError> {
        let mut jobs = self.locked()?;
        if !jobs.contains_key(job.key.as_str()) {
            return Err(JobStoreError::NotFound(job.key.clone()));
        }
        jobs.insert(job.key.as_str().to_string(), job.clone());
        Ok(())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<ScheduledJob>, JobStoreError> {
        let mut jobs = self.locked()?;

        let mut candidates: Vec<_> = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Failed { .. })
                    && j.is_ready(now)
            })
            .map(|j| {
                (
                    std::cmp::Reverse(j.priority),
                    j.execute_at.unwrap_or(j.created_at),
                    j.created_at,
                    j.key.as_str().to_string(),
                )
            })
            .collect();
        candidates.sort();

        if let Some((_, _, _, key)) = candidates.first() {
            if let Some(job) = jobs.get_mut(key) {
                job.mark_running();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    async fn pending_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<ScheduledJob>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.campaign_id == Some(campaign_id) && !j.status.is_terminal())
            .cloned()
            .collect();
        result.sort_by_key(|j| j.created_at);
        Ok(result)
    }

    async fn stats(&self) -> Result<QueueStats, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))?;
        let now = Utc::now();

        let mut stats = QueueStats::default();
        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending if job.is_ready(now) => stats.pending += 1,
                JobStatus::Pending => stats.delayed += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
                JobStatus::Exhausted { .. } => stats.exhausted += 1,
            }
        }
        Ok(stats)
    }

    async fn prune(&self, retention: &RetentionPolicy) -> Result<usize, JobStoreError> {
        let mut jobs = self.locked()?;

        let completed = prune_terminal(&mut jobs, retention.retain_completed, |s| {
            matches!(s, JobStatus::Completed)
        });
        let exhausted = prune_terminal(&mut jobs, retention.retain_failed, |s| {
            matches!(s, JobStatus::Exhausted { .. })
        });

        Ok(completed + exhausted)
    }
}

/// Remove all but the newest `keep` jobs matching `is_match`.
fn prune_terminal(
    jobs: &mut HashMap<String, ScheduledJob>,
    keep: usize,
    is_match: impl Fn(&JobStatus) -> bool,
) -> usize {
    let mut terminal: Vec<_> = jobs
        .values()
        .filter(|j| is_match(&j.status))
        .map(|j| (j.updated_at, j.key.as_str().to_string()))
        .collect();
    // Newest first; everything past the retention bound goes.
    terminal.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, key) in terminal.into_iter().skip(keep) {
        jobs.remove(&key);
        removed += 1;
    }
    removed
}
