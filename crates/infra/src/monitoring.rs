//! Operational monitoring: stuck-campaign detection, health snapshots, and
//! the per-campaign monitor report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use promoforge_campaign::{Campaign, CampaignLogEntry, CampaignStatus};
use promoforge_core::{CampaignId, OrchestratorConfig};
use promoforge_events::{EventBus, EventEnvelope, InMemoryEventBus, is_dead_letter};

use crate::lifecycle::CampaignLifecycle;
use crate::outbox::{EventRecord, OutboxError, OutboxStore};
use crate::repository::{CampaignLogStore, CampaignRepository, RepositoryError};
use crate::scheduler::{JobStore, JobStoreError, QueueStats, ScheduledJob};

#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("outbox error: {0}")]
    Outbox(#[from] OutboxError),
    #[error("queue error: {0}")]
    Queue(#[from] JobStoreError),
}

/// One stuck campaign.
#[derive(Debug, Clone, Serialize)]
pub struct StuckCampaignEntry {
    pub id: CampaignId,
    pub status: CampaignStatus,
    pub close_at: Option<DateTime<Utc>>,
    pub overdue_minutes: i64,
    pub is_added_to_queue: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StuckSummary {
    /// In-progress campaigns scanned.
    pub total_in_progress: usize,
    /// Campaigns whose close time passed beyond the threshold.
    pub overdue_close: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StuckReport {
    pub campaigns: Vec<StuckCampaignEntry>,
    pub summary: StuckSummary,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessStuckOutcome {
    /// Stuck campaigns examined.
    pub processed: usize,
    /// Close jobs re-armed (the rest were already armed).
    pub rearmed: usize,
}

/// Condensed job view for the monitor report.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub key: String,
    pub event_name: String,
    pub status: String,
    pub attempt: u32,
    pub execute_at: Option<DateTime<Utc>>,
}

impl From<&ScheduledJob> for JobSummary {
    fn from(job: &ScheduledJob) -> Self {
        Self {
            key: job.key.as_str().to_string(),
            event_name: job.event_name.clone(),
            status: format!("{:?}", job.status),
            attempt: job.attempt,
            execute_at: job.execute_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorHealth {
    pub can_resume: bool,
    pub dead_letters: usize,
    pub pending_jobs: usize,
}

/// Composite per-campaign report for operators.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub campaign: Campaign,
    pub logs: Vec<CampaignLogEntry>,
    pub pending_events: Vec<EventRecord>,
    pub dead_letters: Vec<EventRecord>,
    pub pending_jobs: Vec<JobSummary>,
    pub health: MonitorHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub healthy: bool,
    pub stats: QueueStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub store_ok: bool,
    pub queue_ok: bool,
    pub stats: QueueStats,
    pub campaigns_in_progress: usize,
}

/// Monitoring facade over the engine's stores.
pub struct MonitoringService<B = InMemoryEventBus<EventEnvelope>>
where
    B: EventBus<EventEnvelope>,
{
    repo: Arc<dyn CampaignRepository>,
    logs: Arc<dyn CampaignLogStore>,
    outbox: Arc<dyn OutboxStore>,
    jobs: Arc<dyn JobStore>,
    lifecycle: Arc<CampaignLifecycle<B>>,
    config: OrchestratorConfig,
}

impl<B> MonitoringService<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    pub fn new(
        repo: Arc<dyn CampaignRepository>,
        logs: Arc<dyn CampaignLogStore>,
        outbox: Arc<dyn OutboxStore>,
        jobs: Arc<dyn JobStore>,
        lifecycle: Arc<CampaignLifecycle<B>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            repo,
            logs,
            outbox,
            jobs,
            lifecycle,
            config,
        }
    }

    /// Campaigns whose close time passed beyond the stuck threshold while
    /// still in an in-progress status.
    pub async fn stuck_campaigns(&self, now: DateTime<Utc>) -> Result<StuckReport, MonitoringError> {
        let in_progress = self.repo.in_progress().await?;
        let threshold = self.config.stuck_threshold();

        let campaigns: Vec<StuckCampaignEntry> = in_progress
            .iter()
            .filter(|c| c.is_stuck(now, threshold))
            .map(|c| StuckCampaignEntry {
                id: c.id,
                status: c.status,
                close_at: c.close_at,
                overdue_minutes: c
                    .close_overdue_by(now)
                    .map(|d| d.num_minutes())
                    .unwrap_or(0),
                is_added_to_queue: c.is_added_to_queue,
            })
            .collect();

        let summary = StuckSummary {
            total_in_progress: in_progress.len(),
            overdue_close: campaigns.len(),
        };

        Ok(StuckReport { campaigns, summary })
    }

    /// Force-process stuck campaigns by re-arming their close jobs. The
    /// deterministic close key makes this safe to call repeatedly.
    pub async fn process_stuck(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ProcessStuckOutcome, MonitoringError> {
        let in_progress = self.repo.in_progress().await?;
        let threshold = self.config.stuck_threshold();

        let mut processed = 0;
        let mut rearmed = 0;
        for campaign in in_progress.iter().filter(|c| c.is_stuck(now, threshold)) {
            processed += 1;
            match self.lifecycle.arm_close_job(campaign).await {
                Some(_) => {
                    rearmed += 1;
                    info!(campaign_id = %campaign.id, "stuck campaign close job re-armed");
                }
                None => {
                    warn!(campaign_id = %campaign.id, "failed to re-arm stuck campaign");
                }
            }
        }

        Ok(ProcessStuckOutcome { processed, rearmed })
    }

    /// Composite report: snapshot, recent audit rows, pending events,
    /// dead letters, live jobs.
    pub async fn campaign_monitor(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<MonitorReport>, MonitoringError> {
        let Some(campaign) = self.repo.get(campaign_id).await? else {
            return Ok(None);
        };

        let logs = self.logs.recent(campaign_id, 50).await?;
        let events = self.outbox.events_for_campaign(campaign_id, 200).await?;
        let (dead_letters, pending_events): (Vec<_>, Vec<_>) = events
            .into_iter()
            .partition(|e| is_dead_letter(&e.event_type));
        let jobs = self.jobs.pending_for_campaign(campaign_id).await?;

        let health = MonitorHealth {
            can_resume: !dead_letters.is_empty(),
            dead_letters: dead_letters.len(),
            pending_jobs: jobs.len(),
        };

        Ok(Some(MonitorReport {
            campaign,
            logs,
            pending_events,
            dead_letters,
            pending_jobs: jobs.iter().map(JobSummary::from).collect(),
            health,
        }))
    }

    /// Scheduler queue health.
    pub async fn queue_health(&self) -> QueueHealth {
        match self.jobs.stats().await {
            Ok(stats) => QueueHealth {
                healthy: true,
                stats,
            },
            Err(e) => {
                warn!(error = %e, "queue stats unavailable");
                QueueHealth {
                    healthy: false,
                    stats: QueueStats::default(),
                }
            }
        }
    }

    /// Store + queue + engine snapshot.
    pub async fn system_health(&self) -> SystemHealth {
        let store_ok = self.outbox.list_by_type_prefix("", 1).await.is_ok();
        let queue = self.queue_health().await;
        let campaigns_in_progress = self
            .repo
            .in_progress()
            .await
            .map(|c| c.len())
            .unwrap_or_default();

        SystemHealth {
            store_ok,
            queue_ok: queue.healthy,
            stats: queue.stats,
            campaigns_in_progress,
        }
    }
}
