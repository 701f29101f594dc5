//! Campaign lifecycle state machine.
//!
//! One engine instance owns the stage handlers: publish flow (two posts),
//! the close sequence, and the error handler. Every handler re-reads the
//! campaign through the repository, takes the status lease where the stage
//! requires one, and publishes the *next* stage's trigger event on success.

mod close;
mod error_handler;
mod publish;

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::warn;

use promoforge_campaign::events::{self, names};
use promoforge_campaign::{Campaign, CampaignLogEntry, CriticalFailures, Owner};
use promoforge_core::{CampaignId, OrchestratorConfig};
use promoforge_events::{EventBus, EventEnvelope, InMemoryEventBus};

use crate::ports::{BalanceService, LedgerService, SocialPostService};
use crate::publisher::{EventPublisher, PublishOptions};
use crate::repository::{CampaignLogStore, CampaignRepository};
use crate::scheduler::{HandlerError, JobHandler, QueueWorker, ScheduledJob};
use crate::status_cache::StatusCache;

/// Status-cache sub-task labels.
pub mod flags {
    pub const FIRST_CONTENT: &str = "first_content";
    pub const SECOND_CONTENT: &str = "second_content";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Error returned by controller-facing engine operations.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Domain(#[from] promoforge_core::DomainError),
    #[error(transparent)]
    Repository(#[from] crate::repository::RepositoryError),
}

/// The campaign orchestration engine.
pub struct CampaignLifecycle<B = InMemoryEventBus<EventEnvelope>>
where
    B: EventBus<EventEnvelope>,
{
    publisher: Arc<EventPublisher<B>>,
    repo: Arc<dyn CampaignRepository>,
    logs: Arc<dyn CampaignLogStore>,
    cache: Arc<dyn StatusCache>,
    social: Arc<dyn SocialPostService>,
    ledger: Arc<dyn LedgerService>,
    balances: Arc<dyn BalanceService>,
    critical: CriticalFailures,
    config: OrchestratorConfig,
}

impl<B> CampaignLifecycle<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        publisher: Arc<EventPublisher<B>>,
        repo: Arc<dyn CampaignRepository>,
        logs: Arc<dyn CampaignLogStore>,
        cache: Arc<dyn StatusCache>,
        social: Arc<dyn SocialPostService>,
        ledger: Arc<dyn LedgerService>,
        balances: Arc<dyn BalanceService>,
        config: OrchestratorConfig,
    ) -> Self {
        let critical = CriticalFailures::with_extra(&config.extra_critical_patterns);
        Self {
            publisher,
            repo,
            logs,
            cache,
            social,
            ledger,
            balances,
            critical,
            config,
        }
    }

    pub fn publisher(&self) -> &Arc<EventPublisher<B>> {
        &self.publisher
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Re-fetch campaign + owner. Storage failures are retryable; a missing
    /// campaign is a fatal ordering error (the trigger referenced something
    /// that does not exist).
    pub(crate) async fn load(
        &self,
        campaign_id: CampaignId,
    ) -> Result<(Campaign, Owner), HandlerError> {
        let campaign = self
            .repo
            .get(campaign_id)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?
            .ok_or_else(|| HandlerError::fatal(format!("campaign {campaign_id} not found")))?;
        let owner = self
            .repo
            .owner_of(campaign_id)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?
            .ok_or_else(|| {
                HandlerError::fatal(format!("owner of campaign {campaign_id} not found"))
            })?;
        Ok((campaign, owner))
    }

    /// Append an audit row. Log-write failures must never fail a stage.
    pub(crate) async fn audit(&self, campaign: &Campaign, message: &str, data: serde_json::Value) {
        let entry = CampaignLogEntry::new(campaign.id, campaign.status, message, data);
        if let Err(e) = self.logs.append(entry).await {
            warn!(campaign_id = %campaign.id, error = %e, "audit log append failed");
        }
    }

    /// Raise the campaign-error event instead of unwinding past the handler
    /// boundary, then report the failure to the queue (retryable or fatal).
    pub(crate) async fn fail_stage(
        &self,
        campaign_id: CampaignId,
        stage: &str,
        error: String,
        fatal: bool,
    ) -> HandlerError {
        let event = events::CampaignErrorRaised {
            campaign_id,
            stage: stage.to_string(),
            error: error.clone(),
            occurred_at: Utc::now(),
        };
        self.publisher
            .publish_event(Some(campaign_id), &event, self.default_options())
            .await;

        if fatal {
            HandlerError::fatal(error)
        } else {
            HandlerError::retryable(error)
        }
    }

    pub(crate) fn default_options(&self) -> PublishOptions {
        PublishOptions::with_delivery(crate::publisher::DeliveryPolicy::from_config(&self.config))
    }
}

/// Routes queue jobs to the matching lifecycle handler.
pub struct LifecycleHandler<B = InMemoryEventBus<EventEnvelope>>
where
    B: EventBus<EventEnvelope>,
{
    lifecycle: Arc<CampaignLifecycle<B>>,
}

impl<B> LifecycleHandler<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    pub fn new(lifecycle: Arc<CampaignLifecycle<B>>) -> Self {
        Self { lifecycle }
    }
}

fn parse<T: DeserializeOwned>(job: &ScheduledJob) -> Result<T, HandlerError> {
    serde_json::from_value(job.data.clone()).map_err(|e| {
        HandlerError::fatal(format!(
            "malformed payload for {}: {e}",
            job.event_name
        ))
    })
}

#[async_trait::async_trait]
impl<B> JobHandler for LifecycleHandler<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    async fn handle(&self, job: &ScheduledJob) -> Result<(), HandlerError> {
        match job.event_name.as_str() {
            names::PUBLISH_FIRST_CONTENT => {
                let req: events::FirstContentRequested = parse(job)?;
                self.lifecycle.handle_first_content(req.campaign_id).await
            }
            names::PUBLISH_SECOND_CONTENT => {
                let req: events::SecondContentRequested = parse(job)?;
                self.lifecycle.handle_second_content(req).await
            }
            names::PUBLISH_ERROR => {
                let req: events::CampaignErrorRaised = parse(job)?;
                self.lifecycle.handle_error(req).await
            }
            name if name.starts_with("campaign.close.") => {
                let req: events::CloseStageRequested = parse(job)?;
                self.lifecycle.handle_close_stage(req).await
            }
            other => Err(HandlerError::fatal(format!(
                "no lifecycle route for event: {other}"
            ))),
        }
    }
}

/// Register the lifecycle handler for every event it routes.
pub fn register_lifecycle_handlers<B>(worker: &mut QueueWorker, lifecycle: Arc<CampaignLifecycle<B>>)
where
    B: EventBus<EventEnvelope> + 'static,
{
    let handler: Arc<dyn JobHandler> = Arc::new(LifecycleHandler::new(lifecycle));
    for name in [
        names::PUBLISH_FIRST_CONTENT,
        names::PUBLISH_SECOND_CONTENT,
        names::PUBLISH_ERROR,
        names::CLOSE_ELIGIBILITY,
        names::CLOSE_ENGAGEMENT,
        names::CLOSE_REWARD_CALCULATION,
        names::CLOSE_SETTLEMENT,
        names::CLOSE_DB_UPDATE,
        names::CLOSE_CLEANUP,
    ] {
        worker.register_handler(name, handler.clone());
    }
}
