//! Dead-letter recovery.
//!
//! Replays parked events through the publisher at high priority and deletes
//! each row only after its republish succeeds. Recovery re-runs side effects
//! verbatim and is therefore **not** idempotent-safe against double
//! invocation — it is an admin-gated operator action, never automatic.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use promoforge_campaign::CampaignStatus;
use promoforge_core::{CampaignId, EventId};
use promoforge_events::{
    DeadLetterPayload, EventBus, EventEnvelope, InMemoryEventBus, is_dead_letter,
};

use crate::outbox::{OutboxError, OutboxStore};
use crate::publisher::{DeliveryPolicy, EventPublisher, PublishOptions};
use crate::repository::{CampaignRepository, RepositoryError};
use crate::scheduler::JobPriority;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("event not found: {0}")]
    NotFound(EventId),

    #[error("event {0} is not a dead letter")]
    NotDeadLetter(EventId),

    #[error("dead letter {id} has a malformed payload: {reason}")]
    MalformedPayload { id: EventId, reason: String },

    #[error("republish of event {0} failed")]
    Republish(EventId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<OutboxError> for RecoveryError {
    fn from(value: OutboxError) -> Self {
        match value {
            OutboxError::NotFound(id) => RecoveryError::NotFound(id),
            other => RecoveryError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for RecoveryError {
    fn from(value: RepositoryError) -> Self {
        RecoveryError::Storage(value.to_string())
    }
}

/// Per-campaign resume summary. One bad event never aborts the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResumeSummary {
    pub retried: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Dead-letter recovery operations.
pub struct DeadLetterRecovery<B = InMemoryEventBus<EventEnvelope>>
where
    B: EventBus<EventEnvelope>,
{
    outbox: Arc<dyn OutboxStore>,
    publisher: Arc<EventPublisher<B>>,
    repo: Arc<dyn CampaignRepository>,
}

impl<B> DeadLetterRecovery<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        publisher: Arc<EventPublisher<B>>,
        repo: Arc<dyn CampaignRepository>,
    ) -> Self {
        Self {
            outbox,
            publisher,
            repo,
        }
    }

    fn replay_options() -> PublishOptions {
        PublishOptions::with_delivery(
            DeliveryPolicy::default().with_priority(JobPriority::High),
        )
    }

    /// Replay every dead-letter event referencing the campaign.
    pub async fn resume(&self, campaign_id: CampaignId) -> Result<ResumeSummary, RecoveryError> {
        // Un-park a halted campaign so replayed stages pass their status
        // checks. Conditional: a campaign in any other state is untouched.
        if let Some(campaign) = self.repo.get(campaign_id).await? {
            if campaign.status == CampaignStatus::InternalError {
                let resumed = self
                    .repo
                    .try_transition(
                        campaign_id,
                        CampaignStatus::InternalError,
                        CampaignStatus::Running,
                    )
                    .await?;
                if resumed {
                    info!(%campaign_id, "campaign un-parked for resume");
                }
            }
        }

        let rows = self.outbox.dead_letters_for_campaign(campaign_id).await?;
        let mut summary = ResumeSummary::default();

        for row in rows {
            match self.replay_row(row.id, &row.event_type, row.campaign_id, &row.payload).await {
                Ok(()) => summary.retried += 1,
                Err(e) => {
                    warn!(%campaign_id, event_id = %row.id, error = %e, "dead-letter replay failed");
                    summary.failed += 1;
                    summary.errors.push(format!("event {}: {e}", row.id));
                }
            }
        }

        info!(
            %campaign_id,
            retried = summary.retried,
            failed = summary.failed,
            "resume finished"
        );
        Ok(summary)
    }

    /// Replay a single dead-letter event. Rejects ids outside the
    /// dead-letter namespace.
    pub async fn retry_event(&self, event_id: EventId) -> Result<EventId, RecoveryError> {
        let row = self
            .outbox
            .get(event_id)
            .await?
            .ok_or(RecoveryError::NotFound(event_id))?;

        if !is_dead_letter(&row.event_type) {
            return Err(RecoveryError::NotDeadLetter(event_id));
        }

        let parsed: DeadLetterPayload = serde_json::from_value(row.payload.clone())
            .map_err(|e| RecoveryError::MalformedPayload {
                id: event_id,
                reason: e.to_string(),
            })?;

        let new_id = self
            .publisher
            .publish(
                &parsed.original_event_type,
                row.campaign_id,
                parsed.original_payload,
                Self::replay_options(),
            )
            .await
            .ok_or(RecoveryError::Republish(event_id))?;

        // Republish is durable; only now is the parked row released.
        self.outbox.delete(event_id).await?;
        info!(old = %event_id, new = %new_id, "dead letter replayed");
        Ok(new_id)
    }

    async fn replay_row(
        &self,
        id: EventId,
        event_type: &str,
        campaign_id: Option<CampaignId>,
        payload: &serde_json::Value,
    ) -> Result<(), RecoveryError> {
        if !is_dead_letter(event_type) {
            return Err(RecoveryError::NotDeadLetter(id));
        }

        let parsed: DeadLetterPayload = serde_json::from_value(payload.clone()).map_err(|e| {
            RecoveryError::MalformedPayload {
                id,
                reason: e.to_string(),
            }
        })?;

        self.publisher
            .publish(
                &parsed.original_event_type,
                campaign_id,
                parsed.original_payload,
                Self::replay_options(),
            )
            .await
            .ok_or(RecoveryError::Republish(id))?;

        self.outbox.delete(id).await?;
        Ok(())
    }
}
