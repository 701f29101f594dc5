//! Campaign error handler.
//!
//! Consumes the error events raised by failing stages. Transient failures
//! are logged and left to the queue's retry mechanism; failures matching the
//! critical pattern set halt a running campaign.

use serde_json::json;
use tracing::{error, info, warn};

use promoforge_campaign::events::CampaignErrorRaised;
use promoforge_campaign::{CampaignLogEntry, CampaignStatus};
use promoforge_events::{EventBus, EventEnvelope};

use crate::scheduler::HandlerError;

use super::{CampaignLifecycle, flags};

impl<B> CampaignLifecycle<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    /// Handle a stage failure.
    pub async fn handle_error(&self, req: CampaignErrorRaised) -> Result<(), HandlerError> {
        // The failure may be stale; never trust in-memory state.
        let campaign = self
            .repo
            .get(req.campaign_id)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;
        let Some(campaign) = campaign else {
            warn!(campaign_id = %req.campaign_id, "error raised for unknown campaign");
            return Ok(());
        };
        let owner = self
            .repo
            .owner_of(req.campaign_id)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;

        let critical = self.critical.is_critical(&req.error);

        let entry = CampaignLogEntry::new(
            campaign.id,
            campaign.status,
            format!("stage '{}' failed: {}", req.stage, req.error),
            json!({
                "stage": req.stage,
                "error": req.error,
                "critical": critical,
                "owner_handle": owner.as_ref().map(|o| o.handle.clone()),
                "occurred_at": req.occurred_at,
            }),
        );
        self.logs
            .append(entry)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;

        if !critical {
            // Transient: the queue's backoff re-attempts the stage; the
            // campaign status is left untouched.
            info!(
                campaign_id = %campaign.id,
                stage = %req.stage,
                error = %req.error,
                "non-critical stage failure logged"
            );
            return Ok(());
        }

        // Critical failures halt the campaign, but only from Running — a
        // campaign that never went live (or already finished) keeps its
        // status.
        if campaign.status != CampaignStatus::Running {
            warn!(
                campaign_id = %campaign.id,
                status = %campaign.status,
                stage = %req.stage,
                "critical failure outside running state; status unchanged"
            );
            return Ok(());
        }

        let halted = self
            .repo
            .try_transition(
                campaign.id,
                CampaignStatus::Running,
                CampaignStatus::InternalError,
            )
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;

        if halted {
            self.repo
                .set_queue_flag(campaign.id, false)
                .await
                .map_err(|e| HandlerError::retryable(e.to_string()))?;
            self.cache
                .set(&campaign.contract_id, flags::INTERNAL_ERROR, true)
                .await;

            let mut parked = campaign.clone();
            parked.status = CampaignStatus::InternalError;
            self.audit(
                &parked,
                "campaign halted: critical failure",
                json!({"stage": req.stage, "error": req.error}),
            )
            .await;
            error!(
                campaign_id = %campaign.id,
                stage = %req.stage,
                error = %req.error,
                "campaign moved to internal error; operator resume required"
            );
            // TODO: notify the owner and refund flow for halted campaigns is
            // not built yet; the status is the only user-visible signal.
        }

        Ok(())
    }
}
