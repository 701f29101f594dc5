//! Publish flow: first post, second post, go live, arm the close job.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use promoforge_campaign::events::{
    CloseStageRequested, FirstContentRequested, SecondContentRequested,
};
use promoforge_campaign::{Campaign, CampaignStatus};
use promoforge_core::{CampaignId, DomainError, EventId, JobKey};
use promoforge_events::{EventBus, EventEnvelope};

use crate::publisher::{DeliveryPolicy, PublishOptions};
use crate::scheduler::HandlerError;

use super::{CampaignLifecycle, RequestError, flags};

impl<B> CampaignLifecycle<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    /// Entry point for the external controller: start publishing an approved
    /// campaign. Returns the stored trigger event's id, or `None` if the
    /// outbox write failed.
    pub async fn request_publish(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<EventId>, RequestError> {
        let campaign = self
            .repo
            .get(campaign_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        if campaign.status != CampaignStatus::Approved {
            return Err(DomainError::illegal_transition(format!(
                "publish requires an approved campaign, found {}",
                campaign.status
            ))
            .into());
        }

        self.audit(&campaign, "publish requested", json!({})).await;

        let event = FirstContentRequested {
            campaign_id,
            occurred_at: Utc::now(),
        };
        let options = self
            .default_options()
            .keyed(JobKey::publish_stage(campaign_id, "first-content"));
        Ok(self.publisher.publish_event(Some(campaign_id), &event, options).await)
    }

    /// Stage one: publish the first post.
    pub async fn handle_first_content(
        &self,
        campaign_id: CampaignId,
    ) -> Result<(), HandlerError> {
        let (campaign, owner) = self.load(campaign_id).await?;

        // Redelivery after a crash between post and trigger: the post id is
        // recorded, so only re-arm the next stage (duplicate-suppressed).
        if let Some(first_post_id) = campaign.first_post_id.clone() {
            debug!(%campaign_id, "first post already recorded; re-arming second stage");
            self.trigger_second_content(campaign_id, first_post_id).await;
            return Ok(());
        }

        if campaign.status != CampaignStatus::Approved {
            return Err(HandlerError::fatal(format!(
                "first content requires an approved campaign, found {}",
                campaign.status
            )));
        }

        let post_id = match self.social.publish_first(&campaign, &owner).await {
            Ok(id) => id,
            Err(e) => {
                return Err(self
                    .fail_stage(campaign_id, flags::FIRST_CONTENT, e.to_string(), false)
                    .await);
            }
        };

        self.repo
            .record_first_post(campaign_id, &post_id)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;
        self.cache
            .set(&campaign.contract_id, flags::FIRST_CONTENT, true)
            .await;
        self.audit(&campaign, "first content published", json!({"post_id": post_id}))
            .await;
        info!(%campaign_id, %post_id, "first content published");

        self.trigger_second_content(campaign_id, post_id).await;
        Ok(())
    }

    async fn trigger_second_content(&self, campaign_id: CampaignId, first_post_id: String) {
        let event = SecondContentRequested {
            campaign_id,
            first_post_id,
            occurred_at: Utc::now(),
        };
        let options = self
            .default_options()
            .keyed(JobKey::publish_stage(campaign_id, "second-content"));
        self.publisher
            .publish_event(Some(campaign_id), &event, options)
            .await;
    }

    /// Stage two: publish the second post, go live, arm the close job.
    pub async fn handle_second_content(
        &self,
        req: SecondContentRequested,
    ) -> Result<(), HandlerError> {
        let campaign_id = req.campaign_id;
        let (campaign, owner) = self.load(campaign_id).await?;

        // Ordering precondition: the first post must already be recorded.
        // "Not there yet" is a logic error, not a transient fault.
        let Some(first_post_id) = campaign.first_post_id.clone() else {
            return Err(self
                .fail_stage(
                    campaign_id,
                    flags::SECOND_CONTENT,
                    "first post not published before second content stage".to_string(),
                    true,
                )
                .await);
        };

        // Redelivery: already live — make sure the close job is armed.
        if campaign.second_post_id.is_some() && campaign.close_at.is_some() {
            debug!(%campaign_id, "second post already recorded; re-arming close job");
            self.arm_close_job(&campaign).await;
            return Ok(());
        }

        if campaign.status != CampaignStatus::Approved {
            return Err(HandlerError::fatal(format!(
                "second content requires an approved campaign, found {}",
                campaign.status
            )));
        }

        let post_id = match self
            .social
            .publish_second(&campaign, &owner, &first_post_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                return Err(self
                    .fail_stage(campaign_id, flags::SECOND_CONTENT, e.to_string(), false)
                    .await);
            }
        };

        let close_at = Utc::now() + self.config.campaign_duration();
        self.repo
            .record_second_post(campaign_id, &post_id, close_at)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;

        if !self
            .repo
            .try_transition(campaign_id, CampaignStatus::Approved, CampaignStatus::Running)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?
        {
            // A concurrent trigger won the lease after our status check; it
            // owns the rest of the flow.
            debug!(%campaign_id, "lost go-live lease to a concurrent trigger");
            return Ok(());
        }

        self.cache
            .set(&campaign.contract_id, flags::SECOND_CONTENT, true)
            .await;

        let mut live = campaign.clone();
        live.status = CampaignStatus::Running;
        live.close_at = Some(close_at);
        self.audit(
            &live,
            "second content published; campaign live",
            json!({"post_id": post_id, "close_at": close_at}),
        )
        .await;
        info!(%campaign_id, %post_id, %close_at, "campaign live; arming close job");

        self.arm_close_job(&live).await;
        Ok(())
    }

    /// Arm the delayed close job. The deterministic key (campaign id + close
    /// timestamp) makes re-invocation duplicate-suppressed: at most one
    /// close job per campaign.
    pub(crate) async fn arm_close_job(&self, campaign: &Campaign) -> Option<EventId> {
        let close_at = campaign.close_at?;
        let close_at_unix = close_at.timestamp();

        let delay = (close_at - Utc::now()).to_std().unwrap_or_default();
        let delivery = DeliveryPolicy::for_close_sequence(&self.config).with_delay(delay);
        let options = PublishOptions::with_delivery(delivery)
            .keyed(JobKey::campaign_close(campaign.id, close_at_unix));

        let event = CloseStageRequested::initial(campaign.id, close_at_unix);
        let event_id = self
            .publisher
            .publish_event(Some(campaign.id), &event, options)
            .await;

        if event_id.is_some() {
            if let Err(e) = self.repo.set_queue_flag(campaign.id, true).await {
                tracing::warn!(campaign_id = %campaign.id, error = %e, "failed to set queue flag");
            }
        }
        event_id
    }
}
