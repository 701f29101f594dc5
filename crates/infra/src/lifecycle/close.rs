//! Close sequence: eligibility → engagement → rewards → settlement →
//! db update → cleanup.
//!
//! Each stage is an independently retryable unit; a failure routes to the
//! error handler and never silently advances the sequence.

use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::{debug, info};

use promoforge_campaign::events::CloseStageRequested;
use promoforge_campaign::{Campaign, CampaignStatus, CloseStage, FundingType, Owner, RewardOutcome};
use promoforge_core::JobKey;
use promoforge_events::{EventBus, EventEnvelope};

use crate::publisher::{DeliveryPolicy, PublishOptions};
use crate::scheduler::HandlerError;

use super::CampaignLifecycle;

impl<B> CampaignLifecycle<B>
where
    B: EventBus<EventEnvelope> + 'static,
{
    /// Run one stage of the close sequence.
    pub async fn handle_close_stage(&self, req: CloseStageRequested) -> Result<(), HandlerError> {
        let (campaign, owner) = self.load(req.campaign_id).await?;

        match req.stage {
            CloseStage::Eligibility => self.close_eligibility(&campaign, &req).await,
            CloseStage::Engagement => {
                if !self.expect_distribution_in_progress(&campaign, &req)? {
                    return Ok(());
                }
                self.close_engagement(&campaign, &req).await
            }
            CloseStage::RewardCalculation => {
                if !self.expect_distribution_in_progress(&campaign, &req)? {
                    return Ok(());
                }
                self.close_reward_calculation(&campaign, &req).await
            }
            CloseStage::Settlement => {
                if !self.expect_distribution_in_progress(&campaign, &req)? {
                    return Ok(());
                }
                self.close_settlement(&campaign, &owner, &req).await
            }
            CloseStage::DbUpdate => {
                if !self.expect_distribution_in_progress(&campaign, &req)? {
                    return Ok(());
                }
                self.close_db_update(&campaign, &req).await
            }
            CloseStage::Cleanup => self.close_cleanup(&campaign).await,
        }
    }

    /// Mid-sequence stages require the distribution lease to be held.
    /// Returns Ok(false) when the sequence already finished (redelivery):
    /// nothing left to do, skip without failing.
    fn expect_distribution_in_progress(
        &self,
        campaign: &Campaign,
        req: &CloseStageRequested,
    ) -> Result<bool, HandlerError> {
        match campaign.status {
            CampaignStatus::RewardDistributionInProgress => Ok(true),
            CampaignStatus::RewardsDistributed => Ok(false),
            other => Err(HandlerError::fatal(format!(
                "close stage {} requires distribution in progress, found {other}",
                req.stage
            ))),
        }
    }

    /// Stage 1: take the close lease and verify the campaign can close.
    async fn close_eligibility(
        &self,
        campaign: &Campaign,
        req: &CloseStageRequested,
    ) -> Result<(), HandlerError> {
        match campaign.status {
            CampaignStatus::Running => {
                let leased = self
                    .repo
                    .try_transition(
                        campaign.id,
                        CampaignStatus::Running,
                        CampaignStatus::RewardDistributionInProgress,
                    )
                    .await
                    .map_err(|e| HandlerError::retryable(e.to_string()))?;
                if !leased {
                    // A concurrent trigger holds the lease; let it drive.
                    debug!(campaign_id = %campaign.id, "close lease already taken");
                    return Ok(());
                }
            }
            // Redelivery while we already hold the lease: continue.
            CampaignStatus::RewardDistributionInProgress => {}
            other => {
                return Err(self
                    .fail_stage(
                        campaign.id,
                        CloseStage::Eligibility.as_str(),
                        format!("close requires a running campaign, found {other}"),
                        true,
                    )
                    .await);
            }
        }

        if campaign.first_post_id.is_none() || campaign.second_post_id.is_none() {
            return Err(self
                .fail_stage(
                    campaign.id,
                    CloseStage::Eligibility.as_str(),
                    "campaign posts missing at close time".to_string(),
                    true,
                )
                .await);
        }

        let close_at = Utc
            .timestamp_opt(req.close_at_unix, 0)
            .single()
            .ok_or_else(|| HandlerError::fatal("invalid close timestamp".to_string()))?;
        if Utc::now() < close_at {
            // Fired early (clock skew or manual trigger); let backoff retry.
            return Err(HandlerError::retryable(format!(
                "close time {close_at} not reached"
            )));
        }

        let mut leased = campaign.clone();
        leased.status = CampaignStatus::RewardDistributionInProgress;
        self.audit(&leased, "close sequence started", json!({"close_at": close_at}))
            .await;
        info!(campaign_id = %campaign.id, "close sequence started");

        self.next_close_stage(&leased, req, CloseStage::Eligibility)
            .await;
        Ok(())
    }

    /// Stage 2: collect engagement from the social API.
    async fn close_engagement(
        &self,
        campaign: &Campaign,
        req: &CloseStageRequested,
    ) -> Result<(), HandlerError> {
        let report = match self.social.collect_engagement(campaign).await {
            Ok(r) => r,
            Err(e) => {
                return Err(self
                    .fail_stage(
                        campaign.id,
                        CloseStage::Engagement.as_str(),
                        e.to_string(),
                        false,
                    )
                    .await);
            }
        };

        self.audit(
            campaign,
            "engagement collected",
            json!({
                "likes": report.likes,
                "reposts": report.reposts,
                "replies": report.replies,
                "eligible_participants": report.eligible_participants,
            }),
        )
        .await;

        let mut advanced = req.clone();
        advanced.engagement = Some(report);
        self.next_close_stage(campaign, &advanced, CloseStage::Engagement)
            .await;
        Ok(())
    }

    /// Stage 3: split the pool. Pure math; failures here are logic errors.
    async fn close_reward_calculation(
        &self,
        campaign: &Campaign,
        req: &CloseStageRequested,
    ) -> Result<(), HandlerError> {
        let Some(engagement) = req.engagement else {
            return Err(HandlerError::fatal(
                "reward calculation delivered without engagement data".to_string(),
            ));
        };

        let outcome = RewardOutcome::split(campaign.reward_pool, &engagement);
        self.audit(
            campaign,
            "rewards calculated",
            json!({
                "total_payout": outcome.total_payout,
                "share": outcome.share,
                "recipients": outcome.recipients,
            }),
        )
        .await;

        let mut advanced = req.clone();
        advanced.rewards = Some(outcome);
        self.next_close_stage(campaign, &advanced, CloseStage::RewardCalculation)
            .await;
        Ok(())
    }

    /// Stage 4: settle the pool — on-chain for escrow funding, balance debit
    /// for direct funding.
    async fn close_settlement(
        &self,
        campaign: &Campaign,
        owner: &Owner,
        req: &CloseStageRequested,
    ) -> Result<(), HandlerError> {
        let Some(rewards) = req.rewards else {
            return Err(HandlerError::fatal(
                "settlement delivered without a reward outcome".to_string(),
            ));
        };

        let receipt = if rewards.total_payout == 0 {
            debug!(campaign_id = %campaign.id, "nothing to settle");
            None
        } else {
            let settled = match campaign.funding {
                FundingType::Escrow => self
                    .ledger
                    .settle(campaign.id, rewards.total_payout, &owner.wallet)
                    .await
                    .map(Some),
                FundingType::Direct => self
                    .balances
                    .decrement(owner.id, rewards.total_payout)
                    .await
                    .map(|_| None),
            };
            match settled {
                Ok(receipt) => receipt,
                Err(e) => {
                    return Err(self
                        .fail_stage(
                            campaign.id,
                            CloseStage::Settlement.as_str(),
                            e.to_string(),
                            false,
                        )
                        .await);
                }
            }
        };

        self.cache
            .set(&campaign.contract_id, CloseStage::Settlement.as_str(), true)
            .await;
        self.audit(
            campaign,
            "reward pool settled",
            json!({"receipt": receipt, "total_payout": rewards.total_payout}),
        )
        .await;

        let mut advanced = req.clone();
        advanced.settlement_receipt = receipt;
        self.next_close_stage(campaign, &advanced, CloseStage::Settlement)
            .await;
        Ok(())
    }

    /// Stage 5: persist the outcome and mark rewards distributed.
    async fn close_db_update(
        &self,
        campaign: &Campaign,
        req: &CloseStageRequested,
    ) -> Result<(), HandlerError> {
        let Some(rewards) = req.rewards else {
            return Err(HandlerError::fatal(
                "db update delivered without a reward outcome".to_string(),
            ));
        };

        self.repo
            .record_close_outcome(campaign.id, &rewards, req.settlement_receipt.as_deref())
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;

        let done = self
            .repo
            .try_transition(
                campaign.id,
                CampaignStatus::RewardDistributionInProgress,
                CampaignStatus::RewardsDistributed,
            )
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;
        if !done {
            debug!(campaign_id = %campaign.id, "rewards already marked distributed");
        }

        let mut closed = campaign.clone();
        closed.status = CampaignStatus::RewardsDistributed;
        self.audit(
            &closed,
            "rewards distributed",
            json!({"total_payout": rewards.total_payout, "recipients": rewards.recipients}),
        )
        .await;
        info!(campaign_id = %campaign.id, "rewards distributed");

        self.next_close_stage(&closed, req, CloseStage::DbUpdate).await;
        Ok(())
    }

    /// Stage 6: clear derived state.
    async fn close_cleanup(&self, campaign: &Campaign) -> Result<(), HandlerError> {
        self.cache.clear(&campaign.contract_id).await;
        self.repo
            .set_queue_flag(campaign.id, false)
            .await
            .map_err(|e| HandlerError::retryable(e.to_string()))?;
        self.audit(campaign, "campaign closed", json!({})).await;
        info!(campaign_id = %campaign.id, "campaign closed");
        Ok(())
    }

    /// Publish the next stage's trigger. The deterministic per-stage key
    /// keeps redelivered triggers from arming a stage twice.
    async fn next_close_stage(
        &self,
        campaign: &Campaign,
        req: &CloseStageRequested,
        current: CloseStage,
    ) {
        let Some(next) = current.next() else {
            return;
        };

        let event = req.advance(next);
        let options = PublishOptions::with_delivery(DeliveryPolicy::for_close_sequence(
            self.config(),
        ))
        .keyed(JobKey::close_stage(
            campaign.id,
            req.close_at_unix,
            next.as_str(),
        ));
        self.publisher()
            .publish_event(Some(campaign.id), &event, options)
            .await;
    }
}
