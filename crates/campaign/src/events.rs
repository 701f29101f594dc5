//! Lifecycle event types and payloads.
//!
//! Each stage handler is the only publisher of the next stage's trigger
//! event, so these payloads are the full contract between stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promoforge_core::CampaignId;
use promoforge_events::DomainEvent;

use crate::stage::CloseStage;

/// Event type names, used as routing keys end to end.
pub mod names {
    pub const PUBLISH_FIRST_CONTENT: &str = "campaign.publish.first_content";
    pub const PUBLISH_SECOND_CONTENT: &str = "campaign.publish.second_content";
    pub const PUBLISH_ERROR: &str = "campaign.publish.error";

    pub const CLOSE_ELIGIBILITY: &str = "campaign.close.eligibility";
    pub const CLOSE_ENGAGEMENT: &str = "campaign.close.engagement";
    pub const CLOSE_REWARD_CALCULATION: &str = "campaign.close.reward_calculation";
    pub const CLOSE_SETTLEMENT: &str = "campaign.close.settlement";
    pub const CLOSE_DB_UPDATE: &str = "campaign.close.db_update";
    pub const CLOSE_CLEANUP: &str = "campaign.close.cleanup";
}

/// The trigger event type for one close stage.
pub fn close_stage_event_type(stage: CloseStage) -> &'static str {
    match stage {
        CloseStage::Eligibility => names::CLOSE_ELIGIBILITY,
        CloseStage::Engagement => names::CLOSE_ENGAGEMENT,
        CloseStage::RewardCalculation => names::CLOSE_REWARD_CALCULATION,
        CloseStage::Settlement => names::CLOSE_SETTLEMENT,
        CloseStage::DbUpdate => names::CLOSE_DB_UPDATE,
        CloseStage::Cleanup => names::CLOSE_CLEANUP,
    }
}

/// Trigger: publish the campaign's first post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstContentRequested {
    pub campaign_id: CampaignId,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for FirstContentRequested {
    fn event_type(&self) -> &'static str {
        names::PUBLISH_FIRST_CONTENT
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Trigger: publish the second post, then go live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondContentRequested {
    pub campaign_id: CampaignId,
    pub first_post_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for SecondContentRequested {
    fn event_type(&self) -> &'static str {
        names::PUBLISH_SECOND_CONTENT
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Trigger: run one stage of the close sequence.
///
/// Stage results accumulate in the payload as the sequence advances, so each
/// stage is an independently retryable unit with everything it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseStageRequested {
    pub campaign_id: CampaignId,
    pub stage: CloseStage,
    /// Unix timestamp of the scheduled close, carried through all stages so
    /// every stage derives the same deterministic job keys.
    pub close_at_unix: i64,
    /// Filled by the engagement stage.
    #[serde(default)]
    pub engagement: Option<crate::rewards::EngagementReport>,
    /// Filled by the reward-calculation stage.
    #[serde(default)]
    pub rewards: Option<crate::rewards::RewardOutcome>,
    /// Filled by the settlement stage (escrow funding only).
    #[serde(default)]
    pub settlement_receipt: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl CloseStageRequested {
    /// The trigger for the first close stage.
    pub fn initial(campaign_id: CampaignId, close_at_unix: i64) -> Self {
        Self {
            campaign_id,
            stage: CloseStage::Eligibility,
            close_at_unix,
            engagement: None,
            rewards: None,
            settlement_receipt: None,
            occurred_at: Utc::now(),
        }
    }

    /// The same request advanced to the next stage.
    pub fn advance(&self, stage: CloseStage) -> Self {
        Self {
            stage,
            occurred_at: Utc::now(),
            ..self.clone()
        }
    }
}

impl DomainEvent for CloseStageRequested {
    fn event_type(&self) -> &'static str {
        close_stage_event_type(self.stage)
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Raised instead of unwinding when a publish/close stage fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignErrorRaised {
    pub campaign_id: CampaignId,
    /// Stage label (e.g. "first_content", "close/settlement").
    pub stage: String,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for CampaignErrorRaised {
    fn event_type(&self) -> &'static str {
        names::PUBLISH_ERROR
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
