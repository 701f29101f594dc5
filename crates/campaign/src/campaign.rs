//! Campaign entity and owner.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use promoforge_core::{CampaignId, ContractId, UserId};

use crate::status::CampaignStatus;

/// How a campaign's reward pool is funded, which decides the settlement path
/// of the close sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingType {
    /// Pool escrowed in the campaign contract; settled on-chain.
    Escrow,
    /// Pool held on the owner's platform balance; debited directly.
    Direct,
}

/// A campaign as seen by the orchestration engine.
///
/// The catalog (external CRUD surface) owns creation and editing; the engine
/// reads campaigns through the repository port and writes only the lifecycle
/// fields below (status, post ids, close time, queue flag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub owner: UserId,
    pub contract_id: ContractId,
    pub funding: FundingType,
    pub status: CampaignStatus,

    /// Reward pool in smallest currency unit.
    pub reward_pool: u64,

    /// Id of the first published post, once stage one has run.
    pub first_post_id: Option<String>,
    /// Id of the second published post (thread reply), once stage two has run.
    pub second_post_id: Option<String>,

    /// When the close sequence fires. Set by the second publish stage.
    pub close_at: Option<DateTime<Utc>>,

    /// True while a close job is armed for this campaign.
    pub is_added_to_queue: bool,
}

impl Campaign {
    /// How far past its close time this campaign is, if at all.
    pub fn close_overdue_by(&self, now: DateTime<Utc>) -> Option<Duration> {
        let close_at = self.close_at?;
        if now > close_at {
            Some(now - close_at)
        } else {
            None
        }
    }

    /// Stuck: still in progress while `close_at` passed more than
    /// `threshold` ago. Diagnostic only; never gates transitions.
    pub fn is_stuck(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if !self.status.is_in_progress() {
            return false;
        }
        matches!(self.close_overdue_by(now), Some(overdue) if overdue > threshold)
    }
}

/// Campaign owner, as needed for posting and settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: UserId,
    /// Social handle the posts are published under.
    pub handle: String,
    /// Wallet receiving/paying settlement.
    pub wallet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: CampaignStatus, close_at: Option<DateTime<Utc>>) -> Campaign {
        Campaign {
            id: CampaignId::new(42),
            owner: UserId::new(),
            contract_id: ContractId::new("0xcontract").unwrap(),
            funding: FundingType::Escrow,
            status,
            reward_pool: 1_000_000,
            first_post_id: None,
            second_post_id: None,
            close_at,
            is_added_to_queue: true,
        }
    }

    #[test]
    fn stuck_requires_in_progress_status_and_overdue_close() {
        let now = Utc::now();
        let threshold = Duration::minutes(30);

        let overdue = sample(CampaignStatus::Running, Some(now - Duration::minutes(40)));
        assert!(overdue.is_stuck(now, threshold));

        let fresh = sample(CampaignStatus::Running, Some(now - Duration::minutes(10)));
        assert!(!fresh.is_stuck(now, threshold));

        let done = sample(
            CampaignStatus::RewardsDistributed,
            Some(now - Duration::minutes(40)),
        );
        assert!(!done.is_stuck(now, threshold));

        let unscheduled = sample(CampaignStatus::Running, None);
        assert!(!unscheduled.is_stuck(now, threshold));
    }
}
