//! Campaign status state machine.

use serde::{Deserialize, Serialize};

use promoforge_core::{DomainError, DomainResult};

/// Lifecycle status of a campaign.
///
/// The orchestration engine is the only writer of these transitions while a
/// campaign is being published or closed. Status only moves forward through
/// the sequence, except into `InternalError`, which parks the campaign until
/// an operator resumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Approved,
    Running,
    RewardDistributionInProgress,
    RewardsDistributed,
    InternalError,
}

impl CampaignStatus {
    /// Position in the forward sequence. `InternalError` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            CampaignStatus::Draft => Some(0),
            CampaignStatus::Approved => Some(1),
            CampaignStatus::Running => Some(2),
            CampaignStatus::RewardDistributionInProgress => Some(3),
            CampaignStatus::RewardsDistributed => Some(4),
            CampaignStatus::InternalError => None,
        }
    }

    /// True while the engine still owes this campaign work.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            CampaignStatus::Running | CampaignStatus::RewardDistributionInProgress
        )
    }

    /// Terminal from the engine's perspective. `InternalError` requires an
    /// operator-initiated resume, not further automatic progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CampaignStatus::RewardsDistributed | CampaignStatus::InternalError
        )
    }

    /// Whether the state machine allows `self → to`.
    ///
    /// Forward single steps only, plus:
    /// - any in-progress status → `InternalError` (error sink)
    /// - `InternalError` → `Running` (operator resume path)
    pub fn can_transition_to(self, to: CampaignStatus) -> bool {
        match (self, to) {
            (CampaignStatus::InternalError, CampaignStatus::Running) => true,
            (from, CampaignStatus::InternalError) => !from.is_terminal(),
            (from, to) => match (from.rank(), to.rank()) {
                (Some(f), Some(t)) => t == f + 1,
                _ => false,
            },
        }
    }

    /// Checked transition, for callers that want the error message.
    pub fn transition_to(self, to: CampaignStatus) -> DomainResult<CampaignStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(DomainError::illegal_transition(format!(
                "{self:?} -> {to:?}"
            )))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Approved => "approved",
            CampaignStatus::Running => "running",
            CampaignStatus::RewardDistributionInProgress => "reward_distribution_in_progress",
            CampaignStatus::RewardsDistributed => "rewards_distributed",
            CampaignStatus::InternalError => "internal_error",
        }
    }
}

impl core::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
