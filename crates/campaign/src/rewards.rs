//! Reward math.

use serde::{Deserialize, Serialize};

/// Engagement collected for a campaign's posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementReport {
    pub likes: u64,
    pub reposts: u64,
    pub replies: u64,
    /// Distinct participants that qualified for a reward.
    pub eligible_participants: u64,
}

impl EngagementReport {
    /// Weighted engagement score. Reposts carry the campaign furthest, so
    /// they weigh double; replies weigh above likes.
    pub fn score(&self) -> u64 {
        self.likes + self.replies * 2 + self.reposts * 3
    }
}

/// Outcome of the reward-calculation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardOutcome {
    /// Amount actually paid out (smallest currency unit).
    pub total_payout: u64,
    /// Per-participant share.
    pub share: u64,
    pub recipients: u64,
}

impl RewardOutcome {
    /// Split `pool` evenly across eligible participants.
    ///
    /// Integer division truncates; the remainder stays in the pool rather
    /// than over-paying. Zero participants means zero payout.
    pub fn split(pool: u64, report: &EngagementReport) -> Self {
        let recipients = report.eligible_participants;
        if recipients == 0 {
            return Self {
                total_payout: 0,
                share: 0,
                recipients: 0,
            };
        }
        let share = pool / recipients;
        Self {
            total_payout: share * recipients,
            share,
            recipients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_truncates_remainder() {
        let report = EngagementReport {
            eligible_participants: 3,
            ..Default::default()
        };
        let outcome = RewardOutcome::split(100, &report);
        assert_eq!(outcome.share, 33);
        assert_eq!(outcome.total_payout, 99);
        assert_eq!(outcome.recipients, 3);
    }

    #[test]
    fn no_participants_no_payout() {
        let outcome = RewardOutcome::split(1_000_000, &EngagementReport::default());
        assert_eq!(outcome.total_payout, 0);
        assert_eq!(outcome.recipients, 0);
    }

    proptest! {
        /// Property: the payout never exceeds the pool.
        #[test]
        fn payout_bounded_by_pool(pool in 0u64..10_000_000, participants in 0u64..10_000) {
            let report = EngagementReport { eligible_participants: participants, ..Default::default() };
            let outcome = RewardOutcome::split(pool, &report);
            prop_assert!(outcome.total_payout <= pool);
        }
    }
}
