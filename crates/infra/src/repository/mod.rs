//! Campaign repository and audit-log boundaries.
//!
//! The campaign table itself belongs to the external catalog; the engine
//! reads through this port and writes only lifecycle fields. The
//! conditional `try_transition` is the per-campaign lease: two concurrent
//! triggers of the same stage race on it and exactly one wins.

pub mod in_memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use promoforge_campaign::{Campaign, CampaignLogEntry, CampaignStatus, Owner, RewardOutcome};
use promoforge_core::CampaignId;

pub use in_memory::{InMemoryCampaignLogStore, InMemoryCampaignRepository};

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("campaign not found: {0}")]
    NotFound(CampaignId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Read/write access to campaigns, scoped to the lifecycle fields this
/// engine owns.
#[async_trait::async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, RepositoryError>;

    async fn owner_of(&self, id: CampaignId) -> Result<Option<Owner>, RepositoryError>;

    /// Conditionally move `from → to`. Returns false when the campaign is no
    /// longer in `from` — the caller lost the lease and must not proceed.
    async fn try_transition(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, RepositoryError>;

    async fn record_first_post(&self, id: CampaignId, post_id: &str)
    -> Result<(), RepositoryError>;

    async fn record_second_post(
        &self,
        id: CampaignId,
        post_id: &str,
        close_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn set_queue_flag(&self, id: CampaignId, armed: bool) -> Result<(), RepositoryError>;

    /// Persist the close outcome (reward split + optional settlement receipt).
    async fn record_close_outcome(
        &self,
        id: CampaignId,
        outcome: &RewardOutcome,
        receipt: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Campaigns currently in an in-progress status.
    async fn in_progress(&self) -> Result<Vec<Campaign>, RepositoryError>;
}

/// Append-only campaign audit log.
#[async_trait::async_trait]
pub trait CampaignLogStore: Send + Sync {
    async fn append(&self, entry: CampaignLogEntry) -> Result<(), RepositoryError>;

    /// Most recent entries first, capped at `limit`.
    async fn recent(
        &self,
        campaign_id: CampaignId,
        limit: usize,
    ) -> Result<Vec<CampaignLogEntry>, RepositoryError>;

    /// Full trail in chronological order.
    async fn all_for(&self, campaign_id: CampaignId)
    -> Result<Vec<CampaignLogEntry>, RepositoryError>;
}
