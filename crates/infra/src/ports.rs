//! External collaborator ports.
//!
//! The social API client, the on-chain ledger and the balance service are
//! opaque to this engine; these traits are the whole contract. Error
//! `Display` text feeds the critical-failure matcher, so variants spell out
//! the condition.

use thiserror::Error;

use promoforge_campaign::{Campaign, EngagementReport, Owner};
use promoforge_core::{CampaignId, UserId};

/// External service failure.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("authentication expired: {0}")]
    AuthExpired(String),

    #[error("contract execution failed: {0}")]
    ContractFailed(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Publishes campaign posts and reads their engagement.
#[async_trait::async_trait]
pub trait SocialPostService: Send + Sync {
    /// Publish the campaign's first post. Returns the post id.
    async fn publish_first(&self, campaign: &Campaign, owner: &Owner)
    -> Result<String, ServiceError>;

    /// Publish the second post as a reply to the first. Returns the thread id.
    async fn publish_second(
        &self,
        campaign: &Campaign,
        owner: &Owner,
        first_post_id: &str,
    ) -> Result<String, ServiceError>;

    /// Collect engagement for the campaign's posts.
    async fn collect_engagement(&self, campaign: &Campaign)
    -> Result<EngagementReport, ServiceError>;
}

/// Settles escrowed reward pools on-chain.
#[async_trait::async_trait]
pub trait LedgerService: Send + Sync {
    /// Settle `amount` from the campaign contract to participants.
    /// Returns the transaction receipt.
    async fn settle(
        &self,
        campaign_id: CampaignId,
        amount: u64,
        owner_wallet: &str,
    ) -> Result<String, ServiceError>;
}

/// Adjusts platform-held balances.
#[async_trait::async_trait]
pub trait BalanceService: Send + Sync {
    /// Debit `amount` from the user's balance. Returns the updated balance.
    async fn decrement(&self, user_id: UserId, amount: u64) -> Result<u64, ServiceError>;
}
