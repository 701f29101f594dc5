//! Durable outbox event store.
//!
//! The outbox is the single source of truth for "what happened": every
//! publish writes a row here before anything is handed to the delivery
//! queue. Rows are immutable; the only delete path is dead-letter replay
//! cleanup, enforced by the recovery layer.

pub mod in_memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use promoforge_core::{CampaignId, EventId};

pub use in_memory::InMemoryOutboxStore;
pub use postgres::PostgresOutboxStore;

/// A stored event row.
///
/// Correlation uses the explicit `campaign_id` column; the store never
/// matches substrings of the serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub event_type: String,
    pub campaign_id: Option<CampaignId>,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Outbox operation error.
#[derive(Debug, Clone, Error)]
pub enum OutboxError {
    /// Storage unavailable or rejected the operation. Propagated, never
    /// swallowed: callers decide whether delivery can still be guaranteed.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("event not found: {0}")]
    NotFound(EventId),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Append-mostly event store boundary.
#[async_trait::async_trait]
pub trait OutboxStore: Send + Sync {
    /// Append one event. The store assigns the id.
    async fn append(
        &self,
        event_type: &str,
        campaign_id: Option<CampaignId>,
        payload: JsonValue,
    ) -> Result<EventId, OutboxError>;

    /// Fetch a single event by id.
    async fn get(&self, id: EventId) -> Result<Option<EventRecord>, OutboxError>;

    /// All events correlated to a campaign, oldest first, capped at `limit`.
    async fn events_for_campaign(
        &self,
        campaign_id: CampaignId,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError>;

    /// Dead-letter rows correlated to a campaign, oldest first.
    async fn dead_letters_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<EventRecord>, OutboxError>;

    /// Events whose type starts with `prefix`, newest first, capped at `limit`.
    async fn list_by_type_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError>;

    /// Delete a row. Reserved for dead-letter replay cleanup.
    async fn delete(&self, id: EventId) -> Result<(), OutboxError>;
}
