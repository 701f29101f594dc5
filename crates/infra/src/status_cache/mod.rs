//! Fast-read status cache.
//!
//! A derived projection of campaign sub-task completion, keyed by contract
//! id. Used for UI polling and cheap idempotency peeks only — it is
//! rebuildable from the outbox/audit log and **never** gates state-machine
//! logic. All operations are best-effort; failures are logged, not
//! propagated.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use promoforge_core::ContractId;

pub use in_memory::InMemoryStatusCache;
#[cfg(feature = "redis")]
pub use redis::RedisStatusCache;

/// Sub-task flag store.
#[async_trait::async_trait]
pub trait StatusCache: Send + Sync {
    /// Record a sub-task outcome for a campaign contract.
    async fn set(&self, contract_id: &ContractId, sub_task: &str, success: bool);

    /// Read a sub-task flag, if cached.
    async fn get(&self, contract_id: &ContractId, sub_task: &str) -> Option<bool>;

    /// Drop all flags for a campaign contract.
    async fn clear(&self, contract_id: &ContractId);
}
