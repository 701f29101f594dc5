//! Redis-backed status cache (optional).
//!
//! Flags live in one hash per contract (`campaign_status:<contract>`), so a
//! campaign's flags are cleared with a single `DEL`. Best-effort: any Redis
//! error is logged and the call returns as if the cache missed.

use redis::AsyncCommands;
use tracing::warn;

use promoforge_core::ContractId;

use super::StatusCache;

/// Redis status cache.
#[derive(Debug, Clone)]
pub struct RedisStatusCache {
    client: redis::Client,
}

impl RedisStatusCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url.as_ref())?;
        Ok(Self { client })
    }

    fn key(contract_id: &ContractId) -> String {
        format!("campaign_status:{}", contract_id.as_str())
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "status cache connection failed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl StatusCache for RedisStatusCache {
    async fn set(&self, contract_id: &ContractId, sub_task: &str, success: bool) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let result: Result<(), redis::RedisError> = conn
            .hset(Self::key(contract_id), sub_task, success as i32)
            .await;
        if let Err(e) = result {
            warn!(contract = %contract_id, sub_task, error = %e, "status cache set failed");
        }
    }

    async fn get(&self, contract_id: &ContractId, sub_task: &str) -> Option<bool> {
        let mut conn = self.connection().await?;
        let value: Result<Option<i32>, redis::RedisError> =
            conn.hget(Self::key(contract_id), sub_task).await;
        match value {
            Ok(v) => v.map(|n| n != 0),
            Err(e) => {
                warn!(contract = %contract_id, sub_task, error = %e, "status cache get failed");
                None
            }
        }
    }

    async fn clear(&self, contract_id: &ContractId) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let result: Result<(), redis::RedisError> = conn.del(Self::key(contract_id)).await;
        if let Err(e) = result {
            warn!(contract = %contract_id, error = %e, "status cache clear failed");
        }
    }
}
