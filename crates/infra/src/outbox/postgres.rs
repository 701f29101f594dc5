//! Postgres-backed outbox store.
//!
//! Persists events in an append-mostly table. The id column is a
//! `BIGSERIAL`, so the store assigns ids monotonically; `campaign_id` is an
//! explicit, indexed column used for all correlation queries.

use sqlx::{PgPool, Row};
use tracing::instrument;

use promoforge_core::{CampaignId, EventId};
use promoforge_events::DEAD_LETTER_PREFIX;

use super::{EventRecord, OutboxError, OutboxStore};

/// Postgres outbox store.
///
/// Shares a `PgPool`; safe for concurrent use from multiple in-flight
/// handlers and multiple orchestrator processes.
#[derive(Debug, Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_events (
                id          BIGSERIAL PRIMARY KEY,
                event_type  TEXT NOT NULL,
                campaign_id BIGINT,
                payload     JSONB NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS outbox_events_campaign_idx ON outbox_events (campaign_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> OutboxError {
    OutboxError::Storage(format!("{operation}: {e}"))
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<EventRecord, OutboxError> {
    Ok(EventRecord {
        id: EventId::new(
            row.try_get::<i64, _>("id")
                .map_err(|e| OutboxError::Serialization(e.to_string()))?,
        ),
        event_type: row
            .try_get("event_type")
            .map_err(|e| OutboxError::Serialization(e.to_string()))?,
        campaign_id: row
            .try_get::<Option<i64>, _>("campaign_id")
            .map_err(|e| OutboxError::Serialization(e.to_string()))?
            .map(CampaignId::new),
        payload: row
            .try_get("payload")
            .map_err(|e| OutboxError::Serialization(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| OutboxError::Serialization(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl OutboxStore for PostgresOutboxStore {
    #[instrument(skip(self, payload), fields(event_type = %event_type), err)]
    async fn append(
        &self,
        event_type: &str,
        campaign_id: Option<CampaignId>,
        payload: serde_json::Value,
    ) -> Result<EventId, OutboxError> {
        let row = sqlx::query(
            r#"
            INSERT INTO outbox_events (event_type, campaign_id, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(event_type)
        .bind(campaign_id.map(|c| c.value()))
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("append", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| OutboxError::Serialization(e.to_string()))?;
        Ok(EventId::new(id))
    }

    async fn get(&self, id: EventId) -> Result<Option<EventRecord>, OutboxError> {
        let row = sqlx::query(
            "SELECT id, event_type, campaign_id, payload, created_at FROM outbox_events WHERE id = $1",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn events_for_campaign(
        &self,
        campaign_id: CampaignId,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, campaign_id, payload, created_at
            FROM outbox_events
            WHERE campaign_id = $1
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(campaign_id.value())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("events_for_campaign", e))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn dead_letters_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, campaign_id, payload, created_at
            FROM outbox_events
            WHERE campaign_id = $1 AND event_type LIKE $2
            ORDER BY id ASC
            "#,
        )
        .bind(campaign_id.value())
        .bind(format!("{DEAD_LETTER_PREFIX}%"))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dead_letters_for_campaign", e))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_by_type_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, campaign_id, payload, created_at
            FROM outbox_events
            WHERE event_type LIKE $1 || '%'
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(prefix)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_by_type_prefix", e))?;

        rows.iter().map(row_to_record).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: EventId) -> Result<(), OutboxError> {
        let result = sqlx::query("DELETE FROM outbox_events WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::NotFound(id));
        }
        Ok(())
    }
}
