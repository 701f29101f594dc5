//! In-memory outbox for tests/dev.

use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde_json::Value as JsonValue;

use promoforge_core::{CampaignId, EventId};
use promoforge_events::is_dead_letter;

use super::{EventRecord, OutboxError, OutboxStore};

/// In-memory append-mostly event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    rows: RwLock<Vec<EventRecord>>,
    next_id: AtomicI64,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Snapshot of every row, for assertions in tests.
    pub fn all(&self) -> Vec<EventRecord> {
        self.rows.read().expect("outbox lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn append(
        &self,
        event_type: &str,
        campaign_id: Option<CampaignId>,
        payload: JsonValue,
    ) -> Result<EventId, OutboxError> {
        let id = EventId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = EventRecord {
            id,
            event_type: event_type.to_string(),
            campaign_id,
            payload,
            created_at: Utc::now(),
        };

        let mut rows = self
            .rows
            .write()
            .map_err(|_| OutboxError::Storage("lock poisoned".to_string()))?;
        rows.push(record);
        Ok(id)
    }

    async fn get(&self, id: EventId) -> Result<Option<EventRecord>, OutboxError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| OutboxError::Storage("lock poisoned".to_string()))?;
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    async fn events_for_campaign(
        &self,
        campaign_id: CampaignId,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| OutboxError::Storage("lock poisoned".to_string()))?;
        Ok(rows
            .iter()
            .filter(|r| r.campaign_id == Some(campaign_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn dead_letters_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| OutboxError::Storage("lock poisoned".to_string()))?;
        Ok(rows
            .iter()
            .filter(|r| r.campaign_id == Some(campaign_id) && is_dead_letter(&r.event_type))
            .cloned()
            .collect())
    }

    async fn list_by_type_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| OutboxError::Storage("lock poisoned".to_string()))?;
        Ok(rows
            .iter()
            .rev()
            .filter(|r| r.event_type.starts_with(prefix))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: EventId) -> Result<(), OutboxError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| OutboxError::Storage("lock poisoned".to_string()))?;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(OutboxError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoforge_events::dead_letter_type;
    use serde_json::json;

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let store = InMemoryOutboxStore::new();
        let a = store.append("x", None, json!({})).await.unwrap();
        let b = store.append("x", None, json!({})).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn correlation_uses_the_typed_campaign_id() {
        let store = InMemoryOutboxStore::new();
        let c42 = CampaignId::new(42);
        let c421 = CampaignId::new(421);

        store.append("a", Some(c42), json!({})).await.unwrap();
        store.append("b", Some(c421), json!({})).await.unwrap();

        // 42 is a substring of 421; the typed column must not conflate them.
        let rows = store.events_for_campaign(c42, 100).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "a");
    }

    #[tokio::test]
    async fn dead_letters_are_filtered_by_namespace() {
        let store = InMemoryOutboxStore::new();
        let id = CampaignId::new(7);

        store.append("live", Some(id), json!({})).await.unwrap();
        let dl = store
            .append(&dead_letter_type("live"), Some(id), json!({}))
            .await
            .unwrap();

        let dead = store.dead_letters_for_campaign(id).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, dl);
    }

    #[tokio::test]
    async fn delete_removes_exactly_one_row() {
        let store = InMemoryOutboxStore::new();
        let a = store.append("x", None, json!({})).await.unwrap();
        let b = store.append("y", None, json!({})).await.unwrap();

        store.delete(a).await.unwrap();
        assert!(store.get(a).await.unwrap().is_none());
        assert!(store.get(b).await.unwrap().is_some());

        assert!(matches!(
            store.delete(a).await,
            Err(OutboxError::NotFound(_))
        ));
    }
}
