//! In-memory repository/log implementations for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use promoforge_campaign::{Campaign, CampaignLogEntry, CampaignStatus, Owner, RewardOutcome};
use promoforge_core::CampaignId;

use super::{CampaignLogStore, CampaignRepository, RepositoryError};

#[derive(Debug, Clone)]
struct CampaignRow {
    campaign: Campaign,
    owner: Owner,
    outcome: Option<(RewardOutcome, Option<String>)>,
}

/// In-memory campaign repository.
#[derive(Debug, Default)]
pub struct InMemoryCampaignRepository {
    rows: RwLock<HashMap<CampaignId, CampaignRow>>,
}

impl InMemoryCampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a campaign (stands in for the external catalog).
    pub fn insert(&self, campaign: Campaign, owner: Owner) {
        let mut rows = self.rows.write().expect("repository lock poisoned");
        rows.insert(
            campaign.id,
            CampaignRow {
                campaign,
                owner,
                outcome: None,
            },
        );
    }

    /// The recorded close outcome, for assertions in tests.
    pub fn close_outcome(&self, id: CampaignId) -> Option<(RewardOutcome, Option<String>)> {
        let rows = self.rows.read().expect("repository lock poisoned");
        rows.get(&id).and_then(|r| r.outcome.clone())
    }

    fn with_row<T>(
        &self,
        id: CampaignId,
        f: impl FnOnce(&mut CampaignRow) -> T,
    ) -> Result<T, RepositoryError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        let row = rows.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        Ok(f(row))
    }
}

#[async_trait::async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        Ok(rows.get(&id).map(|r| r.campaign.clone()))
    }

    async fn owner_of(&self, id: CampaignId) -> Result<Option<Owner>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        Ok(rows.get(&id).map(|r| r.owner.clone()))
    }

    async fn try_transition(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, RepositoryError> {
        self.with_row(id, |row| {
            if row.campaign.status == from && from.can_transition_to(to) {
                row.campaign.status = to;
                true
            } else {
                false
            }
        })
    }

    async fn record_first_post(
        &self,
        id: CampaignId,
        post_id: &str,
    ) -> Result<(), RepositoryError> {
        self.with_row(id, |row| {
            row.campaign.first_post_id = Some(post_id.to_string());
        })
    }

    async fn record_second_post(
        &self,
        id: CampaignId,
        post_id: &str,
        close_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.with_row(id, |row| {
            row.campaign.second_post_id = Some(post_id.to_string());
            row.campaign.close_at = Some(close_at);
        })
    }

    async fn set_queue_flag(&self, id: CampaignId, armed: bool) -> Result<(), RepositoryError> {
        self.with_row(id, |row| {
            row.campaign.is_added_to_queue = armed;
        })
    }

    async fn record_close_outcome(
        &self,
        id: CampaignId,
        outcome: &RewardOutcome,
        receipt: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.with_row(id, |row| {
            row.outcome = Some((*outcome, receipt.map(str::to_string)));
        })
    }

    async fn in_progress(&self) -> Result<Vec<Campaign>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        let mut result: Vec<_> = rows
            .values()
            .filter(|r| r.campaign.status.is_in_progress())
            .map(|r| r.campaign.clone())
            .collect();
        result.sort_by_key(|c| c.id);
        Ok(result)
    }
}

/// In-memory append-only campaign log.
#[derive(Debug, Default)]
pub struct InMemoryCampaignLogStore {
    entries: RwLock<Vec<CampaignLogEntry>>,
}

impl InMemoryCampaignLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CampaignLogStore for InMemoryCampaignLogStore {
    async fn append(&self, entry: CampaignLogEntry) -> Result<(), RepositoryError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }

    async fn recent(
        &self,
        campaign_id: CampaignId,
        limit: usize,
    ) -> Result<Vec<CampaignLogEntry>, RepositoryError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.campaign_id == campaign_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn all_for(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignLogEntry>, RepositoryError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        Ok(entries
            .iter()
            .filter(|e| e.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoforge_core::{ContractId, UserId};

    fn seed(repo: &InMemoryCampaignRepository, id: i64, status: CampaignStatus) -> CampaignId {
        let campaign_id = CampaignId::new(id);
        repo.insert(
            Campaign {
                id: campaign_id,
                owner: UserId::new(),
                contract_id: ContractId::new(format!("0x{id}")).unwrap(),
                funding: promoforge_campaign::FundingType::Escrow,
                status,
                reward_pool: 1000,
                first_post_id: None,
                second_post_id: None,
                close_at: None,
                is_added_to_queue: false,
            },
            Owner {
                id: UserId::new(),
                handle: "owner".to_string(),
                wallet: "0xwallet".to_string(),
            },
        );
        campaign_id
    }

    #[tokio::test]
    async fn transition_is_conditional_on_current_status() {
        let repo = InMemoryCampaignRepository::new();
        let id = seed(&repo, 1, CampaignStatus::Running);

        // First trigger wins the lease.
        assert!(
            repo.try_transition(
                id,
                CampaignStatus::Running,
                CampaignStatus::RewardDistributionInProgress
            )
            .await
            .unwrap()
        );

        // A concurrent second trigger loses it.
        assert!(
            !repo
                .try_transition(
                    id,
                    CampaignStatus::Running,
                    CampaignStatus::RewardDistributionInProgress
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn illegal_transitions_are_refused_even_when_status_matches() {
        let repo = InMemoryCampaignRepository::new();
        let id = seed(&repo, 2, CampaignStatus::Draft);

        assert!(
            !repo
                .try_transition(id, CampaignStatus::Draft, CampaignStatus::Running)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn recent_returns_newest_first_with_limit() {
        let logs = InMemoryCampaignLogStore::new();
        let id = CampaignId::new(3);

        for i in 0..5 {
            logs.append(CampaignLogEntry::new(
                id,
                CampaignStatus::Running,
                format!("entry {i}"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        }

        let recent = logs.recent(id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "entry 4");
    }
}
