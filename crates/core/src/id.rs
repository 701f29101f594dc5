//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a campaign.
///
/// Campaigns are keyed by a numeric id assigned by the external catalog;
/// correlation always uses this typed value, never a substring match on
/// serialized payloads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(i64);

impl CampaignId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for CampaignId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for CampaignId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("CampaignId: {e}")))?;
        Ok(Self(value))
    }
}

/// Identifier of an event row in the outbox store (store-assigned).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for EventId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("EventId: {e}")))?;
        Ok(Self(value))
    }
}

/// Identifier of a user (campaign owner or participant).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("UserId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Identifier of a campaign's on-chain contract instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_id("ContractId cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ContractId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Deterministic, caller-supplied identity of a scheduled job.
///
/// The key names the logical unit of work, so re-submitting "the same" work
/// never creates a duplicate job. Allowed characters: alphanumerics, `-`, `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    const MAX_LENGTH: usize = 128;

    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DomainError::invalid_id("JobKey cannot be empty"));
        }
        if key.len() > Self::MAX_LENGTH {
            return Err(DomainError::invalid_id(format!(
                "JobKey exceeds {} characters",
                Self::MAX_LENGTH
            )));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::invalid_id(
                "JobKey contains invalid characters (allowed: a-z, A-Z, 0-9, -, _)",
            ));
        }
        Ok(Self(key))
    }

    /// Key of the close job armed when a campaign goes live.
    ///
    /// Derived from campaign id + close timestamp so a re-invoked handler
    /// arms the same job instead of a duplicate.
    pub fn campaign_close(campaign_id: CampaignId, close_at_unix: i64) -> Self {
        Self(format!("campaign-close-{campaign_id}-{close_at_unix}"))
    }

    /// Key of one stage of the close sequence.
    pub fn close_stage(campaign_id: CampaignId, close_at_unix: i64, stage: &str) -> Self {
        Self(format!("campaign-close-{campaign_id}-{close_at_unix}-{stage}"))
    }

    /// Key of a publish-flow stage (first/second content).
    pub fn publish_stage(campaign_id: CampaignId, stage: &str) -> Self {
        Self(format!("campaign-publish-{campaign_id}-{stage}"))
    }

    /// Key of a one-off delivery job for a stored event.
    ///
    /// Unique per event id; event type characters outside the allowed set
    /// are folded to `-`.
    pub fn delivery(event_type: &str, event_id: EventId) -> Self {
        let sanitized: String = event_type
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(format!("deliver-{sanitized}-{event_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_id_roundtrips_through_str() {
        let id: CampaignId = "42".parse().unwrap();
        assert_eq!(id, CampaignId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn job_key_rejects_invalid_characters() {
        assert!(JobKey::new("campaign close 1").is_err());
        assert!(JobKey::new("").is_err());
        assert!(JobKey::new("campaign-close-1-1700000000").is_ok());
    }

    #[test]
    fn close_key_is_deterministic() {
        let a = JobKey::campaign_close(CampaignId::new(42), 1_700_000_000);
        let b = JobKey::campaign_close(CampaignId::new(42), 1_700_000_000);
        assert_eq!(a, b);

        let c = JobKey::campaign_close(CampaignId::new(421), 1_700_000_000);
        assert_ne!(a, c);
    }

    #[test]
    fn contract_id_rejects_empty() {
        assert!(ContractId::new("  ").is_err());
        assert!(ContractId::new("0xabc123").is_ok());
    }
}
