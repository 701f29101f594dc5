//! Append-only campaign audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use promoforge_core::CampaignId;

use crate::status::CampaignStatus;

/// One row of the campaign audit trail.
///
/// Never mutated or deleted; one entry per significant transition or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignLogEntry {
    pub campaign_id: CampaignId,
    pub status: CampaignStatus,
    pub message: String,
    pub data: JsonValue,
    pub timestamp: DateTime<Utc>,
}

impl CampaignLogEntry {
    pub fn new(
        campaign_id: CampaignId,
        status: CampaignStatus,
        message: impl Into<String>,
        data: JsonValue,
    ) -> Self {
        Self {
            campaign_id,
            status,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}
