use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use promoforge_core::CampaignId;

/// Envelope for an event as it travels over the in-process bus.
///
/// Notes:
/// - Correlation uses the explicit `campaign_id` attribute; consumers never
///   dig through the serialized payload to find the campaign.
/// - The bus is best-effort and non-durable; the outbox row written by the
///   publisher is the source of truth for "what happened".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_type: String,
    campaign_id: Option<CampaignId>,
    occurred_at: DateTime<Utc>,
    payload: JsonValue,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        campaign_id: Option<CampaignId>,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            campaign_id,
            occurred_at,
            payload,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn campaign_id(&self) -> Option<CampaignId> {
        self.campaign_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn into_payload(self) -> JsonValue {
        self.payload
    }
}
