//! Event publisher: outbox write, bus fan-out, durable delivery enqueue.
//!
//! One contract for every caller; delivery behavior is a `DeliveryPolicy`
//! value, not a separate code path. `DeliveryPolicy::default()` is the plain
//! path (queue defaults); callers that need more set retries/priority/delay
//! per call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use promoforge_core::{CampaignId, EventId, JobKey, OrchestratorConfig};
use promoforge_events::{DomainEvent, EventBus, EventEnvelope, InMemoryEventBus};

use crate::outbox::OutboxStore;
use crate::scheduler::{EnqueueOutcome, JobPriority, JobStore, RetryPolicy, ScheduledJob};

/// Per-call delivery behavior.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Total delivery tries before the event is dead-lettered.
    pub max_attempts: u32,
    pub priority: JobPriority,
    /// Exponential backoff base between retries.
    pub backoff_base: Duration,
    /// Hold the delivery until this long from now (delayed execution).
    pub delay: Option<Duration>,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            priority: JobPriority::Normal,
            backoff_base: Duration::from_millis(500),
            delay: None,
        }
    }
}

impl DeliveryPolicy {
    /// Queue defaults as configured for this engine instance.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            max_attempts: config.delivery_max_attempts,
            backoff_base: config.delivery_backoff_base(),
            ..Default::default()
        }
    }

    /// Close-sequence policy: 5 tries, exponential backoff from 30 s
    /// (both config-driven).
    pub fn for_close_sequence(config: &OrchestratorConfig) -> Self {
        Self {
            max_attempts: config.close_max_attempts,
            backoff_base: config.close_backoff_base(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Per-call publish options.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub delivery: DeliveryPolicy,
    /// Deterministic identity of the delivery job. When set, re-publishing
    /// the same logical unit is duplicate-suppressed by the queue. When
    /// unset, the job is keyed by the stored event id (unique).
    pub job_key: Option<JobKey>,
}

impl PublishOptions {
    pub fn with_delivery(delivery: DeliveryPolicy) -> Self {
        Self {
            delivery,
            job_key: None,
        }
    }

    pub fn keyed(mut self, key: JobKey) -> Self {
        self.job_key = Some(key);
        self
    }
}

/// The publisher.
///
/// Pipeline, in order:
/// 1. best-effort bus fan-out to local subscribers (a failing subscriber
///    never aborts the publish)
/// 2. durable outbox append — the at-least-once anchor; on failure the call
///    returns `None` ("could not guarantee delivery") and the caller decides
///    whether to retry at a higher level
/// 3. delivery job enqueue carrying the policy; an enqueue failure after a
///    successful append still returns the event id, because the row is
///    durable and recoverable
pub struct EventPublisher<B = InMemoryEventBus<EventEnvelope>>
where
    B: EventBus<EventEnvelope>,
{
    bus: Arc<B>,
    outbox: Arc<dyn OutboxStore>,
    jobs: Arc<dyn JobStore>,
}

impl<B> EventPublisher<B>
where
    B: EventBus<EventEnvelope>,
{
    pub fn new(bus: Arc<B>, outbox: Arc<dyn OutboxStore>, jobs: Arc<dyn JobStore>) -> Self {
        Self { bus, outbox, jobs }
    }

    pub fn outbox(&self) -> &Arc<dyn OutboxStore> {
        &self.outbox
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    /// Publish an event.
    ///
    /// Returns the stored event's id, or `None` if the outbox write failed
    /// (logged, not thrown).
    pub async fn publish(
        &self,
        event_type: &str,
        campaign_id: Option<CampaignId>,
        payload: JsonValue,
        options: PublishOptions,
    ) -> Option<EventId> {
        let envelope = EventEnvelope::new(event_type, campaign_id, Utc::now(), payload.clone());
        if let Err(e) = self.bus.publish(envelope) {
            // Fire-and-forget: local listeners are a convenience, the outbox
            // row is the guarantee.
            warn!(event_type, error = ?e, "bus fan-out failed");
        }

        let event_id = match self.outbox.append(event_type, campaign_id, payload.clone()).await {
            Ok(id) => id,
            Err(e) => {
                error!(event_type, error = %e, "outbox append failed; delivery not guaranteed");
                return None;
            }
        };

        let policy = options.delivery;
        let key = options
            .job_key
            .unwrap_or_else(|| JobKey::delivery(event_type, event_id));

        let mut job = ScheduledJob::new(key, event_type, payload)
            .with_campaign(campaign_id)
            .with_priority(policy.priority)
            .with_retry_policy(RetryPolicy::exponential(
                policy.max_attempts,
                policy.backoff_base,
            ));
        if let Some(delay) = policy.delay {
            job = job.delayed(delay);
        }

        match self.jobs.enqueue(job).await {
            Ok(EnqueueOutcome::Queued) => {
                debug!(event_type, %event_id, "delivery job enqueued");
            }
            Ok(EnqueueOutcome::Duplicate) => {
                debug!(event_type, %event_id, "delivery job already armed; suppressed");
            }
            Err(e) => {
                // The outbox row exists, so delivery is recoverable; report
                // the id and let monitoring surface the gap.
                error!(event_type, %event_id, error = %e, "delivery enqueue failed");
            }
        }

        Some(event_id)
    }

    /// Publish a typed lifecycle event.
    pub async fn publish_event<E>(
        &self,
        campaign_id: Option<CampaignId>,
        event: &E,
        options: PublishOptions,
    ) -> Option<EventId>
    where
        E: DomainEvent + Serialize,
    {
        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                error!(event_type = event.event_type(), error = %e, "event serialization failed");
                return None;
            }
        };
        self.publish(event.event_type(), campaign_id, payload, options)
            .await
    }
}
