//! Infrastructure wiring for the API process.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use promoforge_campaign::{Campaign, EngagementReport, Owner};
use promoforge_core::{CampaignId, OrchestratorConfig, UserId};
use promoforge_events::{EventBus, EventEnvelope, InMemoryEventBus};
use promoforge_infra::lifecycle::{CampaignLifecycle, register_lifecycle_handlers};
use promoforge_infra::monitoring::MonitoringService;
use promoforge_infra::outbox::{InMemoryOutboxStore, OutboxStore};
use promoforge_infra::ports::{BalanceService, LedgerService, ServiceError, SocialPostService};
use promoforge_infra::publisher::EventPublisher;
use promoforge_infra::recovery::DeadLetterRecovery;
use promoforge_infra::repository::{
    CampaignLogStore, CampaignRepository, InMemoryCampaignLogStore, InMemoryCampaignRepository,
};
use promoforge_infra::scheduler::{InMemoryJobStore, JobStore, QueueWorker, WorkerConfig, WorkerHandle};
use promoforge_infra::status_cache::{InMemoryStatusCache, StatusCache};

/// Dev stand-in for the social API client: fabricates post ids and empty
/// engagement. The production client is provided by the platform gateway.
#[derive(Debug, Default)]
struct DevSocialPostService;

#[async_trait::async_trait]
impl SocialPostService for DevSocialPostService {
    async fn publish_first(
        &self,
        campaign: &Campaign,
        owner: &Owner,
    ) -> Result<String, ServiceError> {
        info!(campaign_id = %campaign.id, handle = %owner.handle, "dev: first post");
        Ok(format!("dev-post-{}", Uuid::now_v7()))
    }

    async fn publish_second(
        &self,
        campaign: &Campaign,
        owner: &Owner,
        _first_post_id: &str,
    ) -> Result<String, ServiceError> {
        info!(campaign_id = %campaign.id, handle = %owner.handle, "dev: second post");
        Ok(format!("dev-post-{}", Uuid::now_v7()))
    }

    async fn collect_engagement(
        &self,
        _campaign: &Campaign,
    ) -> Result<EngagementReport, ServiceError> {
        Ok(EngagementReport::default())
    }
}

/// Dev stand-in for the settlement ledger.
#[derive(Debug, Default)]
struct DevLedgerService;

#[async_trait::async_trait]
impl LedgerService for DevLedgerService {
    async fn settle(
        &self,
        campaign_id: CampaignId,
        amount: u64,
        _owner_wallet: &str,
    ) -> Result<String, ServiceError> {
        info!(%campaign_id, amount, "dev: settlement");
        Ok(format!("dev-receipt-{}", Uuid::now_v7()))
    }
}

/// Dev stand-in for the balance service.
#[derive(Debug, Default)]
struct DevBalanceService;

#[async_trait::async_trait]
impl BalanceService for DevBalanceService {
    async fn decrement(&self, user_id: UserId, amount: u64) -> Result<u64, ServiceError> {
        info!(%user_id, amount, "dev: balance debit");
        Ok(0)
    }
}

/// Shared service container injected into every handler.
pub struct AppServices {
    pub lifecycle: Arc<CampaignLifecycle>,
    pub monitoring: MonitoringService,
    pub recovery: DeadLetterRecovery,
    /// Live event feed for the SSE monitoring stream (lossy; no
    /// backpressure on the engine).
    pub realtime_tx: tokio::sync::broadcast::Sender<EventEnvelope>,
    /// Keeps the background worker alive for the process lifetime.
    _worker: WorkerHandle,
}

/// In-memory wiring (dev/test). Persistent backends (Postgres outbox, Redis
/// status cache) slot in behind the same traits.
pub async fn build_services() -> AppServices {
    let config = OrchestratorConfig::default();

    let repo: Arc<InMemoryCampaignRepository> = Arc::new(InMemoryCampaignRepository::new());
    let logs: Arc<InMemoryCampaignLogStore> = Arc::new(InMemoryCampaignLogStore::new());
    let outbox: Arc<InMemoryOutboxStore> = Arc::new(InMemoryOutboxStore::new());
    let jobs: Arc<InMemoryJobStore> = Arc::new(InMemoryJobStore::new());
    let cache: Arc<InMemoryStatusCache> = Arc::new(InMemoryStatusCache::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope>> = Arc::new(InMemoryEventBus::new());

    // Bridge the synchronous bus into an async broadcast for SSE consumers.
    let (realtime_tx, _) = tokio::sync::broadcast::channel::<EventEnvelope>(256);
    let bus_subscription = bus.subscribe();
    let forward_tx = realtime_tx.clone();
    std::thread::Builder::new()
        .name("bus-forwarder".to_string())
        .spawn(move || {
            while let Ok(envelope) = bus_subscription.recv() {
                let _ = forward_tx.send(envelope);
            }
        })
        .expect("failed to spawn bus forwarder thread");

    let publisher = Arc::new(EventPublisher::new(
        bus,
        outbox.clone() as Arc<dyn OutboxStore>,
        jobs.clone() as Arc<dyn JobStore>,
    ));

    let lifecycle = Arc::new(CampaignLifecycle::new(
        publisher.clone(),
        repo.clone() as Arc<dyn CampaignRepository>,
        logs.clone() as Arc<dyn CampaignLogStore>,
        cache.clone() as Arc<dyn StatusCache>,
        Arc::new(DevSocialPostService),
        Arc::new(DevLedgerService),
        Arc::new(DevBalanceService),
        config.clone(),
    ));

    let recovery = DeadLetterRecovery::new(
        outbox.clone() as Arc<dyn OutboxStore>,
        publisher.clone(),
        repo.clone() as Arc<dyn CampaignRepository>,
    );

    let monitoring = MonitoringService::new(
        repo.clone() as Arc<dyn CampaignRepository>,
        logs.clone() as Arc<dyn CampaignLogStore>,
        outbox.clone() as Arc<dyn OutboxStore>,
        jobs.clone() as Arc<dyn JobStore>,
        lifecycle.clone(),
        config.clone(),
    );

    let mut worker = QueueWorker::new(
        jobs as Arc<dyn JobStore>,
        outbox as Arc<dyn OutboxStore>,
        WorkerConfig {
            poll_interval: config.worker_poll_interval(),
            retention: promoforge_infra::scheduler::RetentionPolicy {
                retain_completed: config.retain_completed_jobs,
                retain_failed: config.retain_failed_jobs,
            },
            ..WorkerConfig::default()
        },
    );
    register_lifecycle_handlers(&mut worker, lifecycle.clone());
    let worker = worker.spawn();

    AppServices {
        lifecycle,
        monitoring,
        recovery,
        realtime_tx,
        _worker: worker,
    }
}
