//! End-to-end tests for the orchestration engine, wired fully in memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;

use promoforge_campaign::events::{CampaignErrorRaised, names};
use promoforge_campaign::{
    Campaign, CampaignStatus, EngagementReport, FundingType, Owner,
};
use promoforge_core::{CampaignId, ContractId, OrchestratorConfig, UserId};
use promoforge_events::{
    DEAD_LETTER_PREFIX, DeadLetterPayload, EventEnvelope, InMemoryEventBus, dead_letter_type,
    original_type,
};
use serde_json::json;

use crate::lifecycle::{CampaignLifecycle, register_lifecycle_handlers};
use crate::monitoring::MonitoringService;
use crate::outbox::{InMemoryOutboxStore, OutboxStore};
use crate::ports::{BalanceService, LedgerService, ServiceError, SocialPostService};
use crate::publisher::{DeliveryPolicy, EventPublisher, PublishOptions};
use crate::recovery::DeadLetterRecovery;
use crate::repository::{
    CampaignLogStore, CampaignRepository, InMemoryCampaignLogStore, InMemoryCampaignRepository,
};
use crate::scheduler::{
    HandlerError, InMemoryJobStore, JobHandler, JobStore, QueueWorker, ScheduledJob, WorkerConfig,
};
use crate::status_cache::{InMemoryStatusCache, StatusCache};

// ─────────────────────────────────────────────────────────────────────────────
// Fakes for the external collaborators
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeSocial {
    posts: AtomicU32,
    fail_engagement: std::sync::RwLock<Option<ServiceError>>,
    engagement: std::sync::RwLock<EngagementReport>,
}

#[async_trait::async_trait]
impl SocialPostService for FakeSocial {
    async fn publish_first(
        &self,
        campaign: &Campaign,
        _owner: &Owner,
    ) -> Result<String, ServiceError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(format!("post-{}-1", campaign.id))
    }

    async fn publish_second(
        &self,
        campaign: &Campaign,
        _owner: &Owner,
        first_post_id: &str,
    ) -> Result<String, ServiceError> {
        assert!(!first_post_id.is_empty());
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(format!("post-{}-2", campaign.id))
    }

    async fn collect_engagement(
        &self,
        _campaign: &Campaign,
    ) -> Result<EngagementReport, ServiceError> {
        if let Some(err) = self.fail_engagement.read().unwrap().clone() {
            return Err(err);
        }
        Ok(*self.engagement.read().unwrap())
    }
}

#[derive(Default)]
struct FakeLedger {
    settlements: std::sync::Mutex<Vec<(CampaignId, u64, String)>>,
}

#[async_trait::async_trait]
impl LedgerService for FakeLedger {
    async fn settle(
        &self,
        campaign_id: CampaignId,
        amount: u64,
        owner_wallet: &str,
    ) -> Result<String, ServiceError> {
        self.settlements
            .lock()
            .unwrap()
            .push((campaign_id, amount, owner_wallet.to_string()));
        Ok(format!("0xreceipt-{campaign_id}"))
    }
}

#[derive(Default)]
struct FakeBalances {
    debits: std::sync::Mutex<Vec<(UserId, u64)>>,
}

#[async_trait::async_trait]
impl BalanceService for FakeBalances {
    async fn decrement(&self, user_id: UserId, amount: u64) -> Result<u64, ServiceError> {
        self.debits.lock().unwrap().push((user_id, amount));
        Ok(0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

struct Harness {
    repo: Arc<InMemoryCampaignRepository>,
    logs: Arc<InMemoryCampaignLogStore>,
    outbox: Arc<InMemoryOutboxStore>,
    jobs: Arc<InMemoryJobStore>,
    cache: Arc<InMemoryStatusCache>,
    social: Arc<FakeSocial>,
    ledger: Arc<FakeLedger>,
    balances: Arc<FakeBalances>,
    publisher: Arc<EventPublisher>,
    lifecycle: Arc<CampaignLifecycle>,
    recovery: DeadLetterRecovery,
    monitoring: MonitoringService,
    worker: QueueWorker,
}

impl Harness {
    fn new(config: OrchestratorConfig) -> Self {
        let repo = Arc::new(InMemoryCampaignRepository::new());
        let logs = Arc::new(InMemoryCampaignLogStore::new());
        let outbox = Arc::new(InMemoryOutboxStore::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let cache = Arc::new(InMemoryStatusCache::new());
        let social = Arc::new(FakeSocial::default());
        let ledger = Arc::new(FakeLedger::default());
        let balances = Arc::new(FakeBalances::default());
        let bus: Arc<InMemoryEventBus<EventEnvelope>> = Arc::new(InMemoryEventBus::new());

        let publisher = Arc::new(EventPublisher::new(
            bus,
            outbox.clone() as Arc<dyn OutboxStore>,
            jobs.clone() as Arc<dyn JobStore>,
        ));
        let lifecycle = Arc::new(CampaignLifecycle::new(
            publisher.clone(),
            repo.clone(),
            logs.clone(),
            cache.clone(),
            social.clone(),
            ledger.clone(),
            balances.clone(),
            config.clone(),
        ));
        let recovery = DeadLetterRecovery::new(
            outbox.clone() as Arc<dyn OutboxStore>,
            publisher.clone(),
            repo.clone(),
        );
        let monitoring = MonitoringService::new(
            repo.clone(),
            logs.clone(),
            outbox.clone() as Arc<dyn OutboxStore>,
            jobs.clone() as Arc<dyn JobStore>,
            lifecycle.clone(),
            config,
        );

        let mut worker = QueueWorker::new(
            jobs.clone() as Arc<dyn JobStore>,
            outbox.clone() as Arc<dyn OutboxStore>,
            WorkerConfig::default(),
        );
        register_lifecycle_handlers(&mut worker, lifecycle.clone());

        Self {
            repo,
            logs,
            outbox,
            jobs,
            cache,
            social,
            ledger,
            balances,
            publisher,
            lifecycle,
            recovery,
            monitoring,
            worker,
        }
    }

    /// Immediate-close config so tests never wait for wall-clock time.
    fn immediate() -> Self {
        Self::new(OrchestratorConfig {
            campaign_duration_minutes: 0,
            ..OrchestratorConfig::default()
        })
    }

    fn seed(&self, id: i64, status: CampaignStatus, funding: FundingType) -> CampaignId {
        let campaign_id = CampaignId::new(id);
        let owner_id = UserId::new();
        self.repo.insert(
            Campaign {
                id: campaign_id,
                owner: owner_id,
                contract_id: ContractId::new(format!("0xcontract-{id}")).unwrap(),
                funding,
                status,
                reward_pool: 1_000_000,
                first_post_id: None,
                second_post_id: None,
                close_at: None,
                is_added_to_queue: false,
            },
            Owner {
                id: owner_id,
                handle: format!("owner_{id}"),
                wallet: format!("0xwallet-{id}"),
            },
        );
        campaign_id
    }

    /// Run the worker until the queue is drained. A far-future claim clock
    /// makes delays and backoff irrelevant to the test.
    async fn drain(&self) {
        let forever = Utc::now() + chrono::Duration::days(365);
        let mut guard = 0;
        while self.worker.run_once(forever).await.unwrap() {
            guard += 1;
            assert!(guard < 500, "queue did not drain");
        }
    }

    async fn campaign(&self, id: CampaignId) -> Campaign {
        self.repo.get(id).await.unwrap().unwrap()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_reaches_rewards_distributed() {
    let h = Harness::immediate();
    *h.social.engagement.write().unwrap() = EngagementReport {
        likes: 10,
        reposts: 5,
        replies: 2,
        eligible_participants: 4,
    };
    let id = h.seed(1, CampaignStatus::Approved, FundingType::Escrow);

    h.lifecycle.request_publish(id).await.unwrap().unwrap();
    h.drain().await;

    let campaign = h.campaign(id).await;
    assert_eq!(campaign.status, CampaignStatus::RewardsDistributed);
    assert_eq!(campaign.first_post_id.as_deref(), Some("post-1-1"));
    assert_eq!(campaign.second_post_id.as_deref(), Some("post-1-2"));
    assert!(!campaign.is_added_to_queue);

    // Escrow funding settles on-chain: pool split 4 ways, remainder retained.
    let settlements = h.ledger.settlements.lock().unwrap().clone();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].1, 1_000_000);
    let (outcome, receipt) = h.repo.close_outcome(id).unwrap();
    assert_eq!(outcome.recipients, 4);
    assert_eq!(receipt.as_deref(), Some("0xreceipt-1"));

    // Nothing was parked.
    assert!(
        h.outbox
            .list_by_type_prefix(DEAD_LETTER_PREFIX, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn campaign_log_stage_sequence_is_monotonic() {
    let h = Harness::immediate();
    *h.social.engagement.write().unwrap() = EngagementReport {
        eligible_participants: 2,
        ..Default::default()
    };
    let id = h.seed(2, CampaignStatus::Approved, FundingType::Escrow);

    h.lifecycle.request_publish(id).await.unwrap();
    h.drain().await;

    let trail = h.logs.all_for(id).await.unwrap();
    let messages: Vec<&str> = trail.iter().map(|e| e.message.as_str()).collect();

    let expected = [
        "publish requested",
        "first content published",
        "second content published; campaign live",
        "close sequence started",
        "engagement collected",
        "rewards calculated",
        "reward pool settled",
        "rewards distributed",
        "campaign closed",
    ];

    // Every stage appears exactly once, in order, none skipped.
    let positions: Vec<usize> = expected
        .iter()
        .map(|m| {
            let found: Vec<usize> = messages
                .iter()
                .enumerate()
                .filter(|(_, msg)| *msg == m)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(found.len(), 1, "stage '{m}' logged {} times", found.len());
            found[0]
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn direct_funding_debits_balance_instead_of_ledger() {
    let h = Harness::immediate();
    *h.social.engagement.write().unwrap() = EngagementReport {
        eligible_participants: 10,
        ..Default::default()
    };
    let id = h.seed(3, CampaignStatus::Approved, FundingType::Direct);

    h.lifecycle.request_publish(id).await.unwrap();
    h.drain().await;

    assert_eq!(h.campaign(id).await.status, CampaignStatus::RewardsDistributed);
    assert!(h.ledger.settlements.lock().unwrap().is_empty());
    let debits = h.balances.debits.lock().unwrap().clone();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].1, 1_000_000);
}

#[tokio::test]
async fn arming_the_close_job_twice_yields_one_job() {
    // One-hour duration: the close job stays delayed while the publish
    // stages drain with a real clock.
    let h = Harness::new(OrchestratorConfig {
        campaign_duration_minutes: 60,
        ..OrchestratorConfig::default()
    });
    let id = h.seed(4, CampaignStatus::Approved, FundingType::Escrow);

    h.lifecycle.request_publish(id).await.unwrap();
    while h.worker.run_once(Utc::now()).await.unwrap() {}

    let campaign = h.campaign(id).await;
    assert_eq!(campaign.status, CampaignStatus::Running);
    assert!(campaign.is_added_to_queue);
    assert_eq!(h.jobs.pending_for_campaign(id).await.unwrap().len(), 1);

    // Re-arm with the same campaign/close-time: duplicate-suppressed.
    h.lifecycle.arm_close_job(&campaign).await.unwrap();
    h.lifecycle.arm_close_job(&campaign).await.unwrap();
    assert_eq!(h.jobs.pending_for_campaign(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn exhausted_delivery_parks_exactly_one_dead_letter() {
    // publish(eventType = "X", {a: 1}) where delivery always fails and
    // max_retries = 0 → exactly one DEAD_LETTER_X row wrapping the payload.
    struct AlwaysFails;

    #[async_trait::async_trait]
    impl JobHandler for AlwaysFails {
        async fn handle(&self, _job: &ScheduledJob) -> Result<(), HandlerError> {
            Err(HandlerError::retryable("delivery failed"))
        }
    }

    let mut h = Harness::immediate();
    h.worker.register_handler("X", Arc::new(AlwaysFails));

    let options = PublishOptions::with_delivery(DeliveryPolicy::default().with_max_attempts(0));
    h.publisher
        .publish("X", Some(CampaignId::new(9)), json!({"a": 1}), options)
        .await
        .unwrap();
    h.drain().await;

    let parked = h
        .outbox
        .list_by_type_prefix(DEAD_LETTER_PREFIX, 10)
        .await
        .unwrap();
    assert_eq!(parked.len(), 1);
    assert_eq!(original_type(&parked[0].event_type), Some("X"));

    let payload: DeadLetterPayload = serde_json::from_value(parked[0].payload.clone()).unwrap();
    assert_eq!(payload.original_payload["a"], 1);
}

#[tokio::test]
async fn non_critical_failure_leaves_status_unchanged() {
    let h = Harness::immediate();
    let id = h.seed(5, CampaignStatus::Running, FundingType::Escrow);

    let event = CampaignErrorRaised {
        campaign_id: id,
        stage: "engagement".to_string(),
        error: "connection reset by peer".to_string(),
        occurred_at: Utc::now(),
    };
    h.publisher
        .publish_event(Some(id), &event, PublishOptions::default())
        .await
        .unwrap();
    h.drain().await;

    let campaign = h.campaign(id).await;
    assert_eq!(campaign.status, CampaignStatus::Running);

    // The failure is still on the audit trail.
    let trail = h.logs.all_for(id).await.unwrap();
    assert!(trail.iter().any(|e| e.message.contains("engagement")));
}

#[tokio::test]
async fn critical_failure_halts_a_running_campaign() {
    let h = Harness::immediate();
    let id = h.seed(6, CampaignStatus::Running, FundingType::Escrow);
    let contract = h.campaign(id).await.contract_id.clone();

    let event = CampaignErrorRaised {
        campaign_id: id,
        stage: "settlement".to_string(),
        error: "contract execution failed: out of gas".to_string(),
        occurred_at: Utc::now(),
    };
    h.publisher
        .publish_event(Some(id), &event, PublishOptions::default())
        .await
        .unwrap();
    h.drain().await;

    let campaign = h.campaign(id).await;
    assert_eq!(campaign.status, CampaignStatus::InternalError);
    assert!(!campaign.is_added_to_queue);
    assert_eq!(h.cache.get(&contract, "internal_error").await, Some(true));
}

#[tokio::test]
async fn critical_failure_outside_running_does_not_halt() {
    let h = Harness::immediate();
    let id = h.seed(7, CampaignStatus::Approved, FundingType::Escrow);

    let event = CampaignErrorRaised {
        campaign_id: id,
        stage: "first_content".to_string(),
        error: "authentication expired".to_string(),
        occurred_at: Utc::now(),
    };
    h.publisher
        .publish_event(Some(id), &event, PublishOptions::default())
        .await
        .unwrap();
    h.drain().await;

    assert_eq!(h.campaign(id).await.status, CampaignStatus::Approved);
}

#[tokio::test]
async fn resume_replays_good_rows_and_reports_bad_ones() {
    let h = Harness::immediate();
    let id = h.seed(8, CampaignStatus::InternalError, FundingType::Escrow);

    // One replayable dead letter...
    let good = DeadLetterPayload::new(
        "campaign.close.cleanup",
        json!({
            "campaign_id": 8,
            "stage": "cleanup",
            "close_at_unix": 0,
            "occurred_at": Utc::now(),
        }),
        "gave up",
    );
    let good_id = h
        .outbox
        .append(
            &dead_letter_type("campaign.close.cleanup"),
            Some(id),
            serde_json::to_value(&good).unwrap(),
        )
        .await
        .unwrap();

    // ...and one with a payload that cannot be replayed.
    let bad_id = h
        .outbox
        .append(
            &dead_letter_type("campaign.close.settlement"),
            Some(id),
            json!({"not": "a dead letter payload"}),
        )
        .await
        .unwrap();

    let summary = h.recovery.resume(id).await.unwrap();
    assert_eq!(summary.retried, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);

    // Only the successfully retried row was deleted.
    assert!(h.outbox.get(good_id).await.unwrap().is_none());
    assert!(h.outbox.get(bad_id).await.unwrap().is_some());

    // The halted campaign was un-parked for the replay.
    assert_eq!(h.campaign(id).await.status, CampaignStatus::Running);
}

#[tokio::test]
async fn retry_event_rejects_non_dead_letter_ids() {
    let h = Harness::immediate();
    let id = h
        .outbox
        .append("campaign.publish.first_content", Some(CampaignId::new(9)), json!({}))
        .await
        .unwrap();

    let err = h.recovery.retry_event(id).await.unwrap_err();
    assert!(matches!(
        err,
        crate::recovery::RecoveryError::NotDeadLetter(_)
    ));
}

#[tokio::test]
async fn stuck_scan_reports_overdue_running_campaigns() {
    let h = Harness::new(OrchestratorConfig::default());
    let id = h.seed(42, CampaignStatus::Running, FundingType::Escrow);

    // Close time passed 40 minutes ago; threshold is 30.
    let close_at = Utc::now() - chrono::Duration::minutes(40);
    h.repo
        .record_second_post(id, "post-42-2", close_at)
        .await
        .unwrap();
    h.repo.record_first_post(id, "post-42-1").await.unwrap();

    let report = h.monitoring.stuck_campaigns(Utc::now()).await.unwrap();
    assert!(report.summary.overdue_close >= 1);
    assert!(report.campaigns.iter().any(|c| c.id == id));
    assert!(report.campaigns[0].overdue_minutes >= 40);

    // Force-processing arms the close job; repeating it does not duplicate.
    let outcome = h.monitoring.process_stuck(Utc::now()).await.unwrap();
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.rearmed, 1);
    h.monitoring.process_stuck(Utc::now()).await.unwrap();
    assert_eq!(h.jobs.pending_for_campaign(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn monitor_report_surfaces_dead_letters_and_resume_flag() {
    let h = Harness::immediate();
    let id = h.seed(10, CampaignStatus::Running, FundingType::Escrow);

    let report = h.monitoring.campaign_monitor(id).await.unwrap().unwrap();
    assert!(!report.health.can_resume);

    h.outbox
        .append(
            &dead_letter_type("campaign.close.engagement"),
            Some(id),
            serde_json::to_value(DeadLetterPayload::new(
                "campaign.close.engagement",
                json!({}),
                "rate limit exceeded",
            ))
            .unwrap(),
        )
        .await
        .unwrap();

    let report = h.monitoring.campaign_monitor(id).await.unwrap().unwrap();
    assert!(report.health.can_resume);
    assert_eq!(report.dead_letters.len(), 1);
    assert!(report.pending_events.iter().all(|e| !e.event_type.starts_with(DEAD_LETTER_PREFIX)));

    assert!(
        h.monitoring
            .campaign_monitor(CampaignId::new(999))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn failing_close_stage_dead_letters_after_retries_then_resumes() {
    let h = Harness::immediate();
    *h.social.engagement.write().unwrap() = EngagementReport {
        eligible_participants: 1,
        ..Default::default()
    };
    *h.social.fail_engagement.write().unwrap() = Some(ServiceError::Unavailable(
        "engagement api down".to_string(),
    ));
    let id = h.seed(11, CampaignStatus::Approved, FundingType::Escrow);

    h.lifecycle.request_publish(id).await.unwrap();
    h.drain().await;

    // The engagement stage exhausted its retries and was parked; the
    // campaign is mid-close, not silently advanced.
    let campaign = h.campaign(id).await;
    assert_eq!(campaign.status, CampaignStatus::RewardDistributionInProgress);
    let parked = h.outbox.dead_letters_for_campaign(id).await.unwrap();
    assert_eq!(parked.len(), 1);
    assert_eq!(
        original_type(&parked[0].event_type),
        Some(names::CLOSE_ENGAGEMENT)
    );

    // Operator fixes the upstream and resumes: the sequence completes.
    *h.social.fail_engagement.write().unwrap() = None;
    let summary = h.recovery.resume(id).await.unwrap();
    assert_eq!(summary.retried, 1);
    assert_eq!(summary.failed, 0);
    h.drain().await;

    assert_eq!(h.campaign(id).await.status, CampaignStatus::RewardsDistributed);
    assert!(h.outbox.dead_letters_for_campaign(id).await.unwrap().is_empty());
}
