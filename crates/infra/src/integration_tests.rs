//! End-to-end queue behavior against scripted collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use dossier_analysis::{
    build_registry, EnrichmentProvider, ProviderError, ProviderResponse, RecordKind,
    ResponseBudget,
};
use dossier_core::{AccountId, AnalysisRequest, JobType, ProfileId};
use dossier_events::JobEventHub;
use dossier_events::JobEvent;

use crate::jobs::{InMemoryJobStore, JobQueue, JobSnapshot, JobState, QueueConfig, RetryPolicy};
use crate::memory::InMemoryRecordStore;

type TestQueue = Arc<JobQueue<Arc<InMemoryJobStore>>>;

/// Provider that replays a scripted sequence of outcomes, repeating the last.
struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    calls: Mutex<usize>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new(
        responses: impl IntoIterator<Item = Result<ProviderResponse, ProviderError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(0),
            delay: None,
        })
    }

    fn always(text: &str) -> Arc<Self> {
        Self::new([Ok(ProviderResponse::text_only(text))])
    }

    fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                [Ok(ProviderResponse::text_only(text))].into_iter().collect(),
            ),
            calls: Mutex::new(0),
            delay: Some(delay),
        })
    }

    fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl EnrichmentProvider for ScriptedProvider {
    async fn query(
        &self,
        _instruction: &str,
        _budget: ResponseBudget,
    ) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(ProviderError::Request("script exhausted".into())),
            1 => responses.front().cloned().unwrap(),
            _ => responses.pop_front().unwrap(),
        }
    }
}

fn fast_config() -> QueueConfig {
    QueueConfig::default()
        .with_workers(2)
        .with_poll_interval(Duration::from_millis(5))
        .with_retry_policy(RetryPolicy::exponential(
            3,
            Duration::from_millis(10),
            Duration::from_millis(40),
        ))
}

fn build_queue(
    provider: Arc<ScriptedProvider>,
    config: QueueConfig,
) -> (TestQueue, Arc<InMemoryRecordStore>) {
    let records = InMemoryRecordStore::arc();
    let registry = Arc::new(build_registry(provider, records.clone()));
    let hub = Arc::new(JobEventHub::default());
    let queue = Arc::new(JobQueue::new(
        InMemoryJobStore::arc(),
        registry,
        hub,
        config,
    ));
    (queue, records)
}

fn request(description: &str) -> AnalysisRequest {
    AnalysisRequest::new(AccountId::new(), ProfileId::new(), description)
}

fn profile_response() -> String {
    json!({
        "company_name": "Acme Corp",
        "summary": "Packaging manufacturer",
        "founded_year": 1987,
        "headquarters": "Columbus, OH",
        "employee_count": 1200,
        "website": "https://acme.example",
        "key_products": ["boxes"],
        "leadership": {"ceo": "J. Doe"}
    })
    .to_string()
}

/// Poll status until the job reaches a terminal state.
async fn wait_terminal(queue: &TestQueue, job_id: dossier_core::JobId) -> JobSnapshot {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = queue
            .status(job_id)
            .expect("status query failed")
            .expect("job disappeared before terminal state");
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "job never reached a terminal state"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn valid_submission_completes_and_persists() {
    let provider = ScriptedProvider::always(&profile_response());
    let (queue, records) = build_queue(provider.clone(), fast_config());
    let handle = queue.start();

    let request = request("Acme Corp, Ohio");
    let owner = request.owner_key();
    let job_id = queue.submit(JobType::Profile, request).unwrap();

    let snapshot = wait_terminal(&queue, job_id).await;
    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(snapshot.attempt, 1);
    assert_eq!(
        snapshot.result.as_ref().unwrap()["fields"]["company_name"],
        json!("Acme Corp")
    );
    assert!(snapshot.error.is_none());

    assert_eq!(records.count(owner, RecordKind::CompanyProfile), 1);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(queue.stats().jobs_succeeded, 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn events_arrive_in_order_with_monotonic_progress() {
    let provider = ScriptedProvider::always(&profile_response());
    let (queue, _records) = build_queue(provider, fast_config());

    // Subscribe before the workers start so no event can slip past.
    let job_id = queue.submit(JobType::Profile, request("Acme Corp")).unwrap();
    let mut rx = queue.hub().subscribe(job_id);
    let handle = queue.start();

    let mut percents = Vec::new();
    let terminal = loop {
        match rx.recv().await {
            Ok(JobEvent::Progress { percent, .. }) => percents.push(percent),
            Ok(event) if event.is_terminal() => break event,
            Ok(JobEvent::Queued) => {}
            Ok(_) => {}
            Err(e) => panic!("event stream ended early: {e}"),
        }
    };

    assert!(matches!(terminal, JobEvent::Completed { .. }));
    assert!(!percents.is_empty());
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress must be non-decreasing: {percents:?}"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn transient_failures_retry_then_succeed() {
    let provider = ScriptedProvider::new([
        Err(ProviderError::Request("connection reset".into())),
        Err(ProviderError::Request("connection reset".into())),
        Ok(ProviderResponse::text_only(profile_response())),
    ]);
    let (queue, _records) = build_queue(provider.clone(), fast_config());
    let handle = queue.start();

    let job_id = queue.submit(JobType::Profile, request("Acme Corp")).unwrap();

    let snapshot = wait_terminal(&queue, job_id).await;
    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.attempt, 3);
    assert_eq!(provider.call_count(), 3);
    assert_eq!(queue.stats().attempts_retried, 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn exhausted_attempts_surface_the_last_error() {
    let provider = ScriptedProvider::new([Err(ProviderError::Request(
        "provider unreachable".into(),
    ))]);
    let (queue, _records) = build_queue(provider.clone(), fast_config());
    let handle = queue.start();

    let job_id = queue.submit(JobType::Profile, request("Acme Corp")).unwrap();

    let snapshot = wait_terminal(&queue, job_id).await;
    assert_eq!(snapshot.state, JobState::Failed);
    assert_eq!(snapshot.attempt, 3);
    assert!(snapshot
        .error
        .as_deref()
        .unwrap()
        .contains("provider unreachable"));
    assert_eq!(provider.call_count(), 3);

    handle.shutdown().await;
}

#[tokio::test]
async fn truncated_industry_response_salvages_the_minimum() {
    // industry_name and market_size close before the cutoff; growth_rate is
    // cut mid-number and the rest never arrived.
    let truncated =
        r#"{"industry_name": "Packaging", "market_size": 88_000_000_000, "growth_rate": 4."#;
    let provider = ScriptedProvider::always(truncated);
    let (queue, records) = build_queue(provider, fast_config());
    let handle = queue.start();

    let request = request("Acme Corp, packaging");
    let owner = request.owner_key();
    let job_id = queue.submit(JobType::Industry, request).unwrap();

    let snapshot = wait_terminal(&queue, job_id).await;
    assert_eq!(snapshot.state, JobState::Completed);
    let fields = &snapshot.result.as_ref().unwrap()["fields"];
    assert_eq!(fields["industry_name"], json!("Packaging"));
    assert_eq!(fields["market_size"], json!(88_000_000_000u64));
    assert_eq!(fields["growth_rate"], serde_json::Value::Null);
    assert_eq!(records.count(owner, RecordKind::IndustryAnalysis), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn salvage_below_minimum_is_retried_until_exhausted() {
    // Only industry_name survives; market_size is part of the minimum.
    let truncated = r#"{"industry_name": "Packaging", "market_size": 88_00"#;
    let provider = ScriptedProvider::always(truncated);
    let (queue, records) = build_queue(provider.clone(), fast_config());
    let handle = queue.start();

    let request = request("Acme Corp, packaging");
    let owner = request.owner_key();
    let job_id = queue.submit(JobType::Industry, request).unwrap();

    let snapshot = wait_terminal(&queue, job_id).await;
    assert_eq!(snapshot.state, JobState::Failed);
    assert_eq!(provider.call_count(), 3);
    assert_eq!(records.count(owner, RecordKind::IndustryAnalysis), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn force_regenerate_leaves_exactly_one_singleton_record() {
    let provider = ScriptedProvider::always(&profile_response());
    let (queue, records) = build_queue(provider, fast_config());
    let handle = queue.start();

    let base = request("Acme Corp");
    let owner = base.owner_key();

    let first = queue
        .submit(JobType::Profile, base.clone().force_regenerate())
        .unwrap();
    wait_terminal(&queue, first).await;

    let second = queue
        .submit(JobType::Profile, base.force_regenerate())
        .unwrap();
    wait_terminal(&queue, second).await;

    assert_eq!(records.count(owner, RecordKind::CompanyProfile), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn force_regenerate_keeps_only_the_latest_competitor_batch() {
    let big_batch = json!({
        "competitors": [
            {"name": "BoxCo"}, {"name": "PakMax"}, {"name": "CartonWorks"}
        ],
        "market_overview": "crowded"
    })
    .to_string();
    let small_batch = json!({
        "competitors": [{"name": "BoxCo"}],
        "market_overview": "consolidating"
    })
    .to_string();
    let provider = ScriptedProvider::new([
        Ok(ProviderResponse::text_only(big_batch)),
        Ok(ProviderResponse::text_only(small_batch)),
    ]);
    let (queue, records) = build_queue(provider, fast_config());
    let handle = queue.start();

    let base = request("Acme Corp");
    let owner = base.owner_key();

    let first = queue
        .submit(JobType::Competitors, base.clone().force_regenerate())
        .unwrap();
    wait_terminal(&queue, first).await;
    assert_eq!(records.count(owner, RecordKind::Competitor), 3);

    let second = queue
        .submit(JobType::Competitors, base.force_regenerate())
        .unwrap();
    wait_terminal(&queue, second).await;
    assert_eq!(records.count(owner, RecordKind::Competitor), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn stuck_attempts_time_out_and_count_as_transient() {
    let provider = ScriptedProvider::slow(&profile_response(), Duration::from_secs(30));
    let config = fast_config().with_attempt_timeout(Duration::from_millis(25));
    let (queue, _records) = build_queue(provider.clone(), config);
    let handle = queue.start();

    let job_id = queue.submit(JobType::Profile, request("Acme Corp")).unwrap();

    let snapshot = wait_terminal(&queue, job_id).await;
    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(snapshot.attempt, 3);

    handle.shutdown().await;
}

#[tokio::test]
async fn cleanup_sweep_respects_per_state_retention() {
    let provider = ScriptedProvider::always(&profile_response());
    let config = fast_config().with_retention(Duration::ZERO, Duration::from_secs(3600));
    let (queue, _records) = build_queue(provider, config);
    let handle = queue.start();

    let job_id = queue.submit(JobType::Profile, request("Acme Corp")).unwrap();
    wait_terminal(&queue, job_id).await;

    let removed = queue.run_cleanup().unwrap();
    assert_eq!(removed, 1);
    assert!(queue.status(job_id).unwrap().is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_all_workers() {
    let provider = ScriptedProvider::always(&profile_response());
    let (queue, _records) = build_queue(provider, fast_config());
    let handle = queue.start();

    // Must resolve promptly even with idle workers.
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown did not complete in time");
}
