//! Failure handling across the store and the generation service

use std::sync::Arc;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dailypress::llm::{ContentGenerator, GenerationError, LlmClient, LlmConfig, LlmProvider};
use dailypress::models::{SiteProfile, SlotStatus, TargetLength, Topic};
use dailypress::orchestrator::{RunRequest, RunTrigger};
use dailypress::storage::{ScheduleRepository, SharedStore};
use dailypress::utils::retry::RetryConfig;

use super::fixtures::{anthropic_envelope, FENCED_POST, PLAIN_PROSE, VALID_POST_JSON};
use crate::common::{date, orchestrator, plant, FailingStore, FakeAdapter, FakeGenerator};

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_store_failure_aborts_remaining_slots() {
    let failing = Arc::new(FailingStore::failing_after(1));
    let store: SharedStore = failing.clone();
    let day = date(2025, 9, 3);
    let a = plant(&store, day, "A", "a", "First topic");
    let b = plant(&store, day, "A", "b", "Second topic");
    let c = plant(&store, day, "A", "c", "Third topic");

    let generator = Arc::new(FakeGenerator::new());
    let adapter = FakeAdapter::ok("A");
    let orch = orchestrator(store.clone(), generator.clone(), &[("A", adapter.clone())]);

    let summary = orch
        .run(RunRequest::full(day, RunTrigger::Nightly))
        .await
        .unwrap();

    assert!(failing.is_broken());
    assert!(summary.aborted.is_some());
    assert_eq!(summary.published, 1);
    assert_eq!(adapter.count(), 1);

    assert_eq!(store.get_slot(&a).unwrap().unwrap().status, SlotStatus::Published);
    // left where the failure caught it; the recovery pass picks it up
    assert_eq!(store.get_slot(&b).unwrap().unwrap().status, SlotStatus::Generating);
    assert_eq!(store.get_slot(&c).unwrap().unwrap().status, SlotStatus::Planned);

    assert!(!orch.tracker().is_active());
    assert_eq!(generator.calls(), 2);
}

// ============================================================================
// Generation service over HTTP
// ============================================================================

fn client_for(server: &MockServer) -> ContentGenerator {
    let config = LlmConfig {
        provider: LlmProvider::Anthropic,
        endpoint: server.uri(),
        model: "test-model".to_string(),
        api_key: Some("test-key".to_string()),
        timeout_secs: 5,
        ..Default::default()
    };
    let client = LlmClient::with_config(config).unwrap();
    ContentGenerator::new(Arc::new(client))
        .with_retry(RetryConfig::immediate_once())
        .with_current_year(2025)
}

async fn generate(generator: &ContentGenerator) -> Result<dailypress::models::ContentArtifact, GenerationError> {
    let topic = Topic::new("Async Rust in production", &["async rust"]);
    let profile = SiteProfile::new("A");
    generator
        .generate(&topic, "tech", TargetLength::Medium, &profile)
        .await
}

#[tokio::test]
async fn test_transient_failure_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_envelope(VALID_POST_JSON)))
        .mount(&server)
        .await;

    let artifact = generate(&client_for(&server)).await.unwrap();
    assert!(artifact.title.starts_with("Async Rust in production"));
    assert_eq!(artifact.sections.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_persistent_transient_failure_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = generate(&client_for(&server)).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_auth_failure_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let err = generate(&client_for(&server)).await.unwrap_err();
    assert!(matches!(err, GenerationError::Rejected { status: 401, .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fenced_output_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_envelope(FENCED_POST)))
        .mount(&server)
        .await;

    let artifact = generate(&client_for(&server)).await.unwrap();
    assert!(artifact.title.starts_with("Async Rust in production"));
    assert_eq!(artifact.sections[0].heading, "Picking a runtime");
    assert!(artifact.conclusion.contains("Measure before tuning"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_prose_output_escalates_then_synthesizes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_envelope(PLAIN_PROSE)))
        .mount(&server)
        .await;

    let artifact = generate(&client_for(&server)).await.unwrap();
    assert!(!artifact.title.is_empty());
    assert!(!artifact.sections.is_empty());
    // first prompt plus exactly one strict re-prompt
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
