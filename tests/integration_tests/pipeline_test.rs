//! Publish pipeline integration tests
//!
//! Runs the orchestrator over in-memory and SQLite stores with fake
//! generator and platform adapters.

use std::sync::Arc;
use std::time::Duration;

use dailypress::models::{AttemptStatus, AttemptType, SlotKey, SlotStatus, SlotUpdate};
use dailypress::orchestrator::{OrchestratorError, RunRequest, RunTrigger};
use dailypress::storage::{
    ArtifactRepository, AttemptRepository, MemoryStore, ScheduleRepository, SharedStore,
    SqliteStore,
};
use tempfile::TempDir;
use tokio_test::assert_ok;

use crate::common::{date, orchestrator, plant, FakeAdapter, FakeGenerator};

fn memory() -> SharedStore {
    Arc::new(MemoryStore::new())
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_planned_slot_is_published_once() {
    let dir = TempDir::new().unwrap();
    let store: SharedStore = Arc::new(SqliteStore::new(dir.path().join("schedule.db")).unwrap());

    // week 2025-09-01, day 1
    let day = date(2025, 9, 2);
    let key = plant(&store, day, "A", "tech", "Rust error handling");
    assert_eq!(key.week_start, date(2025, 9, 1));
    assert_eq!(key.day_of_week, 1);

    let adapter = FakeAdapter::ok("A");
    let orch = orchestrator(store.clone(), Arc::new(FakeGenerator::new()), &[("A", adapter.clone())]);

    let summary = assert_ok!(orch.run(RunRequest::full(day, RunTrigger::Nightly)).await);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.aborted.is_none());

    let slot = store.get_slot(&key).unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Published);
    assert_eq!(slot.published_url.as_deref(), Some("https://A.test/posts/1"));

    let content_id = slot.generated_content_id.unwrap();
    let attempts = store.attempts_for_content(content_id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Success);
    assert_eq!(attempts[0].attempt_type, AttemptType::Auto);

    let artifact = store.get_artifact(content_id).unwrap().unwrap();
    assert!(artifact.title.starts_with("Rust error handling"));
    assert_eq!(adapter.count(), 1);
}

#[tokio::test]
async fn test_sites_follow_configured_order() {
    let store = memory();
    let day = date(2025, 9, 3);
    plant(&store, day, "alpha", "news", "Alpha topic");
    plant(&store, day, "beta", "news", "Beta topic");
    plant(&store, day, "beta", "guides", "Beta guide");

    let orch = orchestrator(
        store,
        Arc::new(FakeGenerator::new()),
        &[("beta", FakeAdapter::ok("beta")), ("alpha", FakeAdapter::ok("alpha"))],
    );

    let summary = orch.run(RunRequest::full(day, RunTrigger::Manual)).await.unwrap();
    let order: Vec<(&str, &str)> = summary
        .results
        .iter()
        .map(|r| (r.key.site.as_str(), r.key.category.as_str()))
        .collect();
    assert_eq!(order, vec![("beta", "guides"), ("beta", "news"), ("alpha", "news")]);
}

#[tokio::test]
async fn test_restricted_run_touches_only_listed_slots() {
    let store = memory();
    let day = date(2025, 9, 3);
    let keep = plant(&store, day, "A", "tech", "Kept topic");
    let other = plant(&store, day, "A", "life", "Other topic");

    let orch = orchestrator(store.clone(), Arc::new(FakeGenerator::new()), &[("A", FakeAdapter::ok("A"))]);
    let summary = orch
        .run(RunRequest::restricted(day, RunTrigger::Manual, vec![keep.clone()]))
        .await
        .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.get_slot(&other).unwrap().unwrap().status, SlotStatus::Planned);

    let attempts = store.recent_attempts(Some("A"), 10).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_type, AttemptType::Manual);
}

#[tokio::test]
async fn test_artifact_exported_as_markdown() {
    let dir = TempDir::new().unwrap();
    let store = memory();
    let day = date(2025, 9, 4);
    let key = plant(&store, day, "A", "tech", "Markdown export");

    let orch = Arc::try_unwrap(orchestrator(
        store.clone(),
        Arc::new(FakeGenerator::new()),
        &[("A", FakeAdapter::ok("A"))],
    ))
    .ok()
    .unwrap()
    .with_artifact_dir(dir.path())
    .unwrap();

    orch.run(RunRequest::full(day, RunTrigger::Nightly)).await.unwrap();

    let slot = store.get_slot(&key).unwrap().unwrap();
    let artifact = store
        .get_artifact(slot.generated_content_id.unwrap())
        .unwrap()
        .unwrap();
    let path = artifact.file_reference.expect("file reference set");
    let markdown = std::fs::read_to_string(&path).unwrap();
    assert!(markdown.contains("Markdown export"));
}

// ============================================================================
// Slot isolation
// ============================================================================

#[tokio::test]
async fn test_generation_failure_does_not_abort_siblings() {
    let store = memory();
    let day = date(2025, 9, 5);
    let broken = plant(&store, day, "A", "a_first", "Broken topic");
    let fine = plant(&store, day, "A", "b_second", "Fine topic");

    let generator = Arc::new(FakeGenerator::new().failing_on("Broken"));
    let orch = orchestrator(store.clone(), generator, &[("A", FakeAdapter::ok("A"))]);

    let summary = orch.run(RunRequest::full(day, RunTrigger::Nightly)).await.unwrap();
    assert_eq!((summary.published, summary.failed), (1, 1));

    let failed = store.get_slot(&broken).unwrap().unwrap();
    assert_eq!(failed.status, SlotStatus::Failed);
    assert!(failed.last_error.unwrap().contains("refused"));
    assert!(failed.generated_content_id.is_none());

    assert_eq!(store.get_slot(&fine).unwrap().unwrap().status, SlotStatus::Published);

    let attempts = store.recent_attempts(Some("A"), 10).unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts.iter().filter(|a| a.status == AttemptStatus::Failed).count(),
        1
    );
}

#[tokio::test]
async fn test_platform_rejection_keeps_artifact() {
    let store = memory();
    let day = date(2025, 9, 5);
    let key = plant(&store, day, "A", "tech", "Rejected post");

    let orch = orchestrator(
        store.clone(),
        Arc::new(FakeGenerator::new()),
        &[("A", FakeAdapter::rejecting("A", "401 invalid application password"))],
    );
    let summary = orch.run(RunRequest::full(day, RunTrigger::Nightly)).await.unwrap();
    assert_eq!(summary.failed, 1);

    let slot = store.get_slot(&key).unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Failed);
    assert_eq!(slot.last_error.as_deref(), Some("401 invalid application password"));

    let content_id = slot.generated_content_id.expect("artifact kept");
    let attempts = store.attempts_for_content(content_id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
}

#[tokio::test]
async fn test_unconfigured_site_is_skipped() {
    let store = memory();
    let day = date(2025, 9, 5);
    let key = plant(&store, day, "A", "tech", "Configured site");
    let stray = plant(&store, day, "ghost", "tech", "Unknown site");

    let orch = orchestrator(store.clone(), Arc::new(FakeGenerator::new()), &[("A", FakeAdapter::ok("A"))]);
    let summary = orch.run(RunRequest::full(day, RunTrigger::Nightly)).await.unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.get_slot(&key).unwrap().unwrap().status, SlotStatus::Published);
    assert_eq!(store.get_slot(&stray).unwrap().unwrap().status, SlotStatus::Planned);
}

#[tokio::test]
async fn test_failed_slot_is_retried_by_next_run() {
    let store = memory();
    let day = date(2025, 9, 6);
    let key = plant(&store, day, "A", "tech", "Second chance");
    store
        .mark_status(&key, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();
    store
        .mark_status(&key, SlotStatus::Failed, SlotUpdate::failed(None, "timeout"))
        .unwrap();

    let orch = orchestrator(store.clone(), Arc::new(FakeGenerator::new()), &[("A", FakeAdapter::ok("A"))]);
    orch.run(RunRequest::full(day, RunTrigger::Manual)).await.unwrap();

    let slot = store.get_slot(&key).unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Published);
    assert!(slot.last_error.is_none());
}

#[tokio::test]
async fn test_published_slot_is_not_republished() {
    let store = memory();
    let day = date(2025, 9, 6);
    plant(&store, day, "A", "tech", "Only once");

    let adapter = FakeAdapter::ok("A");
    let orch = orchestrator(store, Arc::new(FakeGenerator::new()), &[("A", adapter.clone())]);
    orch.run(RunRequest::full(day, RunTrigger::Nightly)).await.unwrap();
    let second = orch.run(RunRequest::full(day, RunTrigger::Manual)).await.unwrap();

    assert_eq!(second.published, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(adapter.count(), 1);
}

// ============================================================================
// Single-run guard and progress
// ============================================================================

#[tokio::test]
async fn test_second_run_rejected_without_mutation() {
    let store = memory();
    let day = date(2025, 9, 2);
    let keys: Vec<SlotKey> = ["a", "b"]
        .iter()
        .map(|c| plant(&store, day, "A", c, &format!("Topic {c}")))
        .collect();

    let orch = orchestrator(store.clone(), Arc::new(FakeGenerator::new()), &[("A", FakeAdapter::ok("A"))]);
    let guard = orch.tracker().try_begin(RunTrigger::Nightly).unwrap();
    let before = orch.tracker().snapshot();

    let err = orch
        .run(RunRequest::full(day, RunTrigger::Manual))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::RunInProgress));

    for key in &keys {
        assert_eq!(store.get_slot(key).unwrap().unwrap().status, SlotStatus::Planned);
    }
    assert!(store.recent_attempts(None, 10).unwrap().is_empty());
    assert_eq!(orch.tracker().snapshot(), before);

    drop(guard);
    let summary = orch.run(RunRequest::full(day, RunTrigger::Manual)).await.unwrap();
    assert_eq!(summary.published, 2);
}

#[tokio::test]
async fn test_concurrent_runs_only_one_proceeds() {
    let store = memory();
    let day = date(2025, 9, 2);
    plant(&store, day, "A", "tech", "Slow topic");

    let generator = Arc::new(FakeGenerator::new().with_delay(Duration::from_millis(50)));
    let orch = orchestrator(store, generator.clone(), &[("A", FakeAdapter::ok("A"))]);

    let runs = (0..4).map(|_| orch.run(RunRequest::full(day, RunTrigger::Manual)));
    let results = futures::future::join_all(runs).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(OrchestratorError::RunInProgress)))
        .count();
    assert_eq!((accepted, rejected), (1, 3));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_progress_snapshot_after_background_run() {
    let store = memory();
    let day = date(2025, 9, 2);
    plant(&store, day, "A", "tech", "Tracked topic");
    plant(&store, day, "A", "life", "Tracked topic two");

    let orch = orchestrator(store, Arc::new(FakeGenerator::new()), &[("A", FakeAdapter::ok("A"))]);
    let mut updates = orch.tracker().subscribe();

    let run_id = orch
        .try_start(RunRequest::full(day, RunTrigger::Manual))
        .unwrap();
    assert!(orch.tracker().is_active());
    assert!(matches!(
        orch.try_start(RunRequest::full(day, RunTrigger::Manual)),
        Err(OrchestratorError::RunInProgress)
    ));

    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            updates.changed().await.unwrap();
            let state = updates.borrow_and_update().clone();
            if !state.in_progress && state.finished_at.is_some() {
                return state;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(finished.run_id, Some(run_id));
    assert_eq!(finished.progress_percent, 100);
    assert_eq!(finished.results.len(), 2);
    assert_eq!(finished.processed_slots, 2);
    assert!(!orch.tracker().is_active());

    orch.tracker().reset().unwrap();
    assert!(orch.tracker().snapshot().results.is_empty());
}
