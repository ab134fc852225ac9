//! Recovery pass integration tests

use std::sync::Arc;
use std::time::Duration;

use dailypress::models::{SlotStatus, SlotUpdate};
use dailypress::orchestrator::{OrchestratorError, RunRequest, RunTrigger};
use dailypress::scheduler::{RecoveryPass, STALLED_ERROR};
use dailypress::storage::{AttemptRepository, MemoryStore, ScheduleRepository, SharedStore};

use crate::common::{date, orchestrator, plant, FakeAdapter, FakeGenerator};

#[tokio::test]
async fn test_stalled_slot_is_reprocessed_exactly_once() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let day = date(2025, 9, 2);
    let stuck = plant(&store, day, "A", "tech", "Stuck topic");
    store
        .mark_status(&stuck, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();

    let generator = Arc::new(FakeGenerator::new());
    let adapter = FakeAdapter::ok("A");
    let orch = orchestrator(store.clone(), generator.clone(), &[("A", adapter.clone())]);
    let pass = RecoveryPass::new(orch);

    let report = pass.run(day).await.unwrap();
    assert_eq!(report.reclassified, vec![stuck.clone()]);

    let summary = report.summary.expect("recovery run");
    assert_eq!(summary.trigger, RunTrigger::Recovery);
    assert_eq!(summary.published, 1);
    assert_eq!(generator.calls(), 1);
    assert_eq!(adapter.count(), 1);

    let slot = store.get_slot(&stuck).unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Published);

    // the reclassification itself is not a publish attempt
    let attempts = store.recent_attempts(Some("A"), 10).unwrap();
    assert_eq!(attempts.len(), 1);
}

#[tokio::test]
async fn test_stalled_slot_that_fails_again_ends_failed() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let day = date(2025, 9, 2);
    let stuck = plant(&store, day, "A", "tech", "Cursed topic");
    store
        .mark_status(&stuck, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();

    let generator = Arc::new(FakeGenerator::new().failing_on("Cursed"));
    let orch = orchestrator(store.clone(), generator.clone(), &[("A", FakeAdapter::ok("A"))]);
    let pass = RecoveryPass::new(orch);

    let report = pass.run(day).await.unwrap();
    assert_eq!(report.summary.unwrap().failed, 1);
    assert_eq!(generator.calls(), 1);

    let slot = store.get_slot(&stuck).unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Failed);
    assert_ne!(slot.last_error.as_deref(), Some(STALLED_ERROR));
}

#[tokio::test]
async fn test_just_claimed_slot_is_still_recovered() {
    // a slot that went `generating` moments ago belongs to no live run once
    // the pass holds the guard
    let store: SharedStore = Arc::new(MemoryStore::new());
    let day = date(2025, 9, 2);
    let fresh = plant(&store, day, "A", "tech", "Fresh topic");
    store
        .mark_status(&fresh, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();
    let failed = plant(&store, day, "A", "life", "Failed topic");
    store
        .mark_status(&failed, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();
    store
        .mark_status(&failed, SlotStatus::Failed, SlotUpdate::failed(None, "timeout"))
        .unwrap();

    let generator = Arc::new(FakeGenerator::new());
    let orch = orchestrator(store.clone(), generator.clone(), &[("A", FakeAdapter::ok("A"))]);
    let report = RecoveryPass::new(orch).run(day).await.unwrap();

    assert_eq!(report.reclassified, vec![fresh.clone()]);
    let summary = report.summary.unwrap();
    assert_eq!(summary.published, 2);
    assert_eq!(generator.calls(), 2);
    assert_eq!(store.get_slot(&fresh).unwrap().unwrap().status, SlotStatus::Published);
    assert_eq!(store.get_slot(&failed).unwrap().unwrap().status, SlotStatus::Published);
}

#[tokio::test]
async fn test_nothing_to_recover() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let day = date(2025, 9, 2);
    plant(&store, day, "A", "tech", "Done topic");

    let generator = Arc::new(FakeGenerator::new());
    let orch = orchestrator(store.clone(), generator.clone(), &[("A", FakeAdapter::ok("A"))]);
    orch.run(RunRequest::full(day, RunTrigger::Nightly))
        .await
        .unwrap();

    let report = RecoveryPass::new(orch.clone()).run(day).await.unwrap();
    assert!(report.reclassified.is_empty());
    assert!(report.summary.is_none());
    assert_eq!(generator.calls(), 1);
    assert!(!orch.tracker().is_active());
}

#[tokio::test]
async fn test_recovery_refused_while_run_active() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let day = date(2025, 9, 2);
    let stuck = plant(&store, day, "A", "tech", "Stuck topic");
    store
        .mark_status(&stuck, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();

    let orch = orchestrator(store.clone(), Arc::new(FakeGenerator::new()), &[("A", FakeAdapter::ok("A"))]);
    let _guard = orch.tracker().try_begin(RunTrigger::Manual).unwrap();

    let err = RecoveryPass::new(orch).run(day).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::RunInProgress));
    assert_eq!(store.get_slot(&stuck).unwrap().unwrap().status, SlotStatus::Generating);
}

#[tokio::test]
async fn test_manual_run_rejected_while_recovery_holds_guard() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let day = date(2025, 9, 2);
    let stuck = plant(&store, day, "A", "tech", "Slow topic");
    store
        .mark_status(&stuck, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();

    let generator = Arc::new(FakeGenerator::new().with_delay(Duration::from_millis(300)));
    let orch = orchestrator(store.clone(), generator.clone(), &[("A", FakeAdapter::ok("A"))]);

    let pass = RecoveryPass::new(orch.clone());
    let recovery = tokio::spawn(async move { pass.run(day).await });

    while generator.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let err = orch
        .try_start(RunRequest::full(day, RunTrigger::Manual))
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::RunInProgress));
    assert_eq!(orch.tracker().snapshot().trigger, Some(RunTrigger::Recovery));

    let report = recovery.await.unwrap().unwrap();
    assert_eq!(report.reclassified, vec![stuck.clone()]);
    assert_eq!(report.summary.unwrap().published, 1);
    assert_eq!(generator.calls(), 1);
}
