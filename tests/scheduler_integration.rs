//! Integration tests for the scheduling side
//!
//! These tests verify the complete workflow of:
//! - Weekly planning over the SQLite store
//! - Duplicate avoidance across weeks
//! - Trigger arithmetic with a UTC offset
//! - Job execution for each trigger

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use dailypress::models::{SlotKey, SlotStatus, SlotUpdate, Topic};
use dailypress::scheduler::{
    Jobs, TriggerClock, TriggerConfig, TriggerKind, TriggerStatus, WeekPlanner,
};
use dailypress::storage::{ScheduleRepository, SharedStore, SqliteStore};
use dailypress::topics::selector::seed_index;
use dailypress::topics::{TopicPool, TopicSelector};

use common::{date, orchestrator, FakeAdapter, FakeGenerator};

const OFFSET: u64 = 7;

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn candidates(prefix: &str) -> Vec<Topic> {
    (0..3)
        .map(|i| Topic::new(format!("{prefix} topic {i}"), &[format!("{prefix}-kw{i}").as_str()]))
        .collect()
}

fn pool() -> TopicPool {
    let mut pool = TopicPool::new();
    pool.insert("A", "tech", candidates("tech"));
    pool.insert("A", "life", candidates("life"));
    pool
}

fn planner(store: SharedStore) -> WeekPlanner {
    WeekPlanner::new(
        store,
        pool(),
        TopicSelector::new().with_offset("A", OFFSET),
        vec!["A".to_string()],
    )
}

fn sqlite() -> (tempfile::TempDir, SharedStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("schedule.db")).unwrap();
    (dir, Arc::new(store))
}

fn utc_triggers() -> TriggerConfig {
    TriggerConfig::builder()
        .nightly_time("03:00")
        .recovery_offset_hours(6)
        .weekly("sun", "22:00")
        .utc_offset_minutes(0)
        .build()
        .unwrap()
}

fn publish(store: &SharedStore, key: &SlotKey) {
    store
        .mark_status(key, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();
    store
        .mark_status(key, SlotStatus::Published, SlotUpdate::published(1, "https://a.test/1"))
        .unwrap();
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn test_populate_week_on_sqlite() {
    let (_dir, store) = sqlite();
    let planner = planner(store.clone());
    let monday = date(2025, 9, 1);

    let report = planner.populate_week(monday).unwrap();
    assert_eq!(report.created, 14);
    assert_eq!(report.existing, 0);

    let week = store.get_week(monday).unwrap();
    assert_eq!(week.len(), 14);
    assert!(week.iter().all(|s| s.status == SlotStatus::Planned));

    // idempotent; a mid-week date maps to the same week
    let again = planner.populate_week(date(2025, 9, 4)).unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.existing, 14);
}

#[test]
fn test_populate_keeps_progressed_slots() {
    let (_dir, store) = sqlite();
    let planner = planner(store.clone());
    let monday = date(2025, 9, 1);
    planner.populate_week(monday).unwrap();

    let key = SlotKey::new(monday, 2, "A", "tech");
    let before = store.get_slot(&key).unwrap().unwrap();
    publish(&store, &key);

    planner.populate_week(monday).unwrap();
    let after = store.get_slot(&key).unwrap().unwrap();
    assert_eq!(after.status, SlotStatus::Published);
    assert_eq!(after.topic, before.topic);
    assert_eq!(after.published_url.as_deref(), Some("https://a.test/1"));
}

#[test]
fn test_planning_is_deterministic_across_stores() {
    let (_a, first) = sqlite();
    let (_b, second) = sqlite();
    let monday = date(2025, 9, 1);
    planner(first.clone()).populate_week(monday).unwrap();
    planner(second.clone()).populate_week(monday).unwrap();

    let topics = |store: &SharedStore| -> Vec<(SlotKey, String)> {
        store
            .get_week(monday)
            .unwrap()
            .into_iter()
            .map(|s| (s.key, s.topic))
            .collect()
    };
    assert_eq!(topics(&first), topics(&second));
}

#[test]
fn test_recreate_week_replaces_everything() {
    let (_dir, store) = sqlite();
    let planner = planner(store.clone());
    let monday = date(2025, 9, 1);
    planner.populate_week(monday).unwrap();
    let key = SlotKey::new(monday, 0, "A", "life");
    publish(&store, &key);

    let inserted = planner.recreate_week(monday).unwrap();
    assert_eq!(inserted, 14);
    assert_eq!(store.get_slot(&key).unwrap().unwrap().status, SlotStatus::Planned);
    assert_eq!(store.get_week(monday).unwrap().len(), 14);
}

#[test]
fn test_published_topic_collision_probes_forward() {
    let (_dir, store) = sqlite();
    let last_week = date(2025, 8, 25);
    let monday = date(2025, 9, 1);
    let tech = candidates("tech");

    // publish, last week, exactly the topic next Monday's raw pick lands on
    let raw = seed_index("A", monday, 0, OFFSET, tech.len());
    let key = SlotKey::new(last_week, 0, "A", "tech");
    store
        .upsert_slot(&dailypress::models::ScheduleSlot::planned(key.clone(), &tech[raw]))
        .unwrap();
    publish(&store, &key);

    planner(store.clone()).populate_week(monday).unwrap();

    let slot = store
        .get_slot(&SlotKey::new(monday, 0, "A", "tech"))
        .unwrap()
        .unwrap();
    assert_ne!(slot.topic, tech[raw].title);
    assert_eq!(slot.topic, tech[(raw + 1) % tech.len()].title);
}

// ============================================================================
// Triggers
// ============================================================================

#[test]
fn test_trigger_order_through_a_day() {
    let clock = TriggerClock::new(&utc_triggers()).unwrap();

    // Wednesday before dawn: nightly first
    let (kind, at) = clock.next_trigger(utc(2025, 9, 3, 1, 0)).unwrap();
    assert_eq!((kind, at), (TriggerKind::Nightly, utc(2025, 9, 3, 3, 0)));

    let (kind, at) = clock.next_trigger(utc(2025, 9, 3, 5, 0)).unwrap();
    assert_eq!((kind, at), (TriggerKind::Recovery, utc(2025, 9, 3, 9, 0)));
    assert_eq!(clock.job_date(kind, at), date(2025, 9, 3));

    let weekly = clock.next_fire(TriggerKind::Weekly, utc(2025, 9, 3, 5, 0)).unwrap();
    assert_eq!(weekly, utc(2025, 9, 7, 22, 0));
    assert_eq!(clock.job_date(TriggerKind::Weekly, weekly), date(2025, 9, 8));
}

#[test]
fn test_trigger_with_utc_offset() {
    let config = TriggerConfig::builder()
        .nightly_time("03:00")
        .recovery_offset_hours(6)
        .weekly("sun", "22:00")
        .utc_offset_minutes(9 * 60)
        .build()
        .unwrap();
    let clock = TriggerClock::new(&config).unwrap();

    // 03:00 at UTC+9 is 18:00 UTC the previous day
    let nightly = clock.next_fire(TriggerKind::Nightly, utc(2025, 9, 2, 17, 0)).unwrap();
    assert_eq!(nightly, utc(2025, 9, 2, 18, 0));
    assert_eq!(clock.job_date(TriggerKind::Nightly, nightly), date(2025, 9, 3));

    let recovery = clock.next_fire(TriggerKind::Recovery, nightly).unwrap();
    assert_eq!(recovery, nightly + Duration::hours(6));
    assert_eq!(clock.job_date(TriggerKind::Recovery, recovery), date(2025, 9, 3));
}

#[test]
fn test_invalid_trigger_config_rejected() {
    let err = TriggerConfig::builder()
        .nightly_time("3am")
        .build()
        .unwrap_err();
    assert!(!err.is_recoverable());

    let config = TriggerConfig {
        weekly_day: "someday".to_string(),
        ..TriggerConfig::default()
    };
    assert!(TriggerClock::new(&config).is_err());
}

#[test]
fn test_trigger_status_display() {
    let status = TriggerStatus::at(&utc_triggers(), utc(2025, 9, 3, 1, 0)).unwrap();
    let text = status.display();
    assert!(text.contains("Nightly"));
    assert!(text.contains("+6h"));
    assert!(text.contains("sun 22:00"));
}

// ============================================================================
// Jobs
// ============================================================================

fn jobs(store: SharedStore, generator: Arc<FakeGenerator>, adapter: Arc<FakeAdapter>) -> Jobs {
    jobs_with(&utc_triggers(), store, generator, adapter)
}

fn jobs_with(
    config: &TriggerConfig,
    store: SharedStore,
    generator: Arc<FakeGenerator>,
    adapter: Arc<FakeAdapter>,
) -> Jobs {
    let orch = orchestrator(store.clone(), generator, &[("A", adapter)]);
    Jobs::new(config, orch, Arc::new(planner(store))).unwrap()
}

#[tokio::test]
async fn test_weekly_job_plans_next_week() {
    let (_dir, store) = sqlite();
    let generator = Arc::new(FakeGenerator::new());
    let jobs = jobs(store.clone(), generator.clone(), FakeAdapter::ok("A"));

    jobs.execute(TriggerKind::Weekly, utc(2025, 9, 7, 22, 0))
        .await
        .unwrap();

    assert_eq!(store.get_week(date(2025, 9, 8)).unwrap().len(), 14);
    assert!(store.get_week(date(2025, 9, 1)).unwrap().is_empty());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_nightly_job_plans_and_publishes_today() {
    let (_dir, store) = sqlite();
    let generator = Arc::new(FakeGenerator::new());
    let adapter = FakeAdapter::ok("A");
    let jobs = jobs(store.clone(), generator.clone(), adapter.clone());

    jobs.execute(TriggerKind::Nightly, utc(2025, 9, 3, 3, 0))
        .await
        .unwrap();

    let today: Vec<_> = store.get_slots_for_day(date(2025, 9, 3)).unwrap();
    assert_eq!(today.len(), 2);
    assert!(today.iter().all(|s| s.status == SlotStatus::Published));
    assert_eq!(adapter.count(), 2);

    // the rest of the week is only planned
    let tomorrow = store.get_slots_for_day(date(2025, 9, 4)).unwrap();
    assert!(tomorrow.iter().all(|s| s.status == SlotStatus::Planned));
}

#[tokio::test]
async fn test_recovery_job_retries_failed_slots() {
    let (_dir, store) = sqlite();
    let generator = Arc::new(FakeGenerator::new().failing_on("tech topic"));
    let adapter = FakeAdapter::ok("A");
    let jobs = jobs(store.clone(), generator.clone(), adapter.clone());

    jobs.execute(TriggerKind::Nightly, utc(2025, 9, 3, 3, 0))
        .await
        .unwrap();
    let day = date(2025, 9, 3);
    let failed = SlotKey::for_date(day, "A", "tech");
    assert_eq!(store.get_slot(&failed).unwrap().unwrap().status, SlotStatus::Failed);

    jobs.execute(TriggerKind::Recovery, utc(2025, 9, 3, 9, 0))
        .await
        .unwrap();

    // still failing, but retried exactly once more; the published sibling is untouched
    assert_eq!(generator.calls(), 3);
    assert_eq!(adapter.count(), 1);
    let life = SlotKey::for_date(day, "A", "life");
    assert_eq!(store.get_slot(&life).unwrap().unwrap().status, SlotStatus::Published);
}

#[tokio::test]
async fn test_recovery_job_reclassifies_slot_left_generating_with_default_timing() {
    let (_dir, store) = sqlite();
    let generator = Arc::new(FakeGenerator::new());
    let adapter = FakeAdapter::ok("A");
    let config = TriggerConfig::default();
    let jobs = jobs_with(&config, store.clone(), generator.clone(), adapter.clone());

    let nightly = jobs
        .clock()
        .next_fire(TriggerKind::Nightly, utc(2025, 9, 2, 12, 0))
        .unwrap();
    let recovery = jobs.clock().next_fire(TriggerKind::Recovery, nightly).unwrap();
    assert_eq!(recovery - nightly, config.recovery_offset());
    let day = jobs.clock().job_date(TriggerKind::Nightly, nightly);
    assert_eq!(jobs.clock().job_date(TriggerKind::Recovery, recovery), day);

    // the nightly run died right after claiming this slot
    planner(store.clone()).populate_week(day).unwrap();
    let stuck = SlotKey::for_date(day, "A", "tech");
    store
        .mark_status(&stuck, SlotStatus::Generating, SlotUpdate::default())
        .unwrap();

    jobs.execute(TriggerKind::Recovery, recovery).await.unwrap();

    let slots = store.get_slots_for_day(day).unwrap();
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|s| s.status == SlotStatus::Published));
    assert_eq!(generator.calls(), 2);
    assert_eq!(adapter.count(), 2);
}

#[test]
fn test_populate_current_and_next() {
    let (_dir, store) = sqlite();
    let jobs = jobs(store.clone(), Arc::new(FakeGenerator::new()), FakeAdapter::ok("A"));

    jobs.populate_current_and_next(utc(2025, 9, 3, 12, 0)).unwrap();
    assert_eq!(store.get_week(date(2025, 9, 1)).unwrap().len(), 14);
    assert_eq!(store.get_week(date(2025, 9, 8)).unwrap().len(), 14);
}
