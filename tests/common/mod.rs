//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dailypress::llm::{ContentGenerator, GenerationError, GenerationRequest, TextGenerator};
use dailypress::models::{
    ContentArtifact, PublishAttempt, ScheduleSlot, SiteProfile, SlotKey, SlotStatus, SlotUpdate,
    Topic,
};
use dailypress::orchestrator::{Orchestrator, ProgressTracker};
use dailypress::publisher::{AdapterRegistry, PublishAdapter, PublishOutcome, PublishRequest};
use dailypress::storage::{
    ArtifactRepository, AttemptRepository, MemoryStore, ScheduleRepository, SharedStore,
    StoreError, StoreResult,
};
use dailypress::utils::retry::RetryConfig;

// ============================================================================
// Generator
// ============================================================================

/// Returns a valid JSON post for the quoted topic in the prompt
#[derive(Default)]
pub struct FakeGenerator {
    fail_topics: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject prompts mentioning `topic`
    pub fn failing_on(mut self, topic: &str) -> Self {
        self.fail_topics.push(topic.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn quoted_topic(prompt: &str) -> String {
    prompt
        .split_once("about \"")
        .and_then(|(_, rest)| rest.split_once('"'))
        .map(|(topic, _)| topic.to_string())
        .unwrap_or_else(|| "Untitled topic".to_string())
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let topic = quoted_topic(&request.prompt);
        if self.fail_topics.iter().any(|t| topic.contains(t.as_str())) {
            return Err(GenerationError::Rejected {
                status: 400,
                body: format!("refused to write about {topic}"),
            });
        }

        Ok(serde_json::json!({
            "title": format!("{topic}: a practical guide for this year"),
            "meta_description": format!("Everything you need to know about {topic}."),
            "introduction": format!("This post walks through {topic} step by step."),
            "sections": [
                {"heading": "Background", "content": "Some context first. Then the details follow. Finally a summary."},
                {"heading": "In practice", "content": "Start small. Measure results. Iterate often."}
            ],
            "additional_content": "That covers the essentials.",
            "tags": ["guide", "howto"],
            "keywords": ["guide"]
        })
        .to_string())
    }
}

pub fn content_generator(backend: Arc<FakeGenerator>) -> ContentGenerator {
    ContentGenerator::new(backend)
        .with_retry(RetryConfig::immediate_once())
        .with_current_year(2025)
}

// ============================================================================
// Publish adapter
// ============================================================================

/// Records every request; rejects when built with `rejecting`
pub struct FakeAdapter {
    site: String,
    reject_with: Option<String>,
    published: Mutex<Vec<PublishRequest>>,
}

impl FakeAdapter {
    pub fn ok(site: &str) -> Arc<Self> {
        Arc::new(Self {
            site: site.to_string(),
            reject_with: None,
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting(site: &str, error: &str) -> Arc<Self> {
        Arc::new(Self {
            site: site.to_string(),
            reject_with: Some(error.to_string()),
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl PublishAdapter for FakeAdapter {
    fn platform(&self) -> &str {
        "fake"
    }

    async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        if let Some(error) = &self.reject_with {
            return PublishOutcome::Rejected {
                error: error.clone(),
            };
        }
        let mut published = self.published.lock().unwrap();
        published.push(request.clone());
        PublishOutcome::Published {
            url: format!("https://{}.test/posts/{}", self.site, published.len()),
        }
    }
}

// ============================================================================
// Store that can be made to fail
// ============================================================================

/// In-memory store whose artifact inserts start failing after a budget
pub struct FailingStore {
    inner: MemoryStore,
    artifact_budget: AtomicUsize,
    broken: AtomicBool,
}

impl FailingStore {
    /// Allow `inserts` artifact inserts, then fail every later one
    pub fn failing_after(inserts: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            artifact_budget: AtomicUsize::new(inserts),
            broken: AtomicBool::new(false),
        }
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }
}

impl ScheduleRepository for FailingStore {
    fn upsert_slot(&self, slot: &ScheduleSlot) -> StoreResult<()> {
        self.inner.upsert_slot(slot)
    }

    fn get_slot(&self, key: &SlotKey) -> StoreResult<Option<ScheduleSlot>> {
        self.inner.get_slot(key)
    }

    fn get_slots_for_day(&self, date: NaiveDate) -> StoreResult<Vec<ScheduleSlot>> {
        self.inner.get_slots_for_day(date)
    }

    fn get_week(&self, week_start: NaiveDate) -> StoreResult<Vec<ScheduleSlot>> {
        self.inner.get_week(week_start)
    }

    fn mark_status(
        &self,
        key: &SlotKey,
        status: SlotStatus,
        update: SlotUpdate,
    ) -> StoreResult<ScheduleSlot> {
        self.inner.mark_status(key, status, update)
    }

    fn published_topics(&self, site: &str) -> StoreResult<Vec<Topic>> {
        self.inner.published_topics(site)
    }

    fn recreate_week(&self, week_start: NaiveDate, slots: &[ScheduleSlot]) -> StoreResult<usize> {
        self.inner.recreate_week(week_start, slots)
    }
}

impl ArtifactRepository for FailingStore {
    fn insert_artifact(&self, artifact: &ContentArtifact) -> StoreResult<i64> {
        let remaining = self.artifact_budget.load(Ordering::SeqCst);
        if remaining == 0 {
            self.broken.store(true, Ordering::SeqCst);
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.artifact_budget.store(remaining - 1, Ordering::SeqCst);
        self.inner.insert_artifact(artifact)
    }

    fn get_artifact(&self, id: i64) -> StoreResult<Option<ContentArtifact>> {
        self.inner.get_artifact(id)
    }

    fn set_artifact_file(&self, id: i64, file_reference: &str) -> StoreResult<()> {
        self.inner.set_artifact_file(id, file_reference)
    }

    fn mark_artifact_published(&self, id: i64) -> StoreResult<()> {
        self.inner.mark_artifact_published(id)
    }
}

impl AttemptRepository for FailingStore {
    fn append_attempt(&self, attempt: &PublishAttempt) -> StoreResult<i64> {
        self.inner.append_attempt(attempt)
    }

    fn attempts_for_content(&self, content_id: i64) -> StoreResult<Vec<PublishAttempt>> {
        self.inner.attempts_for_content(content_id)
    }

    fn recent_attempts(&self, site: Option<&str>, limit: usize) -> StoreResult<Vec<PublishAttempt>> {
        self.inner.recent_attempts(site, limit)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Insert a planned slot for `date`
pub fn plant(store: &SharedStore, date: NaiveDate, site: &str, category: &str, topic: &str) -> SlotKey {
    let key = SlotKey::for_date(date, site, category);
    let slot = ScheduleSlot::planned(key.clone(), &Topic::new(topic, &[category]));
    store.upsert_slot(&slot).unwrap();
    key
}

/// Orchestrator over `store` with one adapter per listed site
pub fn orchestrator(
    store: SharedStore,
    backend: Arc<FakeGenerator>,
    adapters: &[(&str, Arc<FakeAdapter>)],
) -> Arc<Orchestrator> {
    let mut registry = AdapterRegistry::new();
    let mut sites = Vec::new();
    for (site, adapter) in adapters {
        registry.register(*site, adapter.clone());
        sites.push(SiteProfile::new(*site));
    }
    Arc::new(Orchestrator::new(
        store,
        content_generator(backend),
        registry,
        sites,
        ProgressTracker::shared(),
    ))
}
