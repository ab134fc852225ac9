//! Publish orchestrator
//!
//! Drives the slots of one date through their lifecycle:
//!
//! ```text
//!   planned ──┐
//!             ├──▶ generating ──▶ published
//!   failed ───┘         │
//!      ▲                └───────▶ failed
//!      └── (next run or recovery pass)
//! ```
//!
//! Sites run in configuration order, categories sorted within a site. Each
//! slot is independent: a generation or platform failure marks that slot
//! `failed` and the run moves on. Only a store failure stops the run early.
//! At most one run is active per process, enforced by [`ProgressTracker`].

pub mod progress;

pub use progress::{ProgressState, ProgressTracker, RunGuard, SlotResult};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::ContentGenerator;
use crate::metrics;
use crate::models::{
    AttemptType, PublishAttempt, ScheduleSlot, SiteProfile, SlotKey, SlotStatus, SlotUpdate,
};
use crate::publisher::{AdapterRegistry, PublishOutcome, PublishRequest};
use crate::storage::{
    ArtifactRepository, ArtifactWriter, AttemptRepository, ScheduleRepository, SharedStore,
    StoreError,
};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("a publish run is already in progress")]
    RunInProgress,

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Nightly,
    Recovery,
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nightly => "nightly",
            Self::Recovery => "recovery",
            Self::Manual => "manual",
        }
    }

    /// How attempts of this run are recorded in the publish log
    pub fn attempt_type(&self) -> AttemptType {
        match self {
            Self::Manual => AttemptType::Manual,
            Self::Nightly | Self::Recovery => AttemptType::Auto,
        }
    }
}

/// Which slots of the date a run may touch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    #[default]
    Full,
    Restricted(Vec<SlotKey>),
}

impl RunScope {
    pub fn includes(&self, key: &SlotKey) -> bool {
        match self {
            Self::Full => true,
            Self::Restricted(keys) => keys.contains(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub date: NaiveDate,
    pub trigger: RunTrigger,
    #[serde(default)]
    pub scope: RunScope,
}

impl RunRequest {
    pub fn full(date: NaiveDate, trigger: RunTrigger) -> Self {
        Self {
            date,
            trigger,
            scope: RunScope::Full,
        }
    }

    pub fn restricted(date: NaiveDate, trigger: RunTrigger, keys: Vec<SlotKey>) -> Self {
        Self {
            date,
            trigger,
            scope: RunScope::Restricted(keys),
        }
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub trigger: RunTrigger,
    pub published: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Set when a store failure stopped the run early
    pub aborted: Option<String>,
    pub results: Vec<SlotResult>,
}

impl RunSummary {
    fn new(run_id: Uuid, request: &RunRequest) -> Self {
        Self {
            run_id,
            date: request.date,
            trigger: request.trigger,
            published: 0,
            failed: 0,
            skipped: 0,
            aborted: None,
            results: Vec::new(),
        }
    }

    fn push(&mut self, result: SlotResult) {
        match result.status {
            SlotStatus::Published => self.published += 1,
            _ => self.failed += 1,
        }
        self.results.push(result);
    }

    fn outcome(&self) -> &'static str {
        match (&self.aborted, self.failed) {
            (Some(_), _) => "aborted",
            (None, 0) => "completed",
            (None, _) => "partial",
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    store: SharedStore,
    generator: ContentGenerator,
    adapters: AdapterRegistry,
    sites: Vec<SiteProfile>,
    tracker: Arc<ProgressTracker>,
    writer: Option<ArtifactWriter<'static>>,
    site_delay: Duration,
}

impl Orchestrator {
    /// `sites` is the publishing priority order
    pub fn new(
        store: SharedStore,
        generator: ContentGenerator,
        adapters: AdapterRegistry,
        sites: Vec<SiteProfile>,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            store,
            generator,
            adapters,
            sites,
            tracker,
            writer: None,
            site_delay: Duration::ZERO,
        }
    }

    /// Wire everything from configuration
    pub fn from_config(
        config: &Config,
        store: SharedStore,
        generator: ContentGenerator,
        tracker: Arc<ProgressTracker>,
    ) -> anyhow::Result<Self> {
        let adapters = AdapterRegistry::from_config(config)?;
        let sites = config.sites.iter().map(|s| s.profile.clone()).collect();
        Ok(Self::new(store, generator, adapters, sites, tracker)
            .with_site_delay(config.site_delay())
            .with_artifact_dir(&config.output.artifact_dir)?)
    }

    pub fn with_site_delay(mut self, delay: Duration) -> Self {
        self.site_delay = delay;
        self
    }

    /// Export every generated artifact as Markdown under `dir`
    pub fn with_artifact_dir(mut self, dir: &Path) -> anyhow::Result<Self> {
        self.writer = Some(ArtifactWriter::new(dir)?);
        Ok(self)
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Run to completion. Rejected immediately, with nothing written, when
    /// another run is active.
    pub async fn run(&self, request: RunRequest) -> Result<RunSummary, OrchestratorError> {
        let guard = self.claim(request.trigger)?;
        Ok(self.execute(guard, request).await)
    }

    /// Run under a guard the caller already holds
    pub(crate) async fn run_with_guard(&self, guard: RunGuard, request: RunRequest) -> RunSummary {
        self.execute(guard, request).await
    }

    /// Claim the guard now and run in a background task; returns the run id
    pub fn try_start(self: &Arc<Self>, request: RunRequest) -> Result<Uuid, OrchestratorError> {
        let guard = self.claim(request.trigger)?;
        let run_id = guard.run_id();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.execute(guard, request).await;
        });
        Ok(run_id)
    }

    pub(crate) fn claim(&self, trigger: RunTrigger) -> Result<RunGuard, OrchestratorError> {
        self.tracker.try_begin(trigger).ok_or_else(|| {
            warn!(trigger = trigger.as_str(), "Run rejected, another run is active");
            metrics::record_run(trigger.as_str(), "rejected");
            OrchestratorError::RunInProgress
        })
    }

    /// Slots to process, grouped by site in priority order
    fn plan(
        &self,
        request: &RunRequest,
        slots: Vec<ScheduleSlot>,
    ) -> (Vec<(&SiteProfile, Vec<ScheduleSlot>)>, usize) {
        let mut by_site: HashMap<String, Vec<ScheduleSlot>> = HashMap::new();
        let mut skipped = 0;

        for slot in slots {
            if slot.status.is_runnable() && request.scope.includes(&slot.key) {
                by_site.entry(slot.key.site.clone()).or_default().push(slot);
            } else {
                skipped += 1;
            }
        }

        let mut plan = Vec::new();
        for profile in &self.sites {
            if let Some(mut site_slots) = by_site.remove(&profile.name) {
                site_slots.sort_by(|a, b| a.key.category.cmp(&b.key.category));
                plan.push((profile, site_slots));
            }
        }

        for (site, rest) in by_site {
            warn!(site = %site, slots = rest.len(), "Skipping slots of an unconfigured site");
            skipped += rest.len();
        }

        (plan, skipped)
    }

    async fn execute(&self, guard: RunGuard, request: RunRequest) -> RunSummary {
        let mut summary = RunSummary::new(guard.run_id(), &request);
        info!(
            run_id = %summary.run_id,
            date = %request.date,
            trigger = request.trigger.as_str(),
            "Starting publish run"
        );

        let slots = match self.store.get_slots_for_day(request.date) {
            Ok(slots) => slots,
            Err(e) => {
                error!(error = %e, "Failed to load slots, aborting run");
                summary.aborted = Some(e.to_string());
                metrics::record_run(request.trigger.as_str(), summary.outcome());
                return summary;
            }
        };

        let (plan, skipped) = self.plan(&request, slots);
        summary.skipped = skipped;
        guard.set_total(plan.iter().map(|(_, s)| s.len()).sum());

        'sites: for (index, (profile, slots)) in plan.into_iter().enumerate() {
            if index > 0 && !self.site_delay.is_zero() {
                tokio::time::sleep(self.site_delay).await;
            }
            guard.set_site(&profile.name);

            for slot in slots {
                match self.process_slot(&slot, profile, request.trigger).await {
                    Ok(result) => {
                        guard.record(result.clone());
                        summary.push(result);
                    }
                    Err(e) if e.is_persistence_failure() => {
                        error!(slot = %slot.key, error = %e, "Store failure, aborting run");
                        summary.aborted = Some(e.to_string());
                        break 'sites;
                    }
                    Err(e) => {
                        // lost a race with another writer; leave the slot alone
                        warn!(slot = %slot.key, error = %e, "Slot changed underneath the run, skipping");
                        summary.skipped += 1;
                    }
                }
            }
        }

        metrics::record_run(request.trigger.as_str(), summary.outcome());
        info!(
            run_id = %summary.run_id,
            published = summary.published,
            failed = summary.failed,
            skipped = summary.skipped,
            aborted = summary.aborted.is_some(),
            "Publish run finished"
        );
        drop(guard);
        summary
    }

    async fn process_slot(
        &self,
        slot: &ScheduleSlot,
        profile: &SiteProfile,
        trigger: RunTrigger,
    ) -> Result<SlotResult, StoreError> {
        let key = &slot.key;
        self.store
            .mark_status(key, SlotStatus::Generating, SlotUpdate::default())?;
        info!(slot = %key, topic = %slot.topic, "Generating");

        let mut artifact = match self
            .generator
            .generate(&slot.as_topic(), &key.category, slot.target_length, profile)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => return self.fail(key, None, None, trigger, e.to_string()),
        };

        let content_id = self.store.insert_artifact(&artifact)?;
        artifact.id = Some(content_id);

        if let Some(writer) = &self.writer {
            match writer.save(&artifact, key.date()) {
                Ok(path) => self
                    .store
                    .set_artifact_file(content_id, &path.to_string_lossy())?,
                Err(e) => warn!(slot = %key, error = %e, "Markdown export failed"),
            }
        }

        let title = Some(artifact.title.clone());
        let request = match PublishRequest::from_artifact(&artifact, &key.category) {
            Ok(request) => request,
            Err(e) => return self.fail(key, Some(content_id), title, trigger, e.to_string()),
        };

        let Some(adapter) = self.adapters.get(&key.site) else {
            let reason = format!("no publish adapter configured for site '{}'", key.site);
            return self.fail(key, Some(content_id), title, trigger, reason);
        };

        match adapter.publish(&request).await {
            PublishOutcome::Published { url } => {
                self.store.mark_status(
                    key,
                    SlotStatus::Published,
                    SlotUpdate::published(content_id, url.clone()),
                )?;
                self.store.append_attempt(&PublishAttempt::success(
                    &key.site,
                    content_id,
                    trigger.attempt_type(),
                    url.clone(),
                ))?;
                self.store.mark_artifact_published(content_id)?;

                metrics::record_slot(&key.site, SlotStatus::Published.as_str());
                info!(slot = %key, platform = adapter.platform(), url = %url, "Published");
                Ok(SlotResult::published(key.clone(), artifact.title, url))
            }
            PublishOutcome::Rejected { error } => {
                self.fail(key, Some(content_id), title, trigger, error)
            }
        }
    }

    fn fail(
        &self,
        key: &SlotKey,
        content_id: Option<i64>,
        title: Option<String>,
        trigger: RunTrigger,
        error: String,
    ) -> Result<SlotResult, StoreError> {
        warn!(slot = %key, error = %error, "Slot failed");
        self.store.mark_status(
            key,
            SlotStatus::Failed,
            SlotUpdate::failed(content_id, error.clone()),
        )?;
        self.store.append_attempt(&PublishAttempt::failure(
            &key.site,
            content_id,
            trigger.attempt_type(),
            error.clone(),
        ))?;
        metrics::record_slot(&key.site, SlotStatus::Failed.as_str());
        Ok(SlotResult::failed(key.clone(), title, error))
    }
}
