//! Process-wide run progress
//!
//! A [`ProgressTracker`] owns the single-run guard and publishes a
//! [`ProgressState`] snapshot through a `watch` channel. Every mutation
//! replaces the whole snapshot, so readers never see a half-updated state.
//! The guard is released by [`RunGuard`]'s `Drop`, including on panic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::metrics;
use crate::models::{SlotKey, SlotStatus};

use super::{OrchestratorError, RunTrigger};

/// Result of one processed slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotResult {
    pub key: SlotKey,
    pub status: SlotStatus,
    pub title: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl SlotResult {
    pub fn published(key: SlotKey, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key,
            status: SlotStatus::Published,
            title: Some(title.into()),
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn failed(key: SlotKey, title: Option<String>, error: impl Into<String>) -> Self {
        Self {
            key,
            status: SlotStatus::Failed,
            title,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Snapshot served to readers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub in_progress: bool,
    pub current_site: Option<String>,
    pub progress_percent: u8,
    pub results: Vec<SlotResult>,
    pub run_id: Option<Uuid>,
    pub trigger: Option<RunTrigger>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_slots: usize,
    pub processed_slots: usize,
}

impl ProgressState {
    fn percent(processed: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        ((processed.min(total) * 100) / total) as u8
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    active: AtomicBool,
    state: watch::Sender<ProgressState>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProgressState::default());
        Self {
            active: AtomicBool::new(false),
            state,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn snapshot(&self) -> ProgressState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Claim the single run slot. `None` when a run is already active;
    /// the published state is left untouched in that case.
    pub fn try_begin(self: &Arc<Self>, trigger: RunTrigger) -> Option<RunGuard> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let run_id = Uuid::new_v4();
        self.state.send_replace(ProgressState {
            in_progress: true,
            run_id: Some(run_id),
            trigger: Some(trigger),
            started_at: Some(Utc::now()),
            ..ProgressState::default()
        });
        metrics::set_run_active(true);

        Some(RunGuard {
            tracker: Arc::clone(self),
            run_id,
        })
    }

    /// Clear the last run's results. Refused while a run is active.
    ///
    /// The guard is checked under the channel's write lock; `try_begin`
    /// claims the guard before publishing, so a fresh run's snapshot is
    /// never wiped.
    pub fn reset(&self) -> Result<(), OrchestratorError> {
        let mut refused = false;
        self.state.send_if_modified(|state| {
            if self.is_active() {
                refused = true;
                return false;
            }
            *state = ProgressState::default();
            true
        });
        if refused {
            return Err(OrchestratorError::RunInProgress);
        }
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut ProgressState)) {
        self.state.send_modify(f);
    }
}

/// Exclusive handle of the active run
#[derive(Debug)]
pub struct RunGuard {
    tracker: Arc<ProgressTracker>,
    run_id: Uuid,
}

impl RunGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn set_total(&self, total: usize) {
        self.tracker.update(|s| {
            s.total_slots = total;
            s.progress_percent = ProgressState::percent(s.processed_slots, total);
        });
    }

    pub fn set_site(&self, site: &str) {
        self.tracker
            .update(|s| s.current_site = Some(site.to_string()));
    }

    pub fn record(&self, result: SlotResult) {
        self.tracker.update(|s| {
            s.results.push(result);
            s.processed_slots += 1;
            s.progress_percent = ProgressState::percent(s.processed_slots, s.total_slots);
        });
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.update(|s| {
            s.in_progress = false;
            s.current_site = None;
            s.finished_at = Some(Utc::now());
            if s.processed_slots >= s.total_slots {
                s.progress_percent = 100;
            }
        });
        metrics::set_run_active(false);
        self.tracker.active.store(false, Ordering::Release);
    }
}
