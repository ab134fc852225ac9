//! Recovery pass
//!
//! Runs some hours after the nightly run. The pass claims the single-run
//! guard before touching the store, so any slot still `generating` at that
//! point belongs to no live run: it is reclassified as `failed` and the
//! orchestrator then retries the day's slots that are not `published`,
//! all under the same guard.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{SlotKey, SlotStatus, SlotUpdate};
use crate::orchestrator::{Orchestrator, OrchestratorError, RunRequest, RunSummary, RunTrigger};
use crate::storage::ScheduleRepository;

/// Error stored on slots reclassified by the recovery pass
pub const STALLED_ERROR: &str = "stalled";

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub date: NaiveDate,
    pub reclassified: Vec<SlotKey>,
    /// `None` when every slot of the day was already published
    pub summary: Option<RunSummary>,
}

pub struct RecoveryPass {
    orchestrator: Arc<Orchestrator>,
}

impl RecoveryPass {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Recover `date`. Refused without changes while another run is active.
    pub async fn run(&self, date: NaiveDate) -> Result<RecoveryReport, OrchestratorError> {
        let guard = self.orchestrator.claim(RunTrigger::Recovery)?;

        let store = self.orchestrator.store();
        let mut reclassified = Vec::new();
        for slot in store.get_slots_for_day(date)? {
            if slot.status != SlotStatus::Generating {
                continue;
            }
            store.mark_status(
                &slot.key,
                SlotStatus::Failed,
                SlotUpdate::failed(slot.generated_content_id, STALLED_ERROR),
            )?;
            warn!(slot = %slot.key, since = %slot.updated_at, "Reclassified stalled slot");
            reclassified.push(slot.key);
        }

        let pending: Vec<SlotKey> = store
            .get_slots_for_day(date)?
            .into_iter()
            .filter(|s| s.status != SlotStatus::Published)
            .map(|s| s.key)
            .collect();

        info!(
            %date,
            reclassified = reclassified.len(),
            pending = pending.len(),
            "Recovery pass scanned the day"
        );

        let summary = if pending.is_empty() {
            None
        } else {
            let request = RunRequest::restricted(date, RunTrigger::Recovery, pending);
            Some(self.orchestrator.run_with_guard(guard, request).await)
        };

        Ok(RecoveryReport {
            date,
            reclassified,
            summary,
        })
    }
}
