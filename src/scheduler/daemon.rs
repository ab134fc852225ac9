//! Scheduler daemon
//!
//! Sleeps until the nearest trigger, then runs its job in a separate task.
//! A job that fails or panics is logged and the loop carries on with the
//! next trigger. The loop ends when the shutdown future resolves.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{DailypressErrorTrait, Error};
use crate::models::week_start_of;
use crate::orchestrator::{Orchestrator, RunRequest, RunTrigger};

use super::error::{SchedulerError, SchedulerResult};
use super::planner::WeekPlanner;
use super::recovery::RecoveryPass;
use super::trigger::{TriggerClock, TriggerConfig, TriggerKind};

/// Everything a triggered job needs
#[derive(Clone)]
pub struct Jobs {
    clock: TriggerClock,
    orchestrator: Arc<Orchestrator>,
    planner: Arc<WeekPlanner>,
    recovery: Arc<RecoveryPass>,
}

impl Jobs {
    pub fn new(
        config: &TriggerConfig,
        orchestrator: Arc<Orchestrator>,
        planner: Arc<WeekPlanner>,
    ) -> SchedulerResult<Self> {
        let clock = TriggerClock::new(config)?;
        let recovery = Arc::new(RecoveryPass::new(Arc::clone(&orchestrator)));
        Ok(Self {
            clock,
            orchestrator,
            planner,
            recovery,
        })
    }

    pub fn clock(&self) -> &TriggerClock {
        &self.clock
    }

    /// Run one job for a trigger that fired at `fired_at`
    pub async fn execute(&self, kind: TriggerKind, fired_at: DateTime<Utc>) -> SchedulerResult<()> {
        let date = self.clock.job_date(kind, fired_at);
        match kind {
            TriggerKind::Nightly => {
                // make sure today's slots exist even if the weekly job was missed
                self.planner.populate_week(week_start_of(date))?;
                let summary = self
                    .orchestrator
                    .run(RunRequest::full(date, RunTrigger::Nightly))
                    .await
                    .map_err(|e| SchedulerError::job_failed(kind.as_str(), e.to_string()))?;
                info!(
                    %date,
                    published = summary.published,
                    failed = summary.failed,
                    "Nightly run done"
                );
                if let Some(reason) = summary.aborted {
                    return Err(SchedulerError::job_failed(kind.as_str(), reason));
                }
            }
            TriggerKind::Recovery => {
                let report = self
                    .recovery
                    .run(date)
                    .await
                    .map_err(|e| SchedulerError::job_failed(kind.as_str(), e.to_string()))?;
                info!(
                    %date,
                    reclassified = report.reclassified.len(),
                    ran = report.summary.is_some(),
                    "Recovery pass done"
                );
            }
            TriggerKind::Weekly => {
                self.planner.populate_week(date)?;
            }
        }
        Ok(())
    }

    /// Populate the current and next week
    pub fn populate_current_and_next(&self, now: DateTime<Utc>) -> SchedulerResult<()> {
        let this_week = week_start_of(self.clock.today(now));
        self.planner.populate_week(this_week)?;
        self.planner
            .populate_week(this_week + chrono::Duration::days(7))?;
        Ok(())
    }
}

/// Spawn a job and log its outcome, including panics
fn spawn_job(jobs: &Jobs, kind: TriggerKind, fired_at: DateTime<Utc>) {
    let runner = jobs.clone();
    let handle = tokio::spawn(async move { runner.execute(kind, fired_at).await });

    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => info!(job = kind.as_str(), "Job finished"),
            Ok(Err(e)) => {
                let e = Error::from(e);
                error!(
                    job = kind.as_str(),
                    error = %e,
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    "Job failed"
                );
            }
            Err(join) if join.is_panic() => {
                let e = SchedulerError::JobPanicked {
                    job: kind.as_str().to_string(),
                };
                error!(error = %e, "Job panicked");
            }
            Err(join) => error!(job = kind.as_str(), error = %join, "Job cancelled"),
        }
    });
}

pub struct Daemon {
    jobs: Jobs,
    run_on_startup: bool,
}

impl Daemon {
    pub fn new(config: &TriggerConfig, jobs: Jobs) -> Self {
        Self {
            jobs,
            run_on_startup: config.run_on_startup,
        }
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> SchedulerResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> SchedulerResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.run_on_startup {
            if let Err(e) = self.jobs.populate_current_and_next(Utc::now()) {
                error!(error = %e, "Startup planning failed");
            }
        }

        tokio::pin!(shutdown);
        let mut last_fired = None;
        loop {
            let now = Utc::now();
            let (kind, at) = self.jobs.clock().next_trigger_after(now, last_fired)?;
            let wait = (at - now).to_std().unwrap_or_default();
            info!(next = kind.as_str(), at = %at, wait_secs = wait.as_secs(), "Waiting for next trigger");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    info!(job = kind.as_str(), "Trigger fired");
                    spawn_job(&self.jobs, kind, at);
                    last_fired = Some(at);
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping daemon");
                    break;
                }
            }
        }

        Ok(())
    }
}
