pub mod run;
pub mod schedule;
pub mod serve;

pub use run::{recover, run};
pub use schedule::{plan_week, recreate_week, reset_slot, status};
pub use serve::{daemon, serve};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use dailypress::config::Config;
use dailypress::llm::{ContentGenerator, LlmClient};
use dailypress::orchestrator::{Orchestrator, ProgressTracker};
use dailypress::scheduler::{TriggerClock, WeekPlanner};
use dailypress::storage::{SharedStore, SqliteStore};

/// Everything wired from one configuration
pub struct Runtime {
    pub config: Config,
    pub store: SharedStore,
    pub orchestrator: Arc<Orchestrator>,
    pub planner: Arc<WeekPlanner>,
    pub clock: TriggerClock,
}

impl Runtime {
    pub fn build(config: Config) -> Result<Self> {
        let store: SharedStore = Arc::new(
            SqliteStore::new(&config.database.sqlite_path).with_context(|| {
                format!(
                    "Failed to open database {}",
                    config.database.sqlite_path.display()
                )
            })?,
        );

        let client = LlmClient::with_config(config.generator.clone())?;
        let generator = ContentGenerator::new(Arc::new(client))
            .with_keyword_insertions(config.orchestrator.keyword_insertions);

        let orchestrator = Arc::new(Orchestrator::from_config(
            &config,
            store.clone(),
            generator,
            ProgressTracker::shared(),
        )?);
        let planner = Arc::new(WeekPlanner::from_config(&config, store.clone()));
        let clock = TriggerClock::new(&config.scheduler)?;

        Ok(Self {
            config,
            store,
            orchestrator,
            planner,
            clock,
        })
    }

    /// Explicit date or today in the publishing time zone
    pub fn date_or_today(&self, date: Option<NaiveDate>) -> NaiveDate {
        date.unwrap_or_else(|| self.clock.today(Utc::now()))
    }
}
