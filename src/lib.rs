//! dailypress - scheduled multi-site blog publishing
//!
//! Plans a week of posts per site with a deterministic topic selector,
//! generates each post through an LLM with a parse fallback ladder, and
//! publishes it through a per-site adapter on a nightly schedule with a
//! delayed recovery pass.
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading and validation
//! - [`models`] - Slots, artifacts, attempts and site profiles
//! - [`topics`] - Topic pools and the deterministic selector
//! - [`storage`] - Schedule, artifact and attempt stores (SQLite, in-memory)
//! - [`llm`] - Generation client, parse ladder and post-processing
//! - [`publisher`] - WordPress and export adapters
//! - [`orchestrator`] - Per-slot publish lifecycle and progress tracking
//! - [`scheduler`] - Nightly, recovery and weekly triggers
//! - [`api`] - Operational HTTP endpoints
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dailypress::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store: SharedStore = Arc::new(SqliteStore::new(&config.database.sqlite_path)?);
//!     let client = dailypress::llm::LlmClient::with_config(config.generator.clone())?;
//!     let generator = ContentGenerator::new(Arc::new(client));
//!     let orchestrator =
//!         Orchestrator::from_config(&config, store, generator, ProgressTracker::shared())?;
//!     let today = chrono::Utc::now().date_naive();
//!     let summary = orchestrator.run(RunRequest::full(today, RunTrigger::Manual)).await?;
//!     println!("published {}", summary.published);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod publisher;
pub mod scheduler;
pub mod storage;
pub mod topics;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{DailypressErrorTrait, Error, ErrorCategory, Result};
    pub use crate::llm::ContentGenerator;
    pub use crate::models::{ContentArtifact, ScheduleSlot, SiteProfile, SlotKey, SlotStatus, Topic};
    pub use crate::orchestrator::{
        Orchestrator, ProgressTracker, RunRequest, RunScope, RunSummary, RunTrigger,
    };
    pub use crate::storage::{MemoryStore, SharedStore, SqliteStore};
    pub use crate::topics::{TopicPool, TopicSelector};
}

pub use models::{ContentArtifact, ScheduleSlot, SlotKey, SlotStatus};
