//! Time-driven scheduling
//!
//! Three triggers drive the pipeline without operator involvement:
//!
//! ```text
//!   weekly  (Sun 22:00) ──► WeekPlanner::populate_week(next Monday)
//!   nightly (03:00)     ──► Orchestrator::run(today, full)
//!   recovery(+6h)       ──► RecoveryPass::run(today)
//!                              │
//!                              ├─ stalled `generating` → `failed`
//!                              └─ Orchestrator::run(today, restricted)
//! ```
//!
//! All times are wall-clock in the configured fixed UTC offset.
//!
//! # Modules
//!
//! - [`trigger`] - Trigger configuration and next-fire arithmetic
//! - [`planner`] - Weekly slot planning through the topic selector
//! - [`recovery`] - Stalled slot reclassification and retry run
//! - [`daemon`] - The trigger loop
//! - [`error`] - Scheduler error types

pub mod daemon;
pub mod error;
pub mod planner;
pub mod recovery;
pub mod trigger;

pub use daemon::{Daemon, Jobs};
pub use error::{SchedulerError, SchedulerResult};
pub use planner::{PlanReport, WeekPlanner};
pub use recovery::{RecoveryPass, RecoveryReport, STALLED_ERROR};
pub use trigger::{TriggerClock, TriggerConfig, TriggerConfigBuilder, TriggerKind, TriggerStatus};
