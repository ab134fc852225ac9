//! End-to-end tests of the publishing pipeline
//!
//! - Planned slot → generate → store → publish
//! - Stalled slot recovery
//! - Store failures and generator/platform errors

pub mod error_scenarios;
pub mod fixtures;
pub mod pipeline_test;
pub mod recovery_test;
