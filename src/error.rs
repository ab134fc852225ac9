//! Unified error handling for the dailypress crate
//!
//! Each layer keeps its own error enum; this module folds them into a single
//! [`Error`] for code that crosses module boundaries. The HTTP surface turns
//! it into a status code and the daemon logs failed jobs by category.

use thiserror::Error;

pub use crate::llm::GenerationError;
pub use crate::orchestrator::OrchestratorError;
pub use crate::publisher::PublishError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::storage::StoreError;

/// Common trait for dailypress error types
pub trait DailypressErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Generation backend or publishing platform unreachable
    Network,
    /// Storage and I/O errors
    Storage,
    /// Generation service errors
    Llm,
    /// Publishing platform errors
    Platform,
    /// Configuration errors
    Config,
    /// Another run holds the single-run guard
    Conflict,
    /// Scheduler and run coordination errors
    Scheduler,
    /// Malformed caller input
    Input,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Llm => "llm",
            Self::Platform => "platform",
            Self::Config => "config",
            Self::Conflict => "conflict",
            Self::Scheduler => "scheduler",
            Self::Input => "input",
        }
    }
}

/// Unified error type for the dailypress crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DailypressErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(e) => !e.is_persistence_failure(),
            Self::Generation(e) => e.is_transient(),
            Self::Publish(e) => e.is_transient(),
            // the next trigger gets another chance
            Self::Orchestrator(OrchestratorError::RunInProgress) => true,
            Self::Orchestrator(OrchestratorError::Persistence(_)) => false,
            Self::Scheduler(e) => e.is_recoverable(),
            Self::InvalidInput(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(_) => ErrorCategory::Storage,
            Self::Generation(GenerationError::Config(_)) => ErrorCategory::Config,
            Self::Generation(GenerationError::Transient(_)) => ErrorCategory::Network,
            Self::Generation(_) => ErrorCategory::Llm,
            Self::Publish(PublishError::Transient(_)) => ErrorCategory::Network,
            Self::Publish(PublishError::MissingCredentials(_)) => ErrorCategory::Config,
            Self::Publish(_) => ErrorCategory::Platform,
            Self::Orchestrator(OrchestratorError::RunInProgress) => ErrorCategory::Conflict,
            Self::Orchestrator(OrchestratorError::Persistence(_)) => ErrorCategory::Storage,
            Self::Scheduler(SchedulerError::TriggerConfigError { .. }) => ErrorCategory::Config,
            Self::Scheduler(SchedulerError::StoreError { .. }) => ErrorCategory::Storage,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::InvalidInput(_) => ErrorCategory::Input,
        }
    }
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
