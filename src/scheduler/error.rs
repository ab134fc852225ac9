//! Error types for the scheduler module

use std::fmt;

use crate::storage::StoreError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Trigger configuration error
    TriggerConfigError { field: String, reason: String },

    /// Week pre-population failed
    PlanningFailed { week_start: String, reason: String },

    /// A triggered job returned an error
    JobFailed { job: String, reason: String },

    /// A triggered job panicked
    JobPanicked { job: String },

    /// Store error
    StoreError { operation: String, reason: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TriggerConfigError { field, reason } => {
                write!(f, "Trigger config error in '{}': {}", field, reason)
            }
            Self::PlanningFailed { week_start, reason } => {
                write!(f, "Failed to plan week {}: {}", week_start, reason)
            }
            Self::JobFailed { job, reason } => {
                write!(f, "Job '{}' failed: {}", job, reason)
            }
            Self::JobPanicked { job } => {
                write!(f, "Job '{}' panicked", job)
            }
            Self::StoreError { operation, reason } => {
                write!(f, "Store error during '{}': {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        Self::StoreError {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn planning_failed(week_start: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::PlanningFailed {
            week_start: week_start.to_string(),
            reason: reason.into(),
        }
    }

    pub fn job_failed(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::JobFailed {
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// Create a store error with context
    pub fn store(operation: impl Into<String>, err: StoreError) -> Self {
        Self::StoreError {
            operation: operation.into(),
            reason: err.to_string(),
        }
    }

    /// Whether the daemon can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PlanningFailed { .. }
                | Self::JobFailed { .. }
                | Self::JobPanicked { .. }
                | Self::StoreError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_config_error() {
        let err = SchedulerError::trigger_config("nightly_time", "Expected HH:MM");
        assert!(err.to_string().contains("nightly_time"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_job_errors_are_recoverable() {
        assert!(SchedulerError::job_failed("nightly", "boom").is_recoverable());
        assert!(SchedulerError::JobPanicked {
            job: "weekly".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_from_store_error() {
        let err: SchedulerError = StoreError::Unavailable("locked".into()).into();
        assert!(matches!(err, SchedulerError::StoreError { .. }));
        assert!(err.to_string().contains("locked"));
    }
}
