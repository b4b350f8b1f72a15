//! Scheduling errors
//!
//! Every variant names the work packages it concerns so callers can surface
//! them next to the edit that triggered the pass.

use op_core::{Id, OpError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The calendar cannot be used for date arithmetic; nothing is persisted
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Scheduling relations or the hierarchy loop back on themselves
    #[error("Cycle detected while scheduling work packages {ids:?}")]
    CycleDetected { ids: Vec<Id> },

    /// Another pass wrote the work package after it was loaded
    #[error("Work package {id} was modified concurrently (expected lock version {expected})")]
    ConcurrentModification { id: Id, expected: i32 },

    #[error(transparent)]
    Store(#[from] OpError),
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;

impl SchedulingError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SchedulingError::Configuration {
            message: message.into(),
        }
    }

    /// Ids of the work packages the error is about
    pub fn work_package_ids(&self) -> Vec<Id> {
        match self {
            SchedulingError::CycleDetected { ids } => ids.clone(),
            SchedulingError::ConcurrentModification { id, .. } => vec![*id],
            SchedulingError::Store(OpError::Conflict { id, .. }) => vec![*id],
            SchedulingError::Configuration { .. } | SchedulingError::Store(_) => vec![],
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SchedulingError::Configuration { .. } => "configuration_error",
            SchedulingError::CycleDetected { .. } => "cycle_detected",
            SchedulingError::ConcurrentModification { .. } => "concurrent_modification",
            SchedulingError::Store(err) => err.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_reported() {
        let err = SchedulingError::CycleDetected { ids: vec![3, 4] };
        assert_eq!(err.work_package_ids(), vec![3, 4]);
        assert_eq!(err.error_code(), "cycle_detected");

        let err = SchedulingError::ConcurrentModification { id: 9, expected: 2 };
        assert_eq!(err.work_package_ids(), vec![9]);
        assert!(err.to_string().contains("expected lock version 2"));
    }

    #[test]
    fn test_store_errors_keep_their_code() {
        let err: SchedulingError = OpError::work_package_not_found(1).into();
        assert_eq!(err.error_code(), "not_found");
        assert!(err.work_package_ids().is_empty());
    }
}
