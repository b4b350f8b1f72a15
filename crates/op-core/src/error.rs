//! Core error types for OpenProject RS
//!
//! Errors raised by collaborators (stores, loaders) that the scheduling
//! engine wraps into its own error taxonomy.

use thiserror::Error;

use crate::traits::Id;

/// Core error type for all OpenProject operations
#[derive(Error, Debug)]
pub enum OpError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Optimistic locking failure: the stored lock version moved on since load
    #[error("Conflict on {entity} {id}: {message}")]
    Conflict {
        entity: &'static str,
        id: Id,
        message: String,
    },
}

impl OpError {
    /// Shorthand for a missing work package
    pub fn work_package_not_found(id: Id) -> Self {
        OpError::NotFound {
            entity: "WorkPackage",
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OpError::Conflict { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            OpError::NotFound { .. } => "not_found",
            OpError::Database(_) => "database_error",
            OpError::Internal(_) => "internal_error",
            OpError::Config(_) => "configuration_error",
            OpError::Conflict { .. } => "conflict",
        }
    }
}
