//! Repository errors
//!
//! Every repository returns [`RepositoryResult`]; the scheduling store
//! converts failures into [`OpError`] at the crate boundary.

use op_core::{Id, OpError};

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {entity} {id}")]
    NotFound { entity: &'static str, id: Id },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Conflict on {entity} {id}: {message}")]
    Conflict {
        entity: &'static str,
        id: Id,
        message: String,
    },
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn work_package_not_found(id: Id) -> Self {
        RepositoryError::NotFound {
            entity: "WorkPackage",
            id,
        }
    }
}

impl From<RepositoryError> for OpError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => OpError::NotFound {
                entity,
                field: "id",
                value: id.to_string(),
            },
            RepositoryError::Database(e) => OpError::Database(e.to_string()),
            RepositoryError::InvalidRow(message) => OpError::Internal(message),
            RepositoryError::Conflict {
                entity,
                id,
                message,
            } => OpError::Conflict {
                entity,
                id,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_keeps_entity_and_id() {
        let err: OpError = RepositoryError::work_package_not_found(7).into();
        assert_eq!(err.error_code(), "not_found");
        assert_eq!(err.to_string(), "Not found: WorkPackage with id=7");
    }

    #[test]
    fn test_conflict_maps_to_op_conflict() {
        let err: OpError = RepositoryError::Conflict {
            entity: "WorkPackage",
            id: 3,
            message: "lock version moved".to_string(),
        }
        .into();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_driver_errors_map_to_database() {
        let err: OpError = RepositoryError::from(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.error_code(), "database_error");
    }
}
