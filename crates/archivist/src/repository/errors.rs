use sea_orm::DbErr;
use thiserror::Error;

/// Errors that can occur during archive store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Record not found.
    #[error("Record not found: {context}")]
    NotFound { context: String },

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepositoryError {
    /// Whether retrying the same operation may succeed (lock contention,
    /// dropped connections).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(db_err) => is_retryable_db_error(db_err),
            _ => false,
        }
    }
}

pub(crate) fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked, busy
            // PostgreSQL: connection refused, too many connections
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Result type alias for archive store operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_database_error_from_db_err() {
        let err: RepositoryError = DbErr::RecordNotFound("x".to_string()).into();
        assert!(err.to_string().contains("Database error"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_locked_database_is_retryable() {
        let err = RepositoryError::Database(DbErr::Exec(RuntimeErr::Internal(
            "database is locked".to_string(),
        )));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_constraint_violation_is_not_retryable() {
        let err = RepositoryError::Database(DbErr::Exec(RuntimeErr::Internal(
            "UNIQUE constraint failed: messages.message_id".to_string(),
        )));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_input_is_not_retryable() {
        let err = RepositoryError::InvalidInput {
            message: "bad".to_string(),
        };
        assert!(err.to_string().contains("Invalid input"));
        assert!(!err.is_retryable());
    }
}
