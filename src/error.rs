//! # Error Handling
//!
//! Error types shared by the repositories and engine components. Repository
//! failures wrap SeaORM errors; engine errors add the workflow vocabulary
//! (illegal transitions, exhausted limits) that callers surface to users.

use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by the data-access layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    /// Wrap a SeaORM error (usable directly in `map_err`).
    pub fn database_error(error: DbErr) -> Self {
        Self::Database(error)
    }

    /// Build a validation error from a message.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is a unique-constraint violation from a concurrent insert.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(err) => is_unique_violation(err),
            _ => false,
        }
    }
}

/// Errors raised by engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("cannot {action} {entity} in status '{from}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(entity: &'static str, from: impl Into<String>, action: &'static str) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.into(),
            action,
        }
    }

    /// Stable machine-readable code (SCREAMING_SNAKE_CASE).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Repository(RepositoryError::NotFound(_)) | Self::NotFound { .. } => "NOT_FOUND",
            Self::Repository(RepositoryError::Validation(_)) | Self::Validation(_) => {
                "VALIDATION_FAILED"
            }
            Self::Repository(_) => "DATABASE_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::LimitExceeded(_) => "LIMIT_EXCEEDED",
        }
    }
}

impl From<DbErr> for EngineError {
    fn from(error: DbErr) -> Self {
        Self::Repository(RepositoryError::Database(error))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        Self::Repository(RepositoryError::Serialization(error))
    }
}

/// Detect unique-constraint violations across Postgres and SQLite.
pub fn is_unique_violation(error: &DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code_str = code.as_ref();
        code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(EngineError::not_found("penalty", "x").code(), "NOT_FOUND");
        assert_eq!(
            EngineError::invalid_transition("bonus", "rejected", "approve").code(),
            "INVALID_TRANSITION"
        );
        assert_eq!(
            EngineError::Validation("bad".to_string()).code(),
            "VALIDATION_FAILED"
        );
        assert_eq!(
            EngineError::from(RepositoryError::validation_error("bad")).code(),
            "VALIDATION_FAILED"
        );
    }

    #[test]
    fn test_invalid_transition_message_names_state() {
        let err = EngineError::invalid_transition("bonus", "rejected", "approve");
        assert_eq!(err.to_string(), "cannot approve bonus in status 'rejected'");
    }

    #[test]
    fn test_non_sqlx_errors_are_not_unique_violations() {
        let err = DbErr::RecordNotFound("missing".to_string());
        assert!(!is_unique_violation(&err));
        assert!(!RepositoryError::database_error(err).is_unique_violation());
    }
}
