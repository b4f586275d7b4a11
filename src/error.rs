//! # Error Handling
//!
//! Core error type for the billing operations. Every variant carries a stable
//! SCREAMING_SNAKE_CASE code that the admin facade puts on the wire.

use thiserror::Error;

use crate::billing_provider::ProviderError;

/// Maximum length (in characters) of an error message persisted on a row.
pub const MAX_STORED_ERROR_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Input rejected before any side effect
    #[error("{0}")]
    Validation(String),

    /// Operation not allowed in the entity's current lifecycle state
    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("database error: {0}")]
    Database(sea_orm::DbErr),

    /// Stored data could not be decoded
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            BillingError::Validation(_) => "VALIDATION_FAILED",
            BillingError::InvalidState(_) => "INVALID_STATE",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Conflict(_) => "CONFLICT",
            BillingError::Provider(_) => "PROVIDER_ERROR",
            BillingError::Database(_) => "DATABASE_ERROR",
            BillingError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for BillingError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::Conflict("Resource already exists".to_string());
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                Self::NotFound(format!("Record not found: {record}"))
            }
            other => {
                tracing::error!(error = ?other, "Database error");
                Self::Database(other)
            }
        }
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(format!("malformed stored document: {error}"))
    }
}

/// Whether a database error is a unique/primary key violation on any of the
/// supported backends.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}

/// Trim an error message to a bounded number of characters without splitting
/// a UTF-8 sequence.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let truncated: String = message.chars().take(max_chars).collect();
    format!("{truncated}...")
}
