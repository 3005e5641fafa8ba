//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! The HTTP mapping lives in `api::error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Input failed validation
    #[error("{0}")]
    Validation(String),
    /// Uniqueness or duplicate-state conflict
    #[error("{0}")]
    Conflict(String),
    /// Missing or bad credentials
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),
    /// Paid resource accessed without payment
    #[error("{0}")]
    PaymentRequired(String),
    /// Operation not allowed in the entity's current state
    #[error("{0}")]
    InvalidState(String),
    /// Database/persistence error
    #[error("Database error: {0}")]
    Database(String),
    /// External service error
    #[error("External service error: {0}")]
    External(String),
    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

// Conversion from SeaORM errors (used in infrastructure and services)
impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<sea_orm::TransactionError<AppError>> for AppError {
    fn from(e: sea_orm::TransactionError<AppError>) -> Self {
        match e {
            sea_orm::TransactionError::Connection(db) => AppError::from(db),
            sea_orm::TransactionError::Transaction(inner) => inner,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }
}
