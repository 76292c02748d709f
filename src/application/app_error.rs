use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    /// Malformed or unverifiable provider event; rejected at the boundary,
    /// never retried automatically.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    /// A conditional write lost the race. Recovered locally via bounded
    /// retry with a fresh read before it ever reaches a caller.
    #[error("Concurrent update conflict")]
    ConcurrencyConflict,

    /// Retry budget exhausted while applying a billing event. The event is
    /// NOT marked processed, so provider redelivery can retry it safely.
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            other => AppError::Database(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidEvent,
    InvalidInput,
    NotFound,
    Conflict,
    ReconciliationFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidEvent => "INVALID_EVENT",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ReconciliationFailed => "RECONCILIATION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
