//! Error taxonomy for the domain layer.
//!
//! Validation and state-machine failures carry enough context for the
//! caller to correct input and are never retried automatically. Store
//! failures during a scheduler tick are caught per family and logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or missing input, e.g. a non-positive amount.
    #[error("validation error: {0}")]
    Validation(String),

    /// The phone number already identifies a principal elsewhere.
    #[error("phone number {0} is already registered")]
    DuplicatePhone(String),

    /// Family, child, task or payment request absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Expense category not active for the child.
    #[error("category {0} is not available for this child")]
    InvalidCategory(String),

    /// OTP expired, missing or mismatched.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Payment-request state machine violation.
    #[error("payment request is not pending (status: {0})")]
    NotPending(String),

    /// Underlying persistence failure.
    #[error("store unavailable: {0}")]
    Store(String),
}

impl DomainError {
    /// Machine-readable kind, used in wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "ValidationError",
            DomainError::DuplicatePhone(_) => "DuplicatePhone",
            DomainError::NotFound(_) => "NotFound",
            DomainError::InvalidCategory(_) => "InvalidCategory",
            DomainError::Auth(_) => "AuthError",
            DomainError::NotPending(_) => "NotPending",
            DomainError::Store(_) => "StoreUnavailable",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
