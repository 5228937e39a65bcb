//! Domain errors for the peer validation engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the validation engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Cannot form quorum: {available} eligible validator(s), {required} required")]
    InsufficientValidators { required: usize, available: usize },

    #[error("Validator not found: {0}")]
    ValidatorNotFound(Uuid),

    #[error("Evaluation not found for submission {submission_id} and validator {validator_id}")]
    EvaluationNotFound { submission_id: Uuid, validator_id: Uuid },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
