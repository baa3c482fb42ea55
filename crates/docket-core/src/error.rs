//! Error types for the ruling pipeline
//!
//! `RulingError` is the orchestrator's error surface; the narrower enums belong
//! to the collaborators and convert into it.

use thiserror::Error;

use crate::model::{CaseId, UserId};

/// Errors surfaced by a ruling operation
#[derive(Error, Debug)]
pub enum RulingError {
    /// Case absent or owned by another user
    #[error("Case {0} not found")]
    NotFound(CaseId),

    /// Admission denied by the per-user token bucket
    #[error("Rate limit exceeded for user {0}")]
    RateLimited(UserId),

    /// Completion service failed or returned nothing
    #[error("Upstream completion error: {0}")]
    Upstream(String),

    /// Completion payload was not valid JSON
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    /// Completion payload parsed but required fields were missing or invalid
    #[error("Incomplete completion response: {0}")]
    IncompleteResponse(String),

    /// Repository failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RulingError {
    /// Stable short code used in API payloads and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            RulingError::NotFound(_) => "not_found",
            RulingError::RateLimited(_) => "rate_limited",
            RulingError::Upstream(_) => "upstream_error",
            RulingError::MalformedResponse(_) => "malformed_response",
            RulingError::IncompleteResponse(_) => "incomplete_response",
            RulingError::Storage(_) => "storage_error",
        }
    }

    /// Whether the failure came from the completion service boundary
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            RulingError::Upstream(_)
                | RulingError::MalformedResponse(_)
                | RulingError::IncompleteResponse(_)
        )
    }
}

/// Errors from the completion client and response validator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Incomplete(String),
}

impl CompletionError {
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Upstream(_) => "upstream_error",
            CompletionError::Malformed(_) => "malformed_response",
            CompletionError::Incomplete(_) => "incomplete_response",
        }
    }
}

impl From<CompletionError> for RulingError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Upstream(msg) => RulingError::Upstream(msg),
            CompletionError::Malformed(msg) => RulingError::MalformedResponse(msg),
            CompletionError::Incomplete(msg) => RulingError::IncompleteResponse(msg),
        }
    }
}

/// Repository errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Referenced record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Uniqueness constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend I/O or engine failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid component configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for ruling operations
pub type Result<T> = std::result::Result<T, RulingError>;

/// Result type alias for repository operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
