//! Domain error taxonomy.

use thiserror::Error;

/// Errors produced by the tracking core.
///
/// Every service operation returns one of these kinds; the HTTP layer maps
/// them onto status codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown device, command, geofence or alert id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A state-machine rule forbids the requested transition.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Concurrent modification or an operation blocked by related state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller is authenticated but not allowed to act on the target.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The store (or the device lock) did not answer within the bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Unexpected storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Short machine-readable kind used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::InvalidStateTransition(_) => "invalid_state_transition",
            DomainError::Conflict(_) => "conflict",
            DomainError::Validation(_) => "validation_error",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Timeout(_) => "timeout",
            DomainError::Storage(_) => "storage_error",
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.as_ref().map(|m| m.to_string()).unwrap_or_default()
                    )
                })
            })
            .collect();
        DomainError::Validation(messages.join(", "))
    }
}

impl From<validator::ValidationError> for DomainError {
    fn from(err: validator::ValidationError) -> Self {
        DomainError::Validation(
            err.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string()),
        )
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
