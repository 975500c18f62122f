//! Domain error taxonomy

use std::fmt::Display;

use thiserror::Error;

/// Business-rule failures raised before any write is attempted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input, including failed reference checks
    #[error("Validation error on {field}: {reason}")]
    Validation {
        field: String,
        reason: String,
        value: Option<String>,
    },

    /// Uniqueness violation or an occupied/consumed resource
    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// Illegal state transition
    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    /// Entity absent or outside the caller's plant
    #[error("{resource} not found: {key}")]
    NotFound { resource: String, key: String },
}

impl DomainError {
    pub fn validation(
        field: impl Into<String>,
        reason: impl Into<String>,
        value: impl Display,
    ) -> Self {
        DomainError::Validation {
            field: field.into(),
            reason: reason.into(),
            value: Some(value.to_string()),
        }
    }

    /// Validation failure where there is no single offending value (e.g. an empty list)
    pub fn missing(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            reason: reason.into(),
            value: None,
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        DomainError::InvalidState(message.into())
    }

    pub fn not_found(resource: impl Into<String>, key: impl Display) -> Self {
        DomainError::NotFound {
            resource: resource.into(),
            key: key.to_string(),
        }
    }

    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::Conflict { .. } => "CONFLICT",
            DomainError::InvalidState(_) => "INVALID_STATE",
            DomainError::NotFound { .. } => "NOT_FOUND",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
