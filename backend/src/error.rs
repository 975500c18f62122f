//! Error handling for the warehouse backend
//!
//! Domain failures keep their kind all the way to the response so that clients can
//! tell bad input, conflicts, missing entities and server faults apart.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    // Business rule errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // A unique index rejecting a racing insert is the same conflict the pre-check reports.
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or_default();
                let resource = resource_for_constraint(constraint);
                return AppError::Domain(DomainError::conflict(
                    resource,
                    conflict_message(resource, constraint),
                ));
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Domain(shared::first_field_error(&errors))
    }
}

fn resource_for_constraint(constraint: &str) -> &'static str {
    match constraint {
        c if c.starts_with("containers_") => "container",
        c if c.starts_with("requisitions_") => "requisition",
        c if c.starts_with("batchlabels_") => "batchlabel",
        c if c.starts_with("stickers_") => "sticker",
        c if c.starts_with("rm_batches_") => "rm_batch",
        _ => "record",
    }
}

fn conflict_message(resource: &str, constraint: &str) -> String {
    if constraint.ends_with("_name_key") {
        format!("{} name already in use", resource)
    } else {
        format!("{} already exists", resource)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            value: None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AppError::Domain(DomainError::Validation { .. }) => StatusCode::BAD_REQUEST,
            AppError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Conflict { .. }) => StatusCode::CONFLICT,
            AppError::Domain(DomainError::InvalidState(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Unauthorized(msg) => ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            AppError::InsufficientPermissions(permission) => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                format!("Permission denied: requires {}", permission),
            ),
            AppError::Domain(err) => {
                let mut detail = ErrorDetail::new(err.code(), err.to_string());
                match err {
                    DomainError::Validation { field, value, .. } => {
                        detail.field = Some(field.clone());
                        detail.value = value.clone();
                    }
                    DomainError::Conflict { resource, .. }
                    | DomainError::NotFound { resource, .. } => {
                        detail.field = Some(resource.clone());
                    }
                    DomainError::InvalidState(_) => {}
                }
                detail
            }
            AppError::DatabaseError(_) => {
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::InternalError(_) => {
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_distinct_statuses() {
        let cases = [
            (
                DomainError::validation("quantity", "must be greater than zero", 0),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::conflict("container", "container not empty"),
                StatusCode::CONFLICT,
            ),
            (
                DomainError::invalid_state("cannot mark an empty container full"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (DomainError::not_found("sticker", "B1-00001"), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_detail_carries_field_and_value() {
        let err = AppError::from(DomainError::validation("product_id", "product not exists", "42"));
        let detail = err.detail();
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert_eq!(detail.field.as_deref(), Some("product_id"));
        assert_eq!(detail.value.as_deref(), Some("42"));
    }

    #[test]
    fn test_database_error_is_server_fault() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail().code, "DATABASE_ERROR");
    }

    #[test]
    fn test_constraint_names_map_to_resources() {
        assert_eq!(resource_for_constraint("containers_plant_code_key"), "container");
        assert_eq!(resource_for_constraint("stickers_plant_barcode_key"), "sticker");
        assert_eq!(resource_for_constraint("rm_batches_plant_batch_number_key"), "rm_batch");
        assert_eq!(resource_for_constraint("something_else"), "record");
    }

    #[test]
    fn test_name_constraint_reported_as_name_conflict() {
        assert_eq!(
            conflict_message("container", "containers_plant_name_key"),
            "container name already in use"
        );
        assert_eq!(
            conflict_message("container", "containers_plant_code_key"),
            "container already exists"
        );
    }

    #[test]
    fn test_response_body_shape() {
        let response =
            AppError::from(DomainError::not_found("container", "PAL-404")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes =
            tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "container not found: PAL-404");
        assert_eq!(body["error"]["field"], "container");
        assert!(body["error"].get("value").is_none());
    }
}
