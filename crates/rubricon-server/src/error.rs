//! API error type and its mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rubricon_core::error::{
    AttemptStateError, ItemLifecycleError, ReportError, RubricScoreError, ScoringError,
};
use rubricon_store::StoreError;
use serde::Serialize;

use crate::envelope::FieldError;

/// Everything a handler can fail with; each variant pins a status code.
#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::message(message)])
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            ApiError::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, errors),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, vec![FieldError::message(msg)]),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, vec![FieldError::message(msg)])
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, vec![FieldError::message(msg)]),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, vec![FieldError::message(msg)]),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec![FieldError::message("internal server error")],
                )
            }
        };
        let body = ErrorEnvelope {
            success: false,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::UniqueViolation { .. } => ApiError::Conflict(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        ApiError::invalid(e.to_string())
    }
}

impl From<RubricScoreError> for ApiError {
    fn from(e: RubricScoreError) -> Self {
        ApiError::invalid(e.to_string())
    }
}

impl From<ScoringError> for ApiError {
    fn from(e: ScoringError) -> Self {
        ApiError::invalid(e.to_string())
    }
}

impl From<ItemLifecycleError> for ApiError {
    fn from(e: ItemLifecycleError) -> Self {
        ApiError::invalid(e.to_string())
    }
}

impl From<AttemptStateError> for ApiError {
    fn from(e: AttemptStateError) -> Self {
        ApiError::invalid(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let err: ApiError = StoreError::not_found("item", "abc").into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn unique_violations_map_to_conflict() {
        let err: ApiError = StoreError::UniqueViolation {
            entity: "item",
            key: "RC-001".into(),
        }
        .into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn domain_errors_become_validation_failures() {
        let err: ApiError = ReportError::NoSections.into();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].field.is_none());
            }
            other => panic!("expected validation, got {other:?}"),
        }
    }
}
