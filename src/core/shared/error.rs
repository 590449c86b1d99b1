use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::Serialize;

use crate::core::storage::StoreError;
use crate::security::validation::ValidationError;

/// One entry of a `400 {errors: [...]}` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: Vec<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            path: vec![field.to_string()],
            message: message.into(),
        }
    }
}

impl From<ValidationError> for FieldError {
    fn from(err: ValidationError) -> Self {
        Self::new(err.field(), err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid credentials")]
    BadCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{context}")]
    Internal { context: String, detail: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Adapter for `map_err`: keeps the client-facing context, logs the store detail.
    /// A dangling foreign key is the client's fault and becomes a 400.
    pub fn internal(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |err| match err {
            StoreError::InvalidReference(constraint) => {
                warn!("{context}: foreign key {constraint} violated");
                ApiError::BadRequest("Referenced record does not exist".to_string())
            }
            other => ApiError::Internal {
                context: context.to_string(),
                detail: other.to_string(),
            },
        }
    }

    pub fn unexpected(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            context: context.to_string(),
            detail: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::BadCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Vec<ValidationError>> for ApiError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors.into_iter().map(FieldError::from).collect())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation(errors) => {
                (status, Json(serde_json::json!({ "errors": errors }))).into_response()
            }
            Self::Internal { context, detail } => {
                error!("{context}: {detail}");
                (status, Json(serde_json::json!({ "message": context }))).into_response()
            }
            other => {
                let message = other.to_string();
                (status, Json(serde_json::json!({ "message": message }))).into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::BadCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("gone").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("dup").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Validation(Vec::new()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_hides_detail() {
        let err = ApiError::internal("Failed to retrieve CSPs")(StoreError::Query(
            "relation \"csps\" does not exist".into(),
        ));
        assert_eq!(err.to_string(), "Failed to retrieve CSPs");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_dangling_reference_is_a_bad_request() {
        let err = ApiError::internal("Failed to create alert")(StoreError::InvalidReference(
            "alerts_transaction_id_fkey".into(),
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Referenced record does not exist");
    }

    #[test]
    fn test_validation_errors_carry_field_path() {
        let err: ApiError = vec![ValidationError::Required("email".into())].into();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors[0].path, vec!["email".to_string()]);
                assert_eq!(errors[0].message, "Field 'email' is required");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
