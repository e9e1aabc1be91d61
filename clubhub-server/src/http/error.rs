//! API error types with IntoResponse
//!
//! Errors are converted to enveloped JSON with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clubhub_core::RoleDenied;

use super::response::Envelope;
use crate::auth::AuthError;
use crate::db::repos::DbError;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Request is well-formed but not allowed in the current state (400)
    BadRequest(String),

    /// Missing or invalid credentials (401)
    Unauthorized(&'static str),

    /// Authenticated but not permitted (403)
    Forbidden(String),

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(message: impl ToString) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match self {
            Self::Validation(e) => e.to_string(),
            Self::BadRequest(msg) | Self::Forbidden(msg) => msg,
            Self::Unauthorized(msg) => msg.to_string(),
            Self::NotFound { resource, id } => format!("{} '{}' not found", resource, id),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!(error = %e, "database error");
                "an internal error occurred".to_string()
            }
            Self::Internal { message } => {
                tracing::error!(error = %message, "internal error");
                "an internal error occurred".to_string()
            }
        };

        (status, Json(Envelope::failure(status.as_u16(), msg))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(reason) => Self::BadRequest(reason.to_string()),
            DbError::Sqlx(_) => Self::Database(e),
        }
    }
}

impl From<RoleDenied> for ApiError {
    fn from(e: RoleDenied) -> Self {
        Self::Forbidden(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let (status, body) = body_json(ApiError::Validation(ValidationError::Empty { field: "name" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert_eq!(body["msg"], "name cannot be empty");
        assert_eq!(body["status"], false);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, body) = body_json(DbError::not_found("club", 9).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "club '9' not found");
    }

    #[tokio::test]
    async fn conflict_is_400() {
        let (status, body) = body_json(DbError::Conflict("already signed in").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "already signed in");
    }

    #[tokio::test]
    async fn role_denied_is_403() {
        let (status, body) = body_json(RoleDenied::LeaderRequiresAdmin.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 403);
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = body_json(ApiError::internal("disk on fire")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["msg"], "an internal error occurred");
    }
}
