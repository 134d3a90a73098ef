//! Gateway error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// `WWW-Authenticate` value attached to every 401.
pub const WWW_AUTHENTICATE_BEARER: &str = "Bearer realm=\"storefront-api\", error=\"invalid_token\"";

/// Gateway error type.
///
/// Maps to HTTP status codes:
/// - Database, Crypto, Internal: 500 Internal Server Error
/// - InvalidToken, InvalidCredentials: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Database(_) | GatewayError::Crypto(_) | GatewayError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::InvalidToken(_) | GatewayError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

/// JSON error body: `{"message": ..., "details": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            GatewayError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "gateway.database", error = %err, "Database operation failed");
                ErrorResponse::new("An internal database error occurred")
            }
            GatewayError::Crypto(err) => {
                tracing::error!(target: "gateway.crypto", error = %err, "Cryptographic operation failed");
                ErrorResponse::new("An internal error occurred")
            }
            GatewayError::InvalidToken(reason) => ErrorResponse::new(reason),
            GatewayError::InvalidCredentials => ErrorResponse::new("Invalid email or password."),
            GatewayError::BadRequest(reason) => ErrorResponse {
                message: "Invalid request".to_string(),
                details: Some(reason),
            },
            GatewayError::NotFound(resource) => ErrorResponse::new(resource),
            GatewayError::Conflict(reason) => ErrorResponse::new(reason),
            GatewayError::Internal => ErrorResponse::new("An internal error occurred"),
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_BEARER),
            );
        }

        response
    }
}

/// Convert sqlx errors to GatewayError
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        GatewayError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            GatewayError::Database("connection failed".to_string()).to_string(),
            "Database error: connection failed"
        );
        assert_eq!(
            GatewayError::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
        assert_eq!(GatewayError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::Database(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::Crypto(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::InvalidToken(String::new()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::BadRequest(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::NotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_database_error_hides_details() {
        let response =
            GatewayError::Database("relation \"users\" does not exist".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "An internal database error occurred");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_carries_www_authenticate() {
        let response = GatewayError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            WWW_AUTHENTICATE_BEARER
        );

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "Invalid email or password.");
    }

    #[tokio::test]
    async fn test_bad_request_includes_details() {
        let response = GatewayError::BadRequest("email is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "Invalid request");
        assert_eq!(body["details"], "email is required");
    }

    #[tokio::test]
    async fn test_conflict_passes_message_through() {
        let response =
            GatewayError::Conflict("Email or contact already exists".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "Email or contact already exists");
    }
}
