use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

tokio::task_local! {
    /// Id assigned by `request_id_middleware` for the request being served.
    pub static REQUEST_ID: String;
}

/// Id of the request in scope, or a fresh one outside any request.
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(|id| id.clone())
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

/// Error body returned on every non-2xx response.
///
/// `error` carries the human-readable message; the remaining fields let
/// clients branch on a stable code and correlate with server logs.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub status: u16,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing session token")]
    MissingSessionToken,

    #[error("HTTPS required")]
    HttpsRequired,

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited { retry_after: u64 },

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::MissingSessionToken | AppError::HttpsRequired => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Computation(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_body(&self, request_id: &str) -> ErrorBody {
        let (code, message) = match self {
            AppError::ValidationError(detail) => ("VALIDATION_ERROR", detail.clone()),
            AppError::MissingSessionToken => (
                "MISSING_SESSION_TOKEN",
                "X-Session-Token header is required".to_string(),
            ),
            AppError::HttpsRequired => (
                "HTTPS_REQUIRED",
                "Requests must be made over HTTPS".to_string(),
            ),
            AppError::PayloadTooLarge(detail) => ("PAYLOAD_TOO_LARGE", detail.clone()),
            AppError::RateLimited { retry_after } => (
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            ),
            // Numeric detail stays in the log; clients get a generic message.
            AppError::Computation(_) => (
                "COMPUTATION_ERROR",
                "Prediction could not be computed".to_string(),
            ),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error".to_string()),
        };

        ErrorBody {
            error: message,
            code: code.to_string(),
            status: self.status().as_u16(),
            request_id: request_id.to_string(),
            retry_after: match self {
                AppError::RateLimited { retry_after } => Some(*retry_after),
                _ => None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Computation(_) | AppError::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }

        let request_id = current_request_id();
        let body = self.to_error_body(&request_id);

        let mut response = (self.status(), Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("X-Request-Id", value);
        }
        if let AppError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
        }
        response
    }
}
