use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Malformed email, empty list, size limit exceeded or missing job ID.
    /// Never retried.
    InvalidInput(String),
    /// Non-2xx response from the validation API (after retries for 429).
    RemoteApi {
        /// Operation name used in the generic message (e.g. "Get job status").
        operation: String,
        /// HTTP status returned by the remote API.
        status_code: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// The request never produced an HTTP response (connect, timeout, decode).
    Transport(String),
    /// The job reached the `failed` state while being waited on.
    JobFailed {
        job_id: String,
        message: String,
        last_status: String,
        elapsed: Duration,
    },
    /// The job reached the `cancelled` state while being waited on.
    JobCancelled {
        job_id: String,
        last_status: String,
        elapsed: Duration,
    },
    /// The wait deadline passed before the job reached a terminal state.
    JobTimeout {
        job_id: String,
        last_status: String,
        elapsed: Duration,
    },
    /// Internal error.
    Internal(String),
}

/// Fixed explanation for the well-known HTTP statuses of the validation API.
pub fn status_explanation(status_code: u16) -> Option<&'static str> {
    match status_code {
        400 => Some("Bad request: check the email format and request parameters"),
        401 => Some("Authentication failed: the API key is missing or invalid"),
        403 => Some("Access forbidden: the current plan does not include this feature"),
        404 => Some("Not found: the job ID may be invalid or the job has expired"),
        422 => Some("Unprocessable request: the payload failed server-side validation"),
        429 => Some("Rate limit exceeded: too many requests, try again later"),
        500 => Some("Validation service internal error"),
        502 => Some("Bad gateway: the validation service is temporarily unreachable"),
        503 => Some("Service unavailable: the validation service is under maintenance"),
        _ => None,
    }
}

/// Human-readable message for a remote failure.
///
/// Mapped statuses get their fixed explanation; anything else falls back to
/// `"<operation> failed: <message> (<code>)"`.
pub fn describe_remote_failure(operation: &str, status_code: u16, message: &str) -> String {
    match status_explanation(status_code) {
        Some(text) => text.to_string(),
        None => format!("{} failed: {} ({})", operation, message, status_code),
    }
}

impl AppError {
    /// Code placed in the `error_code` field of failure records.
    pub fn error_code(&self) -> serde_json::Value {
        match self {
            AppError::InvalidInput(_) => json!("INVALID_INPUT"),
            AppError::RemoteApi { status_code, .. } => json!(status_code),
            AppError::Transport(_) => json!("TRANSPORT_ERROR"),
            AppError::JobFailed { .. } => json!("JOB_FAILED"),
            AppError::JobCancelled { .. } => json!("JOB_CANCELLED"),
            AppError::JobTimeout { .. } => json!("JOB_TIMEOUT"),
            AppError::Internal(_) => json!("INTERNAL_ERROR"),
        }
    }

    /// Whether the caller may reasonably try the same thing again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::JobTimeout { .. } | AppError::Transport(_) => true,
            AppError::RemoteApi { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::RemoteApi {
                operation,
                status_code,
                message,
            } => write!(
                f,
                "{}",
                describe_remote_failure(operation, *status_code, message)
            ),
            AppError::Transport(msg) => write!(f, "Transport error: {}", msg),
            AppError::JobFailed {
                job_id, message, ..
            } => write!(f, "Job {} failed: {}", job_id, message),
            AppError::JobCancelled {
                job_id, elapsed, ..
            } => write!(
                f,
                "Job {} was cancelled after {}s",
                job_id,
                elapsed.as_secs()
            ),
            AppError::JobTimeout {
                job_id,
                last_status,
                elapsed,
            } => write!(
                f,
                "Timed out after {}s waiting for job {} (last status: {})",
                elapsed.as_secs(),
                job_id,
                last_status
            ),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RemoteApi { .. } | AppError::Transport(_) => {
                tracing::error!("Validation API error: {}", self);
                StatusCode::BAD_GATEWAY
            }
            AppError::JobFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::JobCancelled { .. } => StatusCode::CONFLICT,
            AppError::JobTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "error_code": self.error_code(),
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}
