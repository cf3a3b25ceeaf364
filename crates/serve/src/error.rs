use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failures provisioning or running an artifact server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The operating system refused to hand out a loopback port.
    #[error("no loopback port available: {0}")]
    ResourceExhausted(#[source] std::io::Error),

    /// Binding, listening or spawning the server failed.
    #[error("{kind} server failed to start: {reason}")]
    StartFailed { kind: &'static str, reason: String },

    /// The query server is already serving another dataset and cannot
    /// switch files in place.
    #[error("query server is already serving {running}; cannot switch to {requested}")]
    DatasetChangeUnsupported { running: PathBuf, requested: PathBuf },

    /// The dataset file could not be opened.
    #[error("dataset error: {0}")]
    Dataset(#[from] sqlx::Error),
}

impl ServerError {
    pub fn start_failed(kind: &'static str, reason: impl ToString) -> Self {
        Self::StartFailed {
            kind,
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP errors of the query application
// ---------------------------------------------------------------------------

/// Error returned by query-application handlers.
///
/// Renders as `{"error": <message>, "code": <CODE>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Database(err) => classify_sqlx_error(err),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Statement errors reported by SQLite are the caller's fault and are shown
/// verbatim; everything else is a sanitized 500.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => (
            StatusCode::BAD_REQUEST,
            "QUERY_ERROR",
            db_err.message().to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Dataset error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError::NotFound("table x".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn pool_errors_are_sanitized() {
        let response = ApiError::Database(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn start_failed_names_the_server_kind() {
        let err = ServerError::start_failed("static-site", "address in use");
        assert_eq!(
            err.to_string(),
            "static-site server failed to start: address in use"
        );
    }
}
