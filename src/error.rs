use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Domain error taxonomy. Route handlers return this directly; the
/// `IntoResponse` impl is the single place where kinds map to status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or missing caller input; the message names the offending field.
    #[error("{0}")]
    Validation(String),

    /// Referenced identifier does not exist.
    #[error("{0}")]
    NotFound(String),

    /// External generation provider failed or is misconfigured.
    #[error("{0}")]
    Upstream(String),

    /// The variant half of a two-step create failed; the base insert was
    /// rolled back. Surfaced distinctly so callers can detect and retry.
    #[error("menu variant creation failed: {0}")]
    Consistency(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ApiError::Consistency(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            ApiError::Database(e) => {
                // Never leak driver internals to the client.
                tracing::error!("database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (ApiError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                ApiError::Upstream("provider down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Consistency("variant insert failed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
