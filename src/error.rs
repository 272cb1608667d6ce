// API error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Required request parameters are missing or empty. Surfaced
    /// before any store access.
    #[error("{0}")]
    BadRequest(String),
    /// The caller matched a blacklist fingerprint.
    #[error("{0}")]
    Forbidden(String),
    /// A store query failed. The join is fail-fast: the first failed
    /// sub-fetch rejects the whole request instead of leaving it
    /// unanswered.
    #[error("upstream query failed: {0}")]
    Upstream(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Upstream(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        let bad = ApiError::BadRequest("Invalid parameters.".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let forbidden = ApiError::Forbidden("Blacklisted fingerprint.".into()).into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let upstream = ApiError::from(sqlx::Error::PoolClosed).into_response();
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
