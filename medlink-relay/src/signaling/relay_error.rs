use crate::registry::StoreError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use medlink_core::ErrorResponse;
use thiserror::Error;
use tracing::warn;

/// Errors returned by the HTTP surface, rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum RelayApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Malformed request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for RelayApiError {
    fn from(rejection: JsonRejection) -> Self {
        RelayApiError::BadRequest(rejection.body_text())
    }
}

impl RelayApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayApiError::Store(StoreError::UnknownPeer(_)) => StatusCode::NOT_FOUND,
            RelayApiError::Store(_) | RelayApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RelayApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!("Rejecting relay request ({}): {}", status, self);

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
