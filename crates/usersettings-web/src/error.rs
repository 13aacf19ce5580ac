//! HTTP error mapping.
//!
//! Store failures reach the handlers unmodified and are translated here:
//! caller faults become `400`, a missing identity `401`, anything else
//! `500`. Every failure is logged once, at the point it becomes a response.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use usersettings_store::StoreError;

/// Errors returned by the settings API handlers.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request was malformed before reaching the store.
    #[error("{0}")]
    BadRequest(String),

    /// No authenticated user was attached to the request.
    #[error("authentication required")]
    Unauthorized,

    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "settings request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "settings request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
