//! Caller identity.
//!
//! Authentication happens upstream (reverse proxy or auth middleware),
//! which writes the authenticated user id into a trusted request header.
//! This module only reads that header; the id is never re-validated.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::WebError;
use crate::state::AppState;

/// The authenticated user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = state.config.user_header.as_str();
        let user_id = parts
            .headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(WebError::Unauthorized)?;

        Ok(Self(user_id.to_owned()))
    }
}
