//! REST API route handlers.
//!
//! Handlers are thin: they extract the caller and the payload, call the
//! store, and shape the JSON response. Payload validation that must
//! happen before the store is touched (missing `value`, non-object bulk
//! body) lives here.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use usersettings_store::SettingValue;

use crate::auth::CurrentUser;
use crate::error::WebError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Response payload for the `/api/health` endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Report whether the database answers a trivial query.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (code, status) = match state.store.database().ping().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Body of `GET /api/user-settings/{key}`.
///
/// `value` is omitted entirely when the setting does not exist, so an
/// absent setting is distinguishable from one holding `null`.
#[derive(Serialize)]
pub struct SettingResponse {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<SettingValue>,
}

/// GET /api/user-settings: every setting of the caller as a flat object.
pub async fn list_settings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<BTreeMap<String, SettingValue>>, WebError> {
    let settings = state.store.get_all(user.id()).await?;
    Ok(Json(settings))
}

/// GET /api/user-settings/{key}: one setting.
pub async fn get_setting(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>, WebError> {
    let value = state.store.get(user.id(), &key).await?;
    Ok(Json(SettingResponse { key, value }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Body of `POST /api/user-settings/{key}`.
///
/// `value` is `None` only when the field is missing; an explicit `null`
/// deserializes to `Some(Value::Null)`.
#[derive(Debug, Deserialize)]
pub struct SetSettingBody {
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// POST /api/user-settings/{key}: upsert one setting.
pub async fn save_setting(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(key): Path<String>,
    body: Result<Json<SetSettingBody>, JsonRejection>,
) -> Result<Json<Value>, WebError> {
    let Json(body) = body.map_err(|e| WebError::BadRequest(e.body_text()))?;
    let value = body
        .value
        .ok_or_else(|| WebError::BadRequest("value is required".into()))?;

    state.store.set(user.id(), &key, value.clone()).await?;

    Ok(Json(json!({ "success": true, "key": key, "value": value })))
}

/// POST /api/user-settings: upsert every entry of a flat JSON object.
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, WebError> {
    let Json(body) = body.map_err(|e| WebError::BadRequest(e.body_text()))?;
    let Value::Object(settings) = body else {
        return Err(WebError::BadRequest("settings object is required".into()));
    };

    let saved = state.store.set_many(user.id(), settings).await?;

    Ok(Json(json!({ "success": true, "saved": saved })))
}

/// DELETE /api/user-settings/{key}: remove one setting.
///
/// Deleting a missing key is not an error; `success` reports whether a
/// row was actually removed.
pub async fn delete_setting(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(key): Path<String>,
) -> Result<Json<Value>, WebError> {
    let deleted = state.store.delete(user.id(), &key).await?;
    Ok(Json(json!({ "success": deleted })))
}
