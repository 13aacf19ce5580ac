//! HTTP interface for the user settings store.
//!
//! This crate exposes a [`SettingsStore`](usersettings_store::SettingsStore)
//! over a small REST API:
//!
//! - `GET    /api/user-settings`        all settings of the caller
//! - `GET    /api/user-settings/{key}`  one setting
//! - `POST   /api/user-settings/{key}`  upsert one setting (`{"value": ...}`)
//! - `POST   /api/user-settings`        upsert many (flat JSON object)
//! - `DELETE /api/user-settings/{key}`  remove one setting
//! - `GET    /api/health`               database liveness probe
//!
//! The caller's identity comes from a trusted request header set by an
//! upstream authentication layer; see [`auth::CurrentUser`].

pub mod api;
pub mod auth;
pub mod error;
pub mod server;
pub mod state;

pub use auth::CurrentUser;
pub use error::WebError;
pub use server::{WebServer, build_router, shutdown_signal};
pub use state::AppState;

/// Header carrying the authenticated user id when none is configured.
pub const DEFAULT_USER_HEADER: &str = "x-user-id";

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// Request header the authentication layer fills with the user id.
    pub user_header: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 4001,
            user_header: DEFAULT_USER_HEADER.into(),
        }
    }
}
