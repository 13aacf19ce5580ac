//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. The store is constructed by the caller at startup and
//! injected here; there is no global instance.

use usersettings_store::SettingsStore;

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Settings persistence.
    pub store: SettingsStore,

    /// Web server configuration.
    pub config: WebConfig,
}
