//! # usersettings-store
//!
//! Per-user key-value settings engine backed by SQLite.
//!
//! Each user owns a set of named settings whose values are arbitrary
//! JSON. Writes are upserts keyed by `(user_id, key)`, bulk writes are
//! atomic, and absence is a normal result rather than an error.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  SettingsStore  (get / set / set_many / │
//! │                  delete / purge_user)   │
//! ├─────────────────────────────────────────┤
//! │  SettingValue   (JSON encode / decode)  │
//! ├─────────────────────────────────────────┤
//! │  Database  (rusqlite WAL, blocking pool)│
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use usersettings_store::SettingsStore;
//!
//! let store = SettingsStore::open("data/settings.db").await?;
//! store.set("u1", "theme", "dark").await?;
//! assert_eq!(store.get("u1", "theme").await?, Some("dark".into()));
//! store.close().await?;
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod settings;
pub mod value;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use settings::{Setting, SettingsStore};
pub use value::SettingValue;
