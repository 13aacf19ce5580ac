//! Per-user key-value settings.
//!
//! Every setting is keyed by `(user_id, key)`; writes are upserts, so a
//! pair never has more than one row. Values are arbitrary JSON, stored as
//! text and decoded on the way out. Absence is not an error: [`get`]
//! returns `None` and [`delete`] returns `false`.
//!
//! Bulk writes through [`set_many`] are all-or-nothing: keys are checked
//! up front and every row is written inside one transaction.
//!
//! [`get`]: SettingsStore::get
//! [`delete`]: SettingsStore::delete
//! [`set_many`]: SettingsStore::set_many

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::value::SettingValue;

const UPSERT_SQL: &str = "INSERT INTO user_settings (user_id, key, value, updated_at) \
     VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A stored setting with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Opaque identifier of the owning user.
    pub user_id: String,
    /// Setting name, unique per user.
    pub key: String,
    /// Decoded value.
    pub value: SettingValue,
    /// Unix timestamp in milliseconds of the last write.
    pub updated_at: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  SettingsStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD operations on per-user settings.
///
/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    /// Create a store over an already migrated `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) the database at `path` and apply migrations.
    pub async fn open(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let db = Database::open_and_migrate(path).await?;
        Ok(Self::new(db))
    }

    /// Open a migrated in-memory store, for tests and throwaway use.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let db = Database::open_in_memory()?;
        db.run_migrations().await?;
        Ok(Self::new(db))
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Flush and close the backend. Call once at shutdown.
    pub async fn close(self) -> StoreResult<()> {
        self.db.close().await
    }

    /// Every setting owned by `user_id` as a key → value map.
    ///
    /// Returns an empty map when the user has none.
    #[instrument(skip(self))]
    pub async fn get_all(&self, user_id: &str) -> StoreResult<BTreeMap<String, SettingValue>> {
        let user_id = user_id.to_owned();
        self.db
            .execute_read(move |conn| {
                let mut stmt =
                    conn.prepare_cached("SELECT key, value FROM user_settings WHERE user_id = ?1")?;
                let rows = stmt
                    .query_map(params![user_id], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut settings = BTreeMap::new();
                for (key, text) in rows {
                    let value = decode_stored(&key, &text)?;
                    settings.insert(key, value);
                }
                trace!(user_id = %user_id, count = settings.len(), "settings loaded");
                Ok(settings)
            })
            .await
    }

    /// The value stored for `(user_id, key)`, or `None` if there is none.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: &str, key: &str) -> StoreResult<Option<SettingValue>> {
        let user_id = user_id.to_owned();
        let key = key.to_owned();
        self.db
            .execute_read(move |conn| {
                let result = conn.query_row(
                    "SELECT value FROM user_settings WHERE user_id = ?1 AND key = ?2",
                    params![user_id, key],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(text) => decode_stored(&key, &text).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Fetch a setting and decode it into `T`.
    ///
    /// A stored value whose shape does not fit `T` is a serialization error.
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        user_id: &str,
        key: &str,
    ) -> StoreResult<Option<T>> {
        self.get(user_id, key)
            .await?
            .map(SettingValue::into_typed)
            .transpose()
    }

    /// Insert or replace the value for `(user_id, key)`.
    #[instrument(skip(self, value))]
    pub async fn set(
        &self,
        user_id: &str,
        key: &str,
        value: impl Into<SettingValue>,
    ) -> StoreResult<()> {
        validate_key(key)?;
        let text = value.into().encode()?;
        let user_id = user_id.to_owned();
        let key = key.to_owned();
        let now = Utc::now().timestamp_millis();

        self.db
            .execute(move |conn| {
                upsert(conn, &user_id, &key, &text, now)?;
                debug!(user_id = %user_id, key = %key, "setting saved");
                Ok(())
            })
            .await
    }

    /// Serialize any `T` and store it under `(user_id, key)`.
    pub async fn set_typed<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let value = SettingValue::from_serialize(value)?;
        self.set(user_id, key, value).await
    }

    /// Write every entry of `settings` for `user_id` and return how many
    /// were written.
    ///
    /// The batch is atomic: if any key is empty, or any write fails,
    /// nothing is written. Later duplicates of a key win, and the count is
    /// of distinct keys.
    #[instrument(skip(self, settings))]
    pub async fn set_many<I, K, V>(&self, user_id: &str, settings: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>,
    {
        // Keyed by name, so a repeated key is written (and counted) once.
        let mut rows = BTreeMap::new();
        for (key, value) in settings {
            let key: String = key.into();
            validate_key(&key)?;
            rows.insert(key, value.into().encode()?);
        }

        if rows.is_empty() {
            return Ok(0);
        }

        let user_id = user_id.to_owned();
        let now = Utc::now().timestamp_millis();

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
                    for (key, text) in &rows {
                        stmt.execute(params![user_id, key, text, now])?;
                    }
                }
                tx.commit()?;
                debug!(user_id = %user_id, count = rows.len(), "settings saved");
                Ok(rows.len())
            })
            .await
    }

    /// Remove `(user_id, key)`, returning `true` if a row was deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, key: &str) -> StoreResult<bool> {
        let user_id = user_id.to_owned();
        let key = key.to_owned();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM user_settings WHERE user_id = ?1 AND key = ?2",
                    params![user_id, key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Full records for `user_id`, ordered by key.
    #[instrument(skip(self))]
    pub async fn entries(&self, user_id: &str) -> StoreResult<Vec<Setting>> {
        let user_id = user_id.to_owned();
        self.db
            .execute_read(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT key, value, updated_at FROM user_settings \
                     WHERE user_id = ?1 ORDER BY key",
                )?;
                let rows = stmt
                    .query_map(params![user_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(key, text, updated_at)| -> StoreResult<Setting> {
                        let value = decode_stored(&key, &text)?;
                        Ok(Setting {
                            user_id: user_id.clone(),
                            key,
                            value,
                            updated_at,
                        })
                    })
                    .collect()
            })
            .await
    }

    /// Delete every setting of `user_id` and return how many were removed.
    ///
    /// Called by user management when the user itself is deleted.
    #[instrument(skip(self))]
    pub async fn purge_user(&self, user_id: &str) -> StoreResult<usize> {
        let user_id = user_id.to_owned();
        self.db
            .execute(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM user_settings WHERE user_id = ?1",
                    params![user_id],
                )?;
                debug!(user_id = %user_id, removed, "user settings purged");
                Ok(removed)
            })
            .await
    }
}

// ── helpers ──────────────────────────────────────────────────────────

fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::Validation(
            "setting key must not be empty".into(),
        ));
    }
    Ok(())
}

fn upsert(conn: &Connection, user_id: &str, key: &str, text: &str, now: i64) -> StoreResult<()> {
    conn.prepare_cached(UPSERT_SQL)?
        .execute(params![user_id, key, text, now])?;
    Ok(())
}

fn decode_stored(key: &str, text: &str) -> StoreResult<SettingValue> {
    SettingValue::decode(text).map_err(|e| StoreError::Corrupt {
        key: key.to_owned(),
        message: e.to_string(),
    })
}

// ── tests ────────────────────────────────────────────────────────────
