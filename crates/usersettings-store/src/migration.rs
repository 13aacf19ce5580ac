//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version is tracked in a `_migrations` table so migrations
//! are idempotent and only run once.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "user settings: one row per (user_id, key)",
    sql: r#"
            CREATE TABLE user_settings (
                user_id    TEXT NOT NULL,
                key        TEXT NOT NULL CHECK(length(key) > 0),
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, key)
            );

            CREATE INDEX idx_user_settings_user ON user_settings(user_id);
        "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn` and return how many ran.
///
/// This is a **synchronous** function; call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<usize> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "schema is up to date");
        return Ok(0);
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in &pending {
        migration.apply(conn)?;
    }

    info!(new_version = latest_version(), "migrations applied");
    Ok(pending.len())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| failed(0, "read current version", e))
}

/// The version the schema will be at once every migration has run.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

// ── internals ────────────────────────────────────────────────────────

fn failed(version: u32, what: &str, err: rusqlite::Error) -> StoreError {
    StoreError::Migration {
        version,
        message: format!("{what}: {err}"),
    }
}

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| failed(0, "create _migrations table", e))
}

impl Migration {
    /// Apply this migration and record it, all inside one transaction.
    ///
    /// `conn.transaction()` needs `&mut Connection`, so the transaction is
    /// driven by hand with `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK`.
    fn apply(&self, conn: &Connection) -> StoreResult<()> {
        info!(
            version = self.version,
            description = self.description,
            "applying migration"
        );

        conn.execute_batch("BEGIN IMMEDIATE;")
            .map_err(|e| failed(self.version, "begin transaction", e))?;

        let body = conn
            .execute_batch(self.sql)
            .map_err(|e| failed(self.version, "execute SQL", e))
            .and_then(|()| {
                conn.execute(
                    "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![self.version, self.description, chrono::Utc::now().timestamp()],
                )
                .map_err(|e| failed(self.version, "record migration", e))
            });

        if let Err(err) = body {
            warn!(version = self.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
            return Err(err);
        }

        conn.execute_batch("COMMIT;")
            .map_err(|e| failed(self.version, "commit", e))?;
        debug!(version = self.version, "migration committed");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
