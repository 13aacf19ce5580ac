//! SQLite database setup with WAL mode and a small set of pragmas.
//!
//! The [`Database`] struct holds two `rusqlite::Connection`s to the same
//! file, each behind its own `Arc<Mutex<>>`, and exposes async methods
//! that use `tokio::task::spawn_blocking` to avoid blocking the async
//! runtime.
//!
//! The writer connection serializes writes, so concurrent writes to the
//! same `(user_id, key)` pair resolve in commit order. The reader
//! connection is `query_only`; under WAL it reads the last committed
//! snapshot while the writer is inside a transaction, so reads never
//! queue behind unrelated writes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::migration;

type SharedConnection = Arc<Mutex<Connection>>;

/// Thread-safe handle to a SQLite database.
///
/// Writes go through [`Database::execute`] / [`Database::execute_mut`],
/// reads through [`Database::execute_read`]; all of them dispatch onto the
/// blocking thread pool via `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct Database {
    writer: SharedConnection,
    /// `None` for in-memory databases: WAL needs a file, so reads share
    /// the writer connection there.
    reader: Option<SharedConnection>,
}

impl Database {
    /// Open (or create) a database at `path` and apply pragmas.
    ///
    /// Parent directories are created if missing. This call blocks briefly
    /// (file I/O), so call it during startup or wrap it in `spawn_blocking`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // The writer goes first so the file exists in WAL mode before the
        // reader attaches.
        let writer = Connection::open(path)?;
        Self::apply_pragmas(&writer)?;

        let reader = Connection::open(path)?;
        Self::apply_reader_pragmas(&reader)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Some(Arc::new(Mutex::new(reader))),
        })
    }

    /// Create an in-memory database, useful for tests.
    ///
    /// Reads and writes share one connection, so a long write transaction
    /// delays reads. Use a file database when that matters.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(conn)),
            reader: None,
        })
    }

    /// Open the database and run all pending migrations.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending schema migrations, returning how many were applied.
    pub async fn run_migrations(&self) -> StoreResult<usize> {
        self.execute(migration::run_all).await
    }

    /// Execute an arbitrary closure against the writer connection on the
    /// blocking pool.
    ///
    /// The closure receives a `&Connection` and must return a `StoreResult<T>`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// db.execute(|conn| {
    ///     conn.execute("DELETE FROM user_settings WHERE user_id = ?1", ["u1"])?;
    ///     Ok(())
    /// }).await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.writer, move |conn| f(conn)).await
    }

    /// Execute a mutable closure (for transactions) on the writer connection.
    ///
    /// The closure receives a `&mut Connection` so it can call
    /// `conn.transaction()`.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.writer, f).await
    }

    /// Execute a read-only closure on the reader connection.
    ///
    /// Sees only committed data and does not wait for an open write
    /// transaction. Any attempt to write fails (`query_only`).
    pub async fn execute_read<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.reader.as_ref().unwrap_or(&self.writer);
        run_blocking(conn, move |conn| f(conn)).await
    }

    /// Round-trip a trivial query to check the backend is answering.
    pub async fn ping(&self) -> StoreResult<()> {
        self.execute_read(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    /// Flush the WAL into the main database file and close both connections.
    ///
    /// If other clones of this handle are still alive the connections stay
    /// open until the last one is dropped; the checkpoint still runs.
    pub async fn close(self) -> StoreResult<()> {
        self.execute(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            Ok(())
        })
        .await?;

        let Self { writer, reader } = self;
        if let Some(reader) = reader {
            close_connection(reader, "reader").await?;
        }
        if close_connection(writer, "writer").await? {
            info!("database closed");
        }
        Ok(())
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: concurrent readers, non-blocking writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe with WAL: a power failure loses at most the
        // last transaction, never the database.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Busy timeout so concurrent writers wait instead of failing immediately.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        debug!("database pragmas applied (WAL, busy_timeout 5s)");
        Ok(())
    }

    fn apply_reader_pragmas(conn: &Connection) -> StoreResult<()> {
        // Journal mode is a property of the file, already set by the writer.
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;
        conn.pragma_update(None, "query_only", "ON")?;
        Ok(())
    }
}

async fn run_blocking<F, T>(conn: &SharedConnection, f: F) -> StoreResult<T>
where
    F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut conn = conn
            .lock()
            .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
        f(&mut conn)
    })
    .await?
}

/// Close `conn` if this is the last handle to it. Returns whether it closed.
async fn close_connection(conn: SharedConnection, role: &'static str) -> StoreResult<bool> {
    match Arc::try_unwrap(conn) {
        Ok(mutex) => {
            let conn = mutex
                .into_inner()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            tokio::task::spawn_blocking(move || conn.close().map_err(|(_, e)| e)).await??;
            debug!(role, "connection closed");
            Ok(true)
        }
        Err(_) => {
            warn!(role, "database handle still shared, deferring close to last owner");
            Ok(false)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
