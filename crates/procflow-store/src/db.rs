//! SQLite handle for the process schema.
//!
//! One connection behind `Arc<Mutex<>>`; every call hops onto the blocking
//! pool with `tokio::task::spawn_blocking`. Concurrent callers serialize on
//! the connection and each commit still runs in its own transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// `(pragma, value)` applied to every new connection.
const PRAGMAS: &[(&str, &str)] = &[
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    // Element rows reference `blocks`.
    ("foreign_keys", "ON"),
    ("busy_timeout", "5000"),
];

/// Thread-safe handle to the process database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path`. Blocking.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open the database at `path` and bring its schema up to date.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.execute(migration::run_all).await
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.execute_mut(move |conn| f(conn)).await
    }

    /// Like [`execute`](Self::execute), with the `&mut Connection` needed to
    /// open a transaction.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("connection mutex poisoned: {e}")))?;
            f(&mut guard)
        })
        .await?
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        for (name, value) in PRAGMAS {
            conn.pragma_update(None, name, value)?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
