//! Raw key/value storage for serialized snapshots.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use duckdb::{Connection, params};

use crate::DbError;

/// One persisted cache row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Unique cache key.
    pub cache_key: String,
    /// Serialized snapshot JSON.
    pub snapshot: String,
    /// The address as the caller originally supplied it.
    pub search_address: String,
    /// Epoch milliseconds of the first write.
    pub created_at: i64,
    /// Epoch milliseconds of the latest write.
    pub updated_at: i64,
}

/// Transactional key/value store behind the response cache.
pub trait CacheStore: Send + Sync {
    /// Looks up an entry by key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn get(&self, cache_key: &str) -> Result<Option<StoredEntry>, DbError>;

    /// Creates or overwrites an entry. `created_at` is kept on overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails; nothing is persisted then.
    fn put(&self, cache_key: &str, snapshot: &str, search_address: &str) -> Result<(), DbError>;

    /// Distinct search addresses, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn list_addresses(&self) -> Result<Vec<String>, DbError>;

    /// Deletes an entry, returning the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    fn delete(&self, cache_key: &str) -> Result<usize, DbError>;
}

const UPSERT: &str = "INSERT INTO market_cache
        (cache_key, snapshot, search_address, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?)
     ON CONFLICT (cache_key) DO UPDATE SET
        snapshot = excluded.snapshot,
        search_address = excluded.search_address,
        updated_at = excluded.updated_at";

/// Round-robin pool of `DuckDB` connections to one cache database.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so each connection is
/// wrapped in a `Mutex`. All connections are clones of one handle and see
/// the same database, including in-memory ones.
pub struct DuckDbStore {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl DuckDbStore {
    /// Opens (or creates) the cache database at `path` with `size`
    /// pooled connections.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path, size: usize) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        log::info!("Opening market cache at {}", path.display());
        Self::with_connection(Connection::open(path)?, size)
    }

    /// Opens a private in-memory cache database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema cannot be created.
    pub fn open_in_memory(size: usize) -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?, size)
    }

    fn with_connection(conn: Connection, size: usize) -> Result<Self, DbError> {
        create_schema(&conn)?;

        let size = size.max(1);
        let mut connections = Vec::with_capacity(size);
        for _ in 1..size {
            connections.push(Mutex::new(conn.try_clone()?));
        }
        connections.push(Mutex::new(conn));

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn size(&self) -> usize {
        self.connections.len()
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[idx].lock().map_err(|_| DbError::Pool {
            message: format!("connection {idx} mutex poisoned"),
        })
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS market_cache (
            cache_key TEXT PRIMARY KEY,
            snapshot TEXT NOT NULL,
            search_address TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        );",
    )?;
    Ok(())
}

impl CacheStore for DuckDbStore {
    fn get(&self, cache_key: &str) -> Result<Option<StoredEntry>, DbError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT cache_key, snapshot, search_address, created_at, updated_at
             FROM market_cache
             WHERE cache_key = ?",
        )?;
        let mut rows = stmt.query(params![cache_key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(StoredEntry {
            cache_key: row.get(0)?,
            snapshot: row.get(1)?,
            search_address: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        }))
    }

    fn put(&self, cache_key: &str, snapshot: &str, search_address: &str) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self.acquire()?;

        // Dropping an uncommitted transaction rolls it back.
        let tx = conn.transaction()?;
        tx.execute(
            UPSERT,
            params![cache_key, snapshot, search_address, now, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_addresses(&self) -> Result<Vec<String>, DbError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT search_address FROM market_cache ORDER BY search_address",
        )?;
        let addresses = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(addresses)
    }

    fn delete(&self, cache_key: &str) -> Result<usize, DbError> {
        let conn = self.acquire()?;
        let removed = conn.execute(
            "DELETE FROM market_cache WHERE cache_key = ?",
            params![cache_key],
        )?;
        Ok(removed)
    }
}
