//! Sqlite-backed cache tables.
//!
//! One table per cache kind, rows `(canonical_key TEXT PRIMARY KEY, doc
//! TEXT)` with the record serialized as JSON. New optional record fields
//! need no schema migration. All database work runs in `spawn_blocking`
//! to keep the async runtime unblocked.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use centralkit_core::CacheStore;
use centralkit_domain::{CacheEntry, CacheKind, CentralError, Result};
use rusqlite::{params, Connection};
use tokio::task;
use tracing::debug;

/// [`CacheStore`] over a single sqlite database file.
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`.
    ///
    /// # Errors
    /// `CentralError::Database` when the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| CentralError::Database(format!("opening cache db: {e}")))?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests and ephemeral runs.
    ///
    /// # Errors
    /// `CentralError::Database` when sqlite cannot initialize.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CentralError::Database(format!("opening in-memory db: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        create_schema(&conn).map_err(|e| CentralError::Database(e.to_string()))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load_table(&self, kind: CacheKind) -> Result<Vec<CacheEntry>> {
        let conn = Arc::clone(&self.conn);

        task::spawn_blocking(move || -> Result<Vec<CacheEntry>> {
            let conn = lock_connection(&conn)?;
            query_table(&conn, kind).map_err(|e| CentralError::Database(e.to_string()))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn replace_table(&self, kind: CacheKind, entries: &[CacheEntry]) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        // Serialize on the async side; only SQL runs in the blocking task.
        let rows: Vec<(String, String)> = entries
            .iter()
            .map(|entry| {
                let doc = serde_json::to_string(entry)
                    .map_err(|e| CentralError::Internal(format!("serializing {kind}: {e}")))?;
                Ok((entry.canonical_key(), doc))
            })
            .collect::<Result<_>>()?;

        let count = rows.len();
        task::spawn_blocking(move || -> Result<()> {
            let mut conn = lock_connection(&conn)?;
            replace_rows(&mut conn, kind, &rows)
                .map_err(|e| CentralError::Database(e.to_string()))
        })
        .await
        .map_err(map_join_error)??;

        debug!(kind = %kind, records = count, "cache table persisted");
        Ok(())
    }
}

// Synchronous SQL, called inside spawn_blocking.

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    for kind in CacheKind::ALL {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    canonical_key TEXT PRIMARY KEY,
                    doc TEXT NOT NULL
                )",
                kind.table()
            ),
            [],
        )?;
    }
    Ok(())
}

fn query_table(conn: &Connection, kind: CacheKind) -> rusqlite::Result<Vec<CacheEntry>> {
    let mut stmt =
        conn.prepare(&format!("SELECT doc FROM {} ORDER BY canonical_key", kind.table()))?;
    let docs = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    // Rows that no longer parse (written by an incompatible build) are
    // dropped; the next refresh rewrites the table anyway.
    Ok(docs.iter().filter_map(|doc| serde_json::from_str(doc).ok()).collect())
}

fn replace_rows(
    conn: &mut Connection,
    kind: CacheKind,
    rows: &[(String, String)],
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(&format!("DELETE FROM {}", kind.table()), [])?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} (canonical_key, doc) VALUES (?1, ?2)",
            kind.table()
        ))?;
        for (key, doc) in rows {
            stmt.execute(params![key, doc])?;
        }
    }
    tx.commit()
}

fn lock_connection(conn: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| CentralError::Database("cache db mutex poisoned".to_string()))
}

fn map_join_error(e: task::JoinError) -> CentralError {
    CentralError::Internal(format!("blocking task failed: {e}"))
}
