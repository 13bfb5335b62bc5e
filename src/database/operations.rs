use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::database::schema::run_migrations;

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Cursor database failed: {0}")]
    Connection(#[from] rusqlite::Error),
    #[error("Cursor operation failed: {0}")]
    Operation(String),
}

/// Identity of one tracker's watermark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorKey {
    pub network: String,
    pub address: String,
    pub module_filter: Option<String>,
    pub batch_filter: Option<String>,
}

impl CursorKey {
    pub fn new(
        network: &str,
        address: &str,
        module_filter: Option<&str>,
        batch_filter: Option<&str>,
    ) -> Self {
        Self {
            network: network.to_string(),
            address: address.to_string(),
            module_filter: module_filter.map(str::to_string),
            batch_filter: batch_filter.map(str::to_string),
        }
    }

    fn module_column(&self) -> &str {
        self.module_filter.as_deref().unwrap_or("")
    }

    fn batch_column(&self) -> &str {
        self.batch_filter.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRow {
    pub network: String,
    pub address: String,
    pub module_filter: String,
    pub batch_filter: String,
    pub watermark: u64,
    pub updated_at: i64,
}

/// SQLite-backed watermark store
#[derive(Clone)]
pub struct CursorStore {
    conn: Arc<Mutex<Connection>>,
}

impl CursorStore {
    /// Open (or create) a cursor database file and initialize the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CursorError> {
        let conn = Connection::open(path)?;

        run_migrations(&conn)?;

        Ok(CursorStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing
    pub fn new_in_memory() -> Result<Self, CursorError> {
        let conn = Connection::open_in_memory()?;

        run_migrations(&conn)?;

        Ok(CursorStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Last saved watermark for a key, if any
    pub fn load(&self, key: &CursorKey) -> Result<Option<u64>, CursorError> {
        let conn = self.conn.lock().map_err(|_| CursorError::Operation("Failed to acquire lock".to_string()))?;

        let watermark: Option<u64> = conn
            .query_row(
                "SELECT watermark FROM tracker_cursors
                 WHERE network = ?1 AND address = ?2 AND module_filter = ?3 AND batch_filter = ?4",
                params![key.network, key.address, key.module_column(), key.batch_column()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(watermark)
    }

    /// Upsert the watermark for a key
    pub fn save(&self, key: &CursorKey, watermark: u64) -> Result<(), CursorError> {
        let conn = self.conn.lock().map_err(|_| CursorError::Operation("Failed to acquire lock".to_string()))?;

        conn.execute(
            "INSERT INTO tracker_cursors (network, address, module_filter, batch_filter, watermark)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(network, address, module_filter, batch_filter)
             DO UPDATE SET watermark = excluded.watermark, updated_at = strftime('%s', 'now')",
            params![key.network, key.address, key.module_column(), key.batch_column(), watermark],
        )?;

        Ok(())
    }

    /// Forget the watermark for a key; returns whether a row existed
    pub fn clear(&self, key: &CursorKey) -> Result<bool, CursorError> {
        let conn = self.conn.lock().map_err(|_| CursorError::Operation("Failed to acquire lock".to_string()))?;

        let rows_affected = conn.execute(
            "DELETE FROM tracker_cursors
             WHERE network = ?1 AND address = ?2 AND module_filter = ?3 AND batch_filter = ?4",
            params![key.network, key.address, key.module_column(), key.batch_column()],
        )?;

        Ok(rows_affected > 0)
    }

    /// All saved cursors, ordered by key
    pub fn list(&self) -> Result<Vec<CursorRow>, CursorError> {
        let conn = self.conn.lock().map_err(|_| CursorError::Operation("Failed to acquire lock".to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT network, address, module_filter, batch_filter, watermark, updated_at
             FROM tracker_cursors ORDER BY network, address, module_filter, batch_filter",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(CursorRow {
                network: row.get(0)?,
                address: row.get(1)?,
                module_filter: row.get(2)?,
                batch_filter: row.get(3)?,
                watermark: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;

        let mut cursors = Vec::new();
        for row in rows {
            cursors.push(row?);
        }

        Ok(cursors)
    }
}
