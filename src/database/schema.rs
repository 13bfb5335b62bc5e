use rusqlite::{Connection, Result};

/// Initialize the cursor table
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Unset filters are stored as '' so they can take part in the primary key
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracker_cursors (
            network TEXT NOT NULL,
            address TEXT NOT NULL,
            module_filter TEXT NOT NULL DEFAULT '',
            batch_filter TEXT NOT NULL DEFAULT '',
            watermark INTEGER NOT NULL,
            updated_at INTEGER DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (network, address, module_filter, batch_filter)
        )",
        [],
    )?;

    Ok(())
}

/// Schema revision recorded in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Bring the database up to `SCHEMA_VERSION`, applying each missing step once
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current < 1 {
        initialize_schema(conn)?;
    }

    if current < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
