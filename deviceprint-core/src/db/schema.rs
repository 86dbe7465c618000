//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- Key/value state, split into a durable scope ('local', survives
    -- until explicitly cleared) and a volatile scope ('session', cleared
    -- at the start of a new session).
    CREATE TABLE IF NOT EXISTS kv (
        scope       TEXT NOT NULL,
        key         TEXT NOT NULL,
        value       TEXT NOT NULL,
        updated_at  DATETIME NOT NULL,
        PRIMARY KEY (scope, key)
    );

    -- Degraded local device store, used when the backend save endpoint
    -- is unreachable. Shape mirrors the backend collection.
    CREATE TABLE IF NOT EXISTS devices (
        id           TEXT PRIMARY KEY,
        device_name  TEXT,
        payload      JSON NOT NULL,
        created_at   DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_devices_created_at
        ON devices(created_at DESC);
    "#,
];

/// Run any pending migrations on the connection.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = idx as i32 + 1;
        if version <= current {
            continue;
        }

        tracing::info!(version, "Applying schema migration");
        conn.execute_batch(migration)?;
        conn.pragma_update(None, "user_version", version)?;
    }

    debug_assert_eq!(MIGRATIONS.len() as i32, SCHEMA_VERSION);
    Ok(())
}
