//! Store operations over the local SQLite database

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

/// Which key-value scope a read or write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Survives until explicitly cleared; analog of per-origin durable storage
    Durable,
    /// Per-session; cleared by [`Database::begin_session`]
    Volatile,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Durable => "local",
            Scope::Volatile => "session",
        }
    }
}

/// A device record persisted in the degraded local store.
#[derive(Debug, Clone)]
pub struct LocalDevice {
    /// Store-assigned id; the deletion key
    pub id: String,
    pub device_name: Option<String>,
    /// The stored payload, verbatim
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)?;
        Ok(())
    }

    // ============================================
    // Key/value state
    // ============================================

    /// Read a key from the given scope.
    pub fn kv_get(&self, scope: Scope, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE scope = ?1 AND key = ?2",
                params![scope.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a key in the given scope, replacing any previous value.
    pub fn kv_set(&self, scope: Scope, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv (scope, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(scope, key) DO UPDATE SET value = ?3, updated_at = ?4",
            params![scope.as_str(), key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete a key from the given scope.
    pub fn kv_delete(&self, scope: Scope, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM kv WHERE scope = ?1 AND key = ?2",
            params![scope.as_str(), key],
        )?;
        Ok(())
    }

    /// All entries of a scope, ordered by key.
    pub fn kv_entries(&self, scope: Scope) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT key, value FROM kv WHERE scope = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![scope.as_str()], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Drop the volatile scope. Called when a new session begins.
    pub fn begin_session(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM kv WHERE scope = ?1",
            params![Scope::Volatile.as_str()],
        )?;
        Ok(())
    }

    // ============================================
    // Degraded local device store
    // ============================================

    /// Persist a device payload locally; returns the assigned id.
    pub fn add_device(
        &self,
        device_name: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO devices (id, device_name, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, device_name, payload.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(id)
    }

    /// All locally stored devices, newest first.
    pub fn list_devices(&self) -> Result<Vec<LocalDevice>> {
        self.query_devices(
            "SELECT id, device_name, payload, created_at FROM devices
             ORDER BY created_at DESC",
            params![],
        )
    }

    /// Number of locally stored devices.
    pub fn count_devices(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Case-insensitive substring search on the device name, newest first.
    pub fn search_devices(&self, name: &str) -> Result<Vec<LocalDevice>> {
        self.query_devices(
            "SELECT id, device_name, payload, created_at FROM devices
             WHERE instr(lower(coalesce(device_name, '')), lower(?1)) > 0
             ORDER BY created_at DESC",
            params![name],
        )
    }

    /// Delete a locally stored device. Returns false if the id was unknown.
    pub fn delete_device(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM devices WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn query_devices(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<LocalDevice>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            let payload: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok(LocalDevice {
                id: row.get(0)?,
                device_name: row.get(1)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                created_at: created_at
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        let mut devices = Vec::new();
        for row in rows {
            devices.push(row?);
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_kv_scopes_are_disjoint() {
        let db = test_db();
        db.kv_set(Scope::Durable, "consent_camera", "granted").unwrap();
        db.kv_set(Scope::Volatile, "device_click_count", "3").unwrap();

        assert_eq!(
            db.kv_get(Scope::Durable, "consent_camera").unwrap().as_deref(),
            Some("granted")
        );
        assert_eq!(db.kv_get(Scope::Volatile, "consent_camera").unwrap(), None);

        db.begin_session().unwrap();
        assert_eq!(db.kv_get(Scope::Volatile, "device_click_count").unwrap(), None);
        // Durable scope survives a new session
        assert!(db.kv_get(Scope::Durable, "consent_camera").unwrap().is_some());
    }

    #[test]
    fn test_kv_overwrite_and_delete() {
        let db = test_db();
        db.kv_set(Scope::Durable, "k", "v1").unwrap();
        db.kv_set(Scope::Durable, "k", "v2").unwrap();
        assert_eq!(db.kv_get(Scope::Durable, "k").unwrap().as_deref(), Some("v2"));

        db.kv_delete(Scope::Durable, "k").unwrap();
        assert_eq!(db.kv_get(Scope::Durable, "k").unwrap(), None);
    }

    #[test]
    fn test_device_store_round_trip() {
        let db = test_db();
        let id = db
            .add_device(Some("Pixel 7"), &serde_json::json!({"osName": "Android"}))
            .unwrap();

        let devices = db.list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, id);
        assert_eq!(devices[0].device_name.as_deref(), Some("Pixel 7"));
        assert_eq!(devices[0].payload["osName"], "Android");
        assert_eq!(db.count_devices().unwrap(), 1);

        assert!(db.delete_device(&id).unwrap());
        assert!(!db.delete_device(&id).unwrap());
        assert_eq!(db.count_devices().unwrap(), 0);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let db = test_db();
        db.add_device(Some("Pixel 7"), &serde_json::json!({})).unwrap();
        db.add_device(Some("iPhone 14"), &serde_json::json!({})).unwrap();
        db.add_device(Some("pixel tablet"), &serde_json::json!({})).unwrap();
        db.add_device(None, &serde_json::json!({})).unwrap();

        let hits = db.search_devices("pixel").unwrap();
        let names: Vec<_> = hits.iter().filter_map(|d| d.device_name.as_deref()).collect();
        assert_eq!(hits.len(), 2);
        assert!(names.contains(&"Pixel 7"));
        assert!(names.contains(&"pixel tablet"));

        assert!(db.search_devices("galaxy").unwrap().is_empty());
    }

    #[test]
    fn test_durable_state_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.db");
        {
            let db = Database::open(&path).unwrap();
            db.migrate().unwrap();
            db.kv_set(Scope::Durable, "device_session_id", "s_abc").unwrap();
            db.kv_set(Scope::Volatile, "device_click_count", "3").unwrap();
        }

        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert_eq!(
            db.kv_get(Scope::Durable, "device_session_id").unwrap().as_deref(),
            Some("s_abc")
        );
        // Volatile state persists across reopen too; only begin_session clears it
        assert_eq!(
            db.kv_get(Scope::Volatile, "device_click_count").unwrap().as_deref(),
            Some("3")
        );
    }

    #[test]
    fn test_list_orders_newest_first() {
        let db = test_db();
        let first = db.add_device(Some("old"), &serde_json::json!({})).unwrap();
        // created_at has sub-second precision, but don't rely on it
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = db.add_device(Some("new"), &serde_json::json!({})).unwrap();

        let devices = db.list_devices().unwrap();
        assert_eq!(devices[0].id, second);
        assert_eq!(devices[1].id, first);
    }
}
