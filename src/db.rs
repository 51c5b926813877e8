use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ScoutError;

/// Durable string storage keyed by name. Values are whole documents;
/// `set` overwrites.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ScoutError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ScoutError>;
}

fn storage_err(err: rusqlite::Error) -> ScoutError {
    ScoutError::Persistence(err.to_string())
}

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub const FILE_NAME: &'static str = "scout.db";

    pub fn open(data_dir: &Path) -> Result<Self, ScoutError> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            ScoutError::Persistence(format!("cannot create {}: {}", data_dir.display(), e))
        })?;
        let path = data_dir.join(Self::FILE_NAME);
        let conn = Connection::open(&path).map_err(storage_err)?;
        let store = Self { conn, path };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn init(&self) -> Result<(), ScoutError> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                "#,
            )
            .map_err(storage_err)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, ScoutError> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(storage_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ScoutError> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .map_err(storage_err)?;
        Ok(())
    }
}

/// Non-durable store for tests and for running without a data directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.entries.borrow_mut().insert(key.to_string(), value.to_string());
        store
    }

    /// A store whose writes always fail, for exercising the degrade path.
    #[cfg(test)]
    pub fn read_only() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ScoutError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ScoutError> {
        if self.fail_writes {
            return Err(ScoutError::Persistence("store is read-only".to_string()));
        }
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.get("saved_jobs").unwrap(), None);

        store.set("saved_jobs", "[1]").unwrap();
        store.set("saved_jobs", "[1,2]").unwrap();
        assert_eq!(store.get("saved_jobs").unwrap().as_deref(), Some("[1,2]"));
        assert!(store.path().ends_with(SqliteStore::FILE_NAME));
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store.set("k", "v").unwrap();
        }
        let store = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_read_only_memory_store_rejects_writes() {
        let store = MemoryStore::read_only();
        assert!(matches!(store.set("k", "v"), Err(ScoutError::Persistence(_))));
        assert_eq!(store.get("k").unwrap(), None);
    }
}
