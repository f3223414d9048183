//! Storage backend contract and implementations.
//!
//! # Responsibility
//! - Define the blob-per-key contract the tracker store persists through.
//! - Keep SQLite details out of the store's reconciliation logic.
//!
//! # Invariants
//! - `write` replaces the whole value for a key; there is no partial update.
//! - Backends are safe to share across threads behind `Arc`.

use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

/// Transport-level failures from a storage backend.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    /// Backend-specific rejection, e.g. quota or a poisoned handle.
    Backend(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Backend(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// String-keyed blob storage contract for the tracker store.
///
/// The store serializes whole mappings into values; backends only move
/// opaque strings.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// SQLite-backed blob storage over the `kv` table.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Wraps a bootstrapped connection (see [`crate::db::open_db`]).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Backend("sqlite connection mutex poisoned".to_string()))
    }
}

impl StorageBackend for SqliteBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }
}

/// In-memory blob storage for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw value, bypassing the store layer. Test hook for corrupt
    /// or legacy blobs.
    pub fn seed(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("memory backend mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("memory backend mutex poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryBackend, SqliteBackend, StorageBackend};
    use crate::db::open_db_in_memory;

    #[test]
    fn sqlite_backend_roundtrips_and_overwrites() {
        let backend = SqliteBackend::new(open_db_in_memory().unwrap());

        assert!(backend.read("progress").unwrap().is_none());
        backend.write("progress", "{\"day1\":{\"completed\":true}}").unwrap();
        assert_eq!(
            backend.read("progress").unwrap().as_deref(),
            Some("{\"day1\":{\"completed\":true}}")
        );

        backend.write("progress", "{}").unwrap();
        assert_eq!(backend.read("progress").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn memory_backend_roundtrips() {
        let backend = MemoryBackend::new();
        assert!(backend.read("journal").unwrap().is_none());
        backend.write("journal", "{\"day3\":\"rest day\"}").unwrap();
        assert_eq!(
            backend.read("journal").unwrap().as_deref(),
            Some("{\"day3\":\"rest day\"}")
        );
    }
}
