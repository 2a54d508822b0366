//! SQLite-backed key-value storage.
//!
//! One table, one row per namespace key, value is an opaque JSON string. Reads
//! are forgiving: a missing row or unreadable value is reported as `None`.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use skysense_core::{RusqliteErrorExt, StorageError};
use std::path::Path;

pub struct KeyValueStore {
    conn: Mutex<Connection>,
}

impl KeyValueStore {
    /// Open or create the database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_storage_error)?;
        Self::with_connection(conn)
    }

    /// In-memory store, for tests and throwaway sessions.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_storage_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::OpenFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Raw value for `key`, or `None` if absent or unreadable.
    pub fn get(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock();
        read_value(&conn, key)
    }

    /// Replace the whole value stored under `key`.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        write_value(&conn, key, value)
    }

    /// Read-modify-write of one key as a single transaction.
    ///
    /// `edit` sees the current value and returns the value to store (`None`
    /// leaves the row untouched) plus whatever the caller wants back. No other
    /// call on this store runs between the read and the write.
    pub fn update<R>(
        &self,
        key: &str,
        edit: impl FnOnce(Option<String>) -> Result<(Option<String>, R), StorageError>,
    ) -> Result<R, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(RusqliteErrorExt::into_storage_error)?;

        let (next, output) = edit(read_value(&tx, key))?;
        if let Some(value) = next {
            write_value(&tx, key, &value)?;
        }

        tx.commit().map_err(RusqliteErrorExt::into_storage_error)?;
        Ok(output)
    }
}

fn read_value(conn: &Connection, key: &str) -> Option<String> {
    match conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()
    {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", key, e);
            None
        }
    }
}

fn write_value(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(RusqliteErrorExt::into_storage_error)?;
    Ok(())
}
