//! Key-value persistence.
//!
//! Values are whole blobs: callers read and write complete values, there is
//! no partial update. The offline queue lives under one key, the session
//! token under another. Several processes may share one store, so a value
//! that is read, changed and written back goes through [`KeyValueStore::update`].

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::Database;
use crate::error::MedivaultError;

/// A durable string-to-string store.
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, MedivaultError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Must not return until the write is durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be guaranteed.
    fn set(&self, key: &str, value: &str) -> Result<(), MedivaultError>;

    /// Remove `key`. Returns whether a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, key: &str) -> Result<bool, MedivaultError>;

    /// Read-modify-write `key` as one atomic step.
    ///
    /// `apply` receives the current value and returns the value to store, or
    /// `None` to leave it untouched. No other writer, in this process or any
    /// other, can change `key` between the read and the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be locked, read or written, or
    /// whatever `apply` returns. Nothing is written in that case.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>, MedivaultError>,
    ) -> Result<(), MedivaultError>;
}

/// Key-value store backed by the `kv_store` table.
pub struct SqliteKvStore {
    db: Database,
}

impl SqliteKvStore {
    /// Wrap an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, MedivaultError> {
    conn.query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(|e| MedivaultError::Storage(format!("Failed to read key {key}: {e}")))
}

fn write_value(conn: &Connection, key: &str, value: &str) -> Result<(), MedivaultError> {
    conn.execute(
        r"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
          ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )
    .map_err(|e| MedivaultError::Storage(format!("Failed to write key {key}: {e}")))?;
    Ok(())
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, MedivaultError> {
        read_value(self.db.connection(), key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MedivaultError> {
        write_value(self.db.connection(), key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, MedivaultError> {
        let rows = self
            .db
            .connection()
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| MedivaultError::Storage(format!("Failed to delete key {key}: {e}")))?;
        Ok(rows > 0)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>, MedivaultError>,
    ) -> Result<(), MedivaultError> {
        // IMMEDIATE takes the write lock up front, so two processes cannot
        // both read the old value. Dropping the transaction rolls it back.
        let tx = Transaction::new_unchecked(self.db.connection(), TransactionBehavior::Immediate)
            .map_err(|e| MedivaultError::Storage(format!("Failed to lock key {key}: {e}")))?;

        if let Some(next) = apply(read_value(&tx, key)?)? {
            write_value(&tx, key, &next)?;
        }

        tx.commit()
            .map_err(|e| MedivaultError::Storage(format!("Failed to commit key {key}: {e}")))
    }
}

/// Process-local store. Contents do not survive the process.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, MedivaultError> {
        self.entries
            .lock()
            .map_err(|_| MedivaultError::Storage("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, MedivaultError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MedivaultError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, MedivaultError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>, MedivaultError>,
    ) -> Result<(), MedivaultError> {
        let mut entries = self.lock()?;
        if let Some(next) = apply(entries.get(key).cloned())? {
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, MedivaultError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MedivaultError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, MedivaultError> {
        (**self).remove(key)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>, MedivaultError>,
    ) -> Result<(), MedivaultError> {
        (**self).update(key, apply)
    }
}
