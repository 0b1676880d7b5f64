//! `SQLite` handle shared by the key-value store and the failure log.
//!
//! Lives at `~/.medivault/medivault.db`. Every connection runs in WAL mode
//! with `synchronous = FULL`, so a committed write survives power loss.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use crate::error::MedivaultError;

/// How long a writer waits for another process (e.g. `sync watch`) to
/// release the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// An open, migrated connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database file, creating and migrating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, configured or migrated.
    pub fn open_at(path: &Path) -> Result<Self, MedivaultError> {
        let conn = Connection::open(path).map_err(|e| {
            MedivaultError::Database(format!("Cannot open {}: {e}", path.display()))
        })?;
        configure(&conn)?;
        Self::migrated(conn)
    }

    /// Private in-memory database for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub fn open_in_memory() -> Result<Self, MedivaultError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MedivaultError::Database(format!("Cannot open in-memory database: {e}")))?;
        Self::migrated(conn)
    }

    fn migrated(mut conn: Connection) -> Result<Self, MedivaultError> {
        migrations::run(&mut conn)?;
        Ok(Self { conn })
    }

    /// Schema version recorded in `PRAGMA user_version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn schema_version(&self) -> Result<i32, MedivaultError> {
        migrations::get_version(&self.conn)
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn configure(conn: &Connection) -> Result<(), MedivaultError> {
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| MedivaultError::Database(format!("Failed to set busy timeout: {e}")))?;

    // journal_mode answers with the resulting mode, so it has to be queried
    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(|e| MedivaultError::Database(format!("Failed to enable WAL: {e}")))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::debug!(%mode, "WAL unavailable, using fallback journal");
    }

    conn.pragma_update(None, "synchronous", "FULL")
        .map_err(|e| MedivaultError::Database(format!("Failed to set synchronous mode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_is_fully_migrated() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), migrations::CURRENT_VERSION);
    }

    #[test]
    fn test_file_database_uses_wal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("medivault.db");

        let db = Database::open_at(&path).unwrap();
        let mode: String = db
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("medivault.db");

        Database::open_at(&path)
            .unwrap()
            .connection()
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES ('offline_queue', '[]', 'now')",
                [],
            )
            .unwrap();

        let reopened = Database::open_at(&path).unwrap();
        let value: String = reopened
            .connection()
            .query_row("SELECT value FROM kv_store WHERE key = 'offline_queue'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, "[]");
    }

    #[test]
    fn test_two_handles_share_the_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("medivault.db");

        let first = Database::open_at(&path).unwrap();
        let second = Database::open_at(&path).unwrap();

        first
            .connection()
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES ('token', 't', 'now')",
                [],
            )
            .unwrap();
        let count: i64 = second
            .connection()
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
