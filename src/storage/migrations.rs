//! Schema migrations, tracked in `PRAGMA user_version`.
//!
//! Each step runs in its own transaction together with its version bump, so
//! an interrupted upgrade resumes from the last completed step.

use rusqlite::{Connection, Transaction};

use crate::error::MedivaultError;

/// Schema version a fully migrated database reports.
pub const CURRENT_VERSION: i32 = 3;

/// Read the schema version. A new database reports 0.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn get_version(conn: &Connection) -> Result<i32, MedivaultError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| MedivaultError::Database(format!("Failed to read schema version: {e}")))
}

/// Apply every step above the recorded version.
///
/// # Errors
///
/// Returns an error if a step fails; earlier steps stay applied.
pub fn run(conn: &mut Connection) -> Result<(), MedivaultError> {
    let current = get_version(conn)?;

    for version in (current + 1)..=CURRENT_VERSION {
        let tx = conn.transaction()?;
        apply(&tx, version)?;
        // user_version does not accept bound parameters
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))?;
        tx.commit()?;
        tracing::debug!(version, "schema migrated");
    }

    Ok(())
}

fn apply(tx: &Transaction<'_>, version: i32) -> Result<(), MedivaultError> {
    let sql = match version {
        // Whole-value blobs: offline queue, session token, signed-in user
        1 => {
            r"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "
        }
        // Actions dropped after a permanent delivery failure
        2 => {
            r"
            CREATE TABLE IF NOT EXISTS delivery_failures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                action TEXT NOT NULL,
                reason TEXT NOT NULL,
                failed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_delivery_failures_failed_at
            ON delivery_failures(failed_at);
            "
        }
        // One failure row per action, so a replayed drop is not logged twice
        3 => {
            r"
            DELETE FROM delivery_failures
            WHERE id NOT IN (SELECT MIN(id) FROM delivery_failures GROUP BY action_id);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_delivery_failures_action_id
            ON delivery_failures(action_id);
            "
        }
        _ => {
            return Err(MedivaultError::Database(format!(
                "No migration for schema version {version}"
            )))
        }
    };

    tx.execute_batch(sql)
        .map_err(|e| MedivaultError::Database(format!("Migration v{version} failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_fresh_database_gets_every_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_version(&conn).unwrap(), 0);

        run(&mut conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(table_exists(&conn, "kv_store"));
        assert!(table_exists(&conn, "delivery_failures"));
    }

    #[test]
    fn test_upgrade_keeps_existing_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        {
            let tx = conn.transaction().unwrap();
            apply(&tx, 1).unwrap();
            tx.execute_batch("PRAGMA user_version = 1;").unwrap();
            tx.commit().unwrap();
        }
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ('offline_queue', '[]', 'now')",
            [],
        )
        .unwrap();

        run(&mut conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(table_exists(&conn, "delivery_failures"));
        let kept: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kept, 1);
    }

    #[test]
    fn test_rerun_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        assert!(apply(&tx, 99).is_err());
    }

    #[test]
    fn test_upgrade_collapses_duplicate_failures() {
        let mut conn = Connection::open_in_memory().unwrap();
        for version in 1..=2 {
            let tx = conn.transaction().unwrap();
            apply(&tx, version).unwrap();
            tx.execute_batch(&format!("PRAGMA user_version = {version};")).unwrap();
            tx.commit().unwrap();
        }
        for reason in ["first", "second"] {
            conn.execute(
                "INSERT INTO delivery_failures (action_id, kind, action, reason, failed_at)
                 VALUES ('a1', 'delete-patient', '{}', ?1, 'now')",
                [reason],
            )
            .unwrap();
        }

        run(&mut conn).unwrap();

        let reason: String = conn
            .query_row("SELECT reason FROM delivery_failures", [], |row| row.get(0))
            .unwrap();
        assert_eq!(reason, "first");
    }
}
