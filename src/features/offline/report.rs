//! Reporting of permanently failed actions.
//!
//! An action dropped from the queue is written to the `delivery_failures`
//! table first, so the data can still be recovered by hand. The table holds
//! one row per action id; the first report wins.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;
use tracing::error;

use super::action::QueuedAction;
use crate::error::MedivaultError;
use crate::storage::Database;

/// An action removed from the queue because it can never succeed.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedAction {
    pub action: QueuedAction,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl DroppedAction {
    #[must_use]
    pub fn new(action: QueuedAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Receives actions dropped by the drain loop.
pub trait FailureReporter {
    /// Record a dropped action.
    ///
    /// Called before the action leaves the queue; an error keeps it queued.
    /// If removing the action then fails, the next drain reports it again, so
    /// recording the same action twice must not duplicate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be recorded.
    fn report(&self, dropped: &DroppedAction) -> Result<(), MedivaultError>;
}

impl<T: FailureReporter + ?Sized> FailureReporter for &T {
    fn report(&self, dropped: &DroppedAction) -> Result<(), MedivaultError> {
        (**self).report(dropped)
    }
}

/// A row of the delivery failure log.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub id: i64,
    pub action_id: String,
    pub kind: String,
    /// The full action, if the stored JSON is still readable.
    pub action: Option<QueuedAction>,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Delivery failure log in `SQLite`.
pub struct FailureLog {
    db: Database,
}

impl FailureLog {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Most recent failures first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, limit: usize) -> Result<Vec<FailureRecord>, MedivaultError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(
                r"SELECT id, action_id, kind, action, reason, failed_at
                  FROM delivery_failures
                  ORDER BY id DESC
                  LIMIT ?1",
            )
            .map_err(|e| MedivaultError::Database(format!("Failed to prepare query: {e}")))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], row_to_record)
            .map_err(|e| MedivaultError::Database(format!("Failed to query failures: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| MedivaultError::Database(e.to_string()))?);
        }
        Ok(records)
    }

    /// Number of logged failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<i64, MedivaultError> {
        self.db
            .connection()
            .query_row("SELECT COUNT(*) FROM delivery_failures", [], |row| row.get(0))
            .map_err(|e| MedivaultError::Database(format!("Failed to count failures: {e}")))
    }

    /// Delete every logged failure. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize, MedivaultError> {
        self.db
            .connection()
            .execute("DELETE FROM delivery_failures", [])
            .map_err(|e| MedivaultError::Database(format!("Failed to clear failures: {e}")))
    }
}

impl FailureReporter for FailureLog {
    fn report(&self, dropped: &DroppedAction) -> Result<(), MedivaultError> {
        error!(
            id = %dropped.action.id,
            kind = %dropped.action.kind(),
            reason = %dropped.reason,
            "dropping queued action after permanent failure"
        );

        self.db
            .connection()
            .execute(
                r"INSERT OR IGNORE INTO delivery_failures (action_id, kind, action, reason, failed_at)
                  VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    dropped.action.id,
                    dropped.action.kind().as_str(),
                    serde_json::to_string(&dropped.action)?,
                    dropped.reason,
                    dropped.failed_at.to_rfc3339(),
                ],
            )
            .map_err(|e| MedivaultError::Storage(format!("Failed to record failure: {e}")))?;
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> Result<FailureRecord, rusqlite::Error> {
    let action_json: String = row.get(3)?;
    let failed_at_str: String = row.get(5)?;

    let failed_at = DateTime::parse_from_rfc3339(&failed_at_str)
        .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc));

    Ok(FailureRecord {
        id: row.get(0)?,
        action_id: row.get(1)?,
        kind: row.get(2)?,
        action: serde_json::from_str(&action_json).ok(),
        reason: row.get(4)?,
        failed_at,
    })
}
