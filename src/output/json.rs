//! JSON output formatting.

use serde::Serialize;
use serde_json::json;

use crate::api::SessionUser;
use crate::error::MedivaultError;
use crate::features::offline::{DrainReport, FailureRecord, QueuedAction};

/// Format pending actions as JSON
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_queue_json(actions: &[QueuedAction], total: usize) -> Result<String, MedivaultError> {
    let output = json!({
        "count": total,
        "items": actions
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format queue status as JSON
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_status_json(
    size: usize,
    head: Option<&QueuedAction>,
    failures: i64,
) -> Result<String, MedivaultError> {
    let output = json!({
        "pending": size,
        "head": head,
        "failures": failures
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format a drain report as JSON
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_drain_json(report: &DrainReport) -> Result<String, MedivaultError> {
    to_json(report)
}

/// Format the failure log as JSON
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_failures_json(records: &[FailureRecord]) -> Result<String, MedivaultError> {
    let output = json!({
        "count": records.len(),
        "items": records
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format the signed-in user as JSON
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_user_json(user: Option<&SessionUser>) -> Result<String, MedivaultError> {
    let output = json!({
        "loggedIn": user.is_some(),
        "user": user
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, MedivaultError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::offline::{DrainTrigger, DroppedAction, PendingMutation, StopReason};

    fn action(id: &str) -> QueuedAction {
        QueuedAction::new(id, PendingMutation::DeletePatient { patient_id: 3 })
    }

    #[test]
    fn test_format_queue_json_empty() {
        let result = format_queue_json(&[], 0).unwrap();
        assert!(result.contains("\"count\": 0"));
        assert!(result.contains("\"items\": []"));
    }

    #[test]
    fn test_format_queue_json_uses_wire_format() {
        let result = format_queue_json(&[action("a1")], 1).unwrap();
        assert!(result.contains("\"id\": \"a1\""));
        assert!(result.contains("\"kind\": \"delete-patient\""));
        assert!(result.contains("\"patientId\": 3"));
    }

    #[test]
    fn test_format_status_json_empty_head() {
        let result = format_status_json(0, None, 2).unwrap();
        assert!(result.contains("\"pending\": 0"));
        assert!(result.contains("\"head\": null"));
        assert!(result.contains("\"failures\": 2"));
    }

    #[test]
    fn test_format_drain_json() {
        let report = DrainReport {
            trigger: DrainTrigger::Manual,
            delivered: vec!["a1".to_string()],
            dropped: vec![DroppedAction::new(action("a2"), "HTTP 400: bad")],
            stop: StopReason::Transient {
                id: "a3".to_string(),
                error: "timeout".to_string(),
            },
            remaining: 1,
        };

        let value: serde_json::Value =
            serde_json::from_str(&format_drain_json(&report).unwrap()).unwrap();
        assert_eq!(value["trigger"], "manual");
        assert_eq!(value["delivered"][0], "a1");
        assert_eq!(value["dropped"][0]["action"]["id"], "a2");
        assert_eq!(value["stop"]["reason"], "transient");
        assert_eq!(value["stop"]["id"], "a3");
        assert_eq!(value["remaining"], 1);
    }

    #[test]
    fn test_format_user_json_logged_out() {
        let result = format_user_json(None).unwrap();
        assert!(result.contains("\"loggedIn\": false"));
    }
}
