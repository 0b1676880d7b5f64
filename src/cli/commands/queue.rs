//! Queue command implementation.
//!
//! Inspects and edits the offline queue directly; nothing here talks to the
//! server.

use colored::Colorize;
use serde_json::json;

use super::Context;
use crate::cli::args::{OutputFormat, QueueCommands};
use crate::error::MedivaultError;
use crate::features::offline::{ActionKind, QueueStore, QueuedAction, SyncService};
use crate::output::{format_action, format_queue, format_status, to_json};

/// Execute queue subcommands.
///
/// # Errors
///
/// Returns an error if the input is invalid or the queue cannot be read or
/// persisted.
pub fn queue(ctx: &Context, cmd: QueueCommands) -> Result<String, MedivaultError> {
    let service = ctx.sync_service()?;

    match cmd {
        QueueCommands::Add { kind, id, payload } => {
            add_action(&service, &kind, id, &payload, ctx.format)
        }
        QueueCommands::List { limit } => list_actions(&service, limit, ctx.format),
        QueueCommands::Status => {
            let failures = ctx.failure_log()?.count()?;
            show_status(&service, failures, ctx.format)
        }
        QueueCommands::Peek => peek_action(&service, ctx.format),
        QueueCommands::Drop { force } => drop_head(&service, force, ctx.format),
    }
}

/// Read `--payload`, either inline JSON or `@path`.
fn read_payload(raw: &str) -> Result<serde_json::Value, MedivaultError> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            MedivaultError::InvalidInput(format!("Cannot read payload file {path}: {e}"))
        })?,
        None => raw.to_string(),
    };

    serde_json::from_str(&text)
        .map_err(|e| MedivaultError::InvalidInput(format!("Payload is not valid JSON: {e}")))
}

/// Pick the action id. Uploads default to their upload id, which the server
/// also deduplicates on.
fn resolve_id(
    kind: ActionKind,
    id: Option<String>,
    payload: &serde_json::Value,
) -> Result<String, MedivaultError> {
    if let Some(id) = id {
        return Ok(id);
    }

    if kind == ActionKind::UploadPrescription {
        if let Some(upload_id) = payload.get("uploadId").and_then(serde_json::Value::as_str) {
            return Ok(upload_id.to_string());
        }
    }

    Err(MedivaultError::InvalidInput(format!(
        "--id is required for {kind}"
    )))
}

fn add_action<S: QueueStore>(
    service: &SyncService<S>,
    kind: &str,
    id: Option<String>,
    payload: &str,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    let kind: ActionKind = kind.parse()?;
    let payload = read_payload(payload)?;
    let id = resolve_id(kind, id, &payload)?;

    let action = QueuedAction::from_parts(id, kind, payload)?;
    let queued = service.enqueue(action.clone())?;
    let pending = service.size();

    match format {
        OutputFormat::Json => to_json(&json!({
            "queued": queued,
            "id": action.id,
            "kind": kind,
            "pending": pending,
        })),
        OutputFormat::Pretty => {
            if queued {
                Ok(format!(
                    "Queued {} {} ({pending} pending)",
                    kind.display_name(),
                    action.id.bold()
                ))
            } else {
                Ok(format!(
                    "{} is already queued ({pending} pending)",
                    action.id.bold()
                ))
            }
        }
    }
}

fn list_actions<S: QueueStore>(
    service: &SyncService<S>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    let actions = service.snapshot();
    let total = actions.len();
    let shown = limit.map_or(total, |n| n.min(total));
    format_queue(&actions[..shown], total, format)
}

fn show_status<S: QueueStore>(
    service: &SyncService<S>,
    failures: i64,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    let head = service.peek_head();
    format_status(service.size(), head.as_ref(), failures, format)
}

fn peek_action<S: QueueStore>(
    service: &SyncService<S>,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    match (service.peek_head(), format) {
        (Some(head), _) => format_action(&head, format),
        (None, OutputFormat::Json) => Ok("null".to_string()),
        (None, OutputFormat::Pretty) => Ok("Queue is empty.".to_string()),
    }
}

fn drop_head<S: QueueStore>(
    service: &SyncService<S>,
    force: bool,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    if !force {
        return Err(MedivaultError::InvalidInput(
            "Use --force to discard the next queued action".to_string(),
        ));
    }

    let removed = service.discard_head()?;
    if let Some(action) = &removed {
        tracing::warn!(id = %action.id, kind = %action.kind(), "queued action discarded by operator");
    }

    match format {
        OutputFormat::Json => to_json(&json!({
            "dropped": removed,
            "pending": service.size(),
        })),
        OutputFormat::Pretty => Ok(match removed {
            Some(action) => format!("Discarded {} {}", action.kind().display_name(), action.id),
            None => "Queue is empty.".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::offline::KvQueueStore;
    use crate::storage::MemoryKvStore;

    fn service() -> SyncService<KvQueueStore<MemoryKvStore>> {
        SyncService::hydrate(KvQueueStore::new(MemoryKvStore::new())).unwrap()
    }

    #[test]
    fn test_read_payload_inline_and_file() {
        assert_eq!(read_payload(r#"{"patientId": 1}"#).unwrap()["patientId"], 1);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, r#"{"prescriptionId": 9}"#).unwrap();
        let value = read_payload(&format!("@{}", path.display())).unwrap();
        assert_eq!(value["prescriptionId"], 9);

        assert!(matches!(
            read_payload("{oops"),
            Err(MedivaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_resolve_id_defaults_to_upload_id() {
        let payload = json!({"uploadId": "up-42", "patientId": 1, "filePath": "/tmp/rx.jpg"});
        assert_eq!(
            resolve_id(ActionKind::UploadPrescription, None, &payload).unwrap(),
            "up-42"
        );
        assert_eq!(
            resolve_id(ActionKind::UploadPrescription, Some("a1".into()), &payload).unwrap(),
            "a1"
        );
        assert!(resolve_id(ActionKind::DeletePatient, None, &json!({"patientId": 1})).is_err());
    }

    #[test]
    fn test_add_action_absorbs_duplicates() {
        let service = service();
        let payload = r#"{"patientId": 5}"#;

        let first = add_action(&service, "delete-patient", Some("a1".into()), payload, OutputFormat::Pretty)
            .unwrap();
        assert!(first.contains("Queued"));

        let second = add_action(&service, "delete-patient", Some("a1".into()), payload, OutputFormat::Json)
            .unwrap();
        assert!(second.contains("\"queued\": false"));
        assert_eq!(service.size(), 1);
    }

    #[test]
    fn test_add_action_rejects_bad_payload() {
        let service = service();
        let err = add_action(
            &service,
            "delete-patient",
            Some("a1".into()),
            r#"{"prescriptionId": 5}"#,
            OutputFormat::Pretty,
        )
        .unwrap_err();
        assert!(matches!(err, MedivaultError::InvalidInput(_)));
        assert_eq!(service.size(), 0);
    }

    #[test]
    fn test_list_actions_limit() {
        let service = service();
        for id in ["a1", "a2", "a3"] {
            add_action(&service, "delete-patient", Some(id.into()), r#"{"patientId": 1}"#, OutputFormat::Pretty)
                .unwrap();
        }

        let output = list_actions(&service, Some(1), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["count"], 3);
        assert_eq!(value["items"].as_array().unwrap().len(), 1);
        assert_eq!(value["items"][0]["id"], "a1");
    }

    #[test]
    fn test_drop_head_requires_force() {
        let service = service();
        add_action(&service, "delete-patient", Some("a1".into()), r#"{"patientId": 1}"#, OutputFormat::Pretty)
            .unwrap();

        assert!(drop_head(&service, false, OutputFormat::Pretty).is_err());
        assert_eq!(service.size(), 1);

        let output = drop_head(&service, true, OutputFormat::Pretty).unwrap();
        assert!(output.contains("a1"));
        assert_eq!(service.size(), 0);
    }

    #[test]
    fn test_peek_empty() {
        let service = service();
        assert_eq!(peek_action(&service, OutputFormat::Json).unwrap(), "null");
        assert_eq!(
            peek_action(&service, OutputFormat::Pretty).unwrap(),
            "Queue is empty."
        );
    }
}
