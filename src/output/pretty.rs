use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::api::SessionUser;
use crate::features::offline::{DrainReport, FailureRecord, QueuedAction, StopReason};

/// Format pending actions as a table, head first
pub fn format_queue_pretty(actions: &[QueuedAction], total: usize) -> String {
    if actions.is_empty() {
        return "Offline queue (0 pending)\n  Nothing to sync".to_string();
    }

    let mut output = format!("Offline queue ({total} pending)\n");
    output.push_str(&"─".repeat(72));
    output.push('\n');

    for (position, action) in actions.iter().enumerate() {
        let marker = if position == 0 {
            "next".cyan().bold().to_string()
        } else {
            format!("{:>4}", position + 1).dimmed().to_string()
        };
        output.push_str(&format!(
            "{marker}  {:<20} {:<22} {}\n",
            action.id.bold(),
            action.kind().as_str(),
            action.action.target().dimmed()
        ));
    }

    if total > actions.len() {
        output.push_str(&format!(
            "{}\n",
            format!("... and {} more", total - actions.len()).dimmed()
        ));
    }

    output
}

/// Format the pending count and the next action
pub fn format_status_pretty(size: usize, head: Option<&QueuedAction>, failures: i64) -> String {
    let mut lines = Vec::new();

    lines.push("Offline Queue Status".bold().to_string());
    lines.push("─".repeat(40));
    lines.push(format!(
        "  Pending:    {} {}",
        size,
        if size > 0 {
            "actions waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));

    if let Some(head) = head {
        lines.push(format!("  Next:       {} {}", head.id, head.kind().as_str().dimmed()));
        lines.push(format!("  Queued:     {}", age(head.queued_at).dimmed()));
    }

    if failures > 0 {
        lines.push(format!(
            "  Dropped:    {} {}",
            failures,
            "see 'medivault sync failures'".red()
        ));
    }

    if size > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'medivault sync run' to deliver pending actions"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Format a single action with its payload
pub fn format_action_pretty(action: &QueuedAction) -> String {
    let mut output = format!("{} {}\n", action.kind().display_name().bold(), action.id);
    output.push_str(&format!("  {}: {}\n", "Target".dimmed(), action.action.target()));
    output.push_str(&format!(
        "  {}: {}\n",
        "Queued".dimmed(),
        action.queued_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let payload = serde_json::to_value(&action.action)
        .ok()
        .and_then(|v| v.get("payload").cloned())
        .and_then(|p| serde_json::to_string_pretty(&p).ok())
        .unwrap_or_default();
    output.push_str(&format!("  {}:\n", "Payload".dimmed()));
    for line in payload.lines() {
        output.push_str(&format!("    {line}\n"));
    }

    output
}

/// Summarize a drain cycle
pub fn format_drain_pretty(report: &DrainReport) -> String {
    let mut lines = Vec::new();

    if report.processed() == 0 && report.stop == StopReason::Drained {
        return "No pending actions to sync.".to_string();
    }

    if !report.delivered.is_empty() {
        lines.push(format!(
            "{} Delivered {} action(s)",
            "✓".green(),
            report.delivered.len()
        ));
    }

    for dropped in &report.dropped {
        lines.push(format!(
            "{} Dropped {} ({}): {}",
            "✗".red(),
            dropped.action.id,
            dropped.action.kind(),
            dropped.reason.red()
        ));
    }

    let stop = match &report.stop {
        StopReason::Drained => "Queue is empty.".green().to_string(),
        StopReason::Offline => "Server unreachable, will retry later.".yellow().to_string(),
        StopReason::Transient { id, error } => {
            format!("{} {id}: {error}", "Paused at".yellow())
        }
        StopReason::AuthRequired { id, error } => format!(
            "{} {id}: {error}\nRun 'medivault login' to resume.",
            "Session rejected at".red()
        ),
        StopReason::AlreadyDraining => "Another sync is already running.".yellow().to_string(),
    };
    lines.push(stop);

    if report.remaining > 0 {
        lines.push(format!("{} action(s) still pending", report.remaining).dimmed().to_string());
    }

    lines.join("\n")
}

/// Format the failure log, newest first
pub fn format_failures_pretty(records: &[FailureRecord]) -> String {
    if records.is_empty() {
        return "No dropped actions.".to_string();
    }

    let mut lines = Vec::new();
    lines.push(format!("Dropped actions ({})", records.len()));
    lines.push("─".repeat(72));

    for record in records {
        lines.push(format!(
            "{}  {:<20} {}",
            record.failed_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            record.action_id.bold(),
            record.kind
        ));
        lines.push(format!("      {}", record.reason.red()));
    }

    lines.join("\n")
}

/// Format the signed-in user
pub fn format_user_pretty(user: Option<&SessionUser>) -> String {
    match user {
        Some(user) => format!(
            "{} <{}>\n  {}: {}\n  {}: {}",
            user.name.bold(),
            user.email,
            "Role".dimmed(),
            user.role,
            "User ID".dimmed(),
            user.user_id
        ),
        None => "Not logged in".to_string(),
    }
}

fn age(at: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(at);
    if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}
