//! Sync command implementation.
//!
//! Drives drain cycles against the configured server and exposes the
//! delivery failure log.

use std::time::Duration;

use colored::Colorize;
use serde_json::json;
use tracing::{info, warn};

use super::Context;
use crate::cli::args::{OutputFormat, SyncCommands};
use crate::error::MedivaultError;
use crate::api::RemoteApi;
use crate::features::offline::{
    Connectivity, DrainReport, DrainTrigger, FailureLog, FailureReporter, QueueStore,
    RetryTracker, StalledHead, SyncService,
};
use crate::output::{format_drain, format_failures, to_json};

/// Execute sync subcommands.
///
/// # Errors
///
/// Returns an error if the queue, session or failure log cannot be read or
/// written.
pub fn sync(ctx: &Context, cmd: SyncCommands) -> Result<String, MedivaultError> {
    match cmd {
        SyncCommands::Run => run_once(ctx),
        SyncCommands::Watch { interval, cycles } => {
            let interval = interval.unwrap_or(ctx.config.sync.watch_interval_secs);
            watch(ctx, Duration::from_secs(interval), cycles)
        }
        SyncCommands::Failures { limit, clear } => {
            failures(&ctx.failure_log()?, limit, clear, ctx.format)
        }
    }
}

/// One manual drain cycle.
fn run_once(ctx: &Context) -> Result<String, MedivaultError> {
    let service = ctx.sync_service()?;
    let client = ctx.api_client()?;
    let log = ctx.failure_log()?;

    if !client.has_token() && service.size() > 0 {
        warn!("no stored session, requests will be sent without a token");
    }

    let report = service.drain(&client, &client, &log, DrainTrigger::Manual)?;
    format_drain(&report, ctx.format)
}

/// Probe connectivity on an interval and drain whenever the server is reachable.
///
/// The first reachable probe, and every one after an unreachable one, counts
/// as a reconnect.
fn watch(ctx: &Context, interval: Duration, cycles: Option<u32>) -> Result<String, MedivaultError> {
    let service = ctx.sync_service()?;
    let client = ctx.api_client()?;
    let log = ctx.failure_log()?;
    let mut tracker = RetryTracker::new(ctx.config.sync.transient_alert_threshold);

    info!(interval_secs = interval.as_secs(), "watching for connectivity");

    let mut online = false;
    let mut cycle: u32 = 0;
    loop {
        cycle += 1;

        let reachable = client.is_online();
        if reachable {
            let trigger = if online {
                DrainTrigger::Periodic
            } else {
                DrainTrigger::Reconnected
            };
            if let Some(report) = watch_pass(&service, &client, &client, &log, trigger, &mut tracker)
            {
                emit(&report, ctx.format)?;
            }
        } else if online {
            info!("server unreachable, waiting to reconnect");
        }
        online = reachable;

        if cycles.is_some_and(|max| cycle >= max) {
            break;
        }
        std::thread::sleep(interval);
    }

    Ok(String::new())
}

/// Re-read the queue and drain it once.
///
/// A failed pass is logged and counted but never ends the watcher; the next
/// interval tries again.
fn watch_pass<S, A, C, R>(
    service: &SyncService<S>,
    api: &A,
    connectivity: &C,
    reporter: &R,
    trigger: DrainTrigger,
    tracker: &mut RetryTracker,
) -> Option<DrainReport>
where
    S: QueueStore,
    A: RemoteApi + ?Sized,
    C: Connectivity + ?Sized,
    R: FailureReporter + ?Sized,
{
    // Another process may have queued work since the last pass.
    let outcome = service
        .refresh()
        .and_then(|()| service.drain(api, connectivity, reporter, trigger));

    match outcome {
        Ok(report) => {
            if let Some(stalled) = tracker.observe(&report) {
                alert_stalled(&stalled);
            }
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, "sync pass failed, retrying next interval");
            if let Some(failed) = tracker.observe_error() {
                eprintln!(
                    "{}: sync has failed {failed} times in a row ({e})",
                    "warning".yellow().bold()
                );
            }
            None
        }
    }
}

/// Print a cycle's outcome as it happens. Quiet cycles print nothing.
fn emit(report: &DrainReport, format: OutputFormat) -> Result<(), MedivaultError> {
    if report.processed() == 0 && !report.stop.is_blocked() {
        return Ok(());
    }

    match format {
        // One object per line so the stream can be consumed incrementally
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
        OutputFormat::Pretty => println!("{}", format_drain(report, format)?),
    }
    Ok(())
}

fn alert_stalled(stalled: &StalledHead) {
    warn!(
        id = %stalled.id,
        failures = stalled.consecutive_failures,
        error = %stalled.last_error,
        "queue head keeps failing"
    );
    eprintln!(
        "{}: {} has failed {} times in a row ({})",
        "warning".yellow().bold(),
        stalled.id,
        stalled.consecutive_failures,
        stalled.last_error
    );
}

fn failures(
    log: &FailureLog,
    limit: usize,
    clear: bool,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    if clear {
        let count = log.clear()?;
        return match format {
            OutputFormat::Json => to_json(&json!({ "cleared": count })),
            OutputFormat::Pretty => Ok(format!("Cleared {count} dropped action(s)")),
        };
    }

    format_failures(&log.list(limit)?, format)
}
