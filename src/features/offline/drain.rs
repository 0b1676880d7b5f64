//! Replay of queued actions against the remote API.
//!
//! A drain cycle walks the queue head first. Each head is delivered and then:
//! - delivered: dequeued, continue
//! - transient failure: stop, queue untouched
//! - auth required: stop, queue untouched
//! - permanent failure: reported, dequeued, continue
//!
//! Delivery is strictly sequential: a later action may depend on an earlier
//! one having taken effect.

use serde::Serialize;
use tracing::warn;

use super::action::PendingMutation;
use super::report::DroppedAction;
use crate::api::{ApiError, FailureClass, RemoteApi};

/// Reports whether the backend is currently reachable.
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

impl<T: Connectivity + ?Sized> Connectivity for &T {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}

/// Connectivity that never blocks a drain. Failed calls still count as transient.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// What started a drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainTrigger {
    /// Connectivity came back.
    Reconnected,
    /// Timer tick while online.
    Periodic,
    /// Explicit user request.
    Manual,
}

impl std::fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Reconnected => "reconnected",
            Self::Periodic => "periodic",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Why a drain cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The queue is empty.
    Drained,
    /// The backend is unreachable.
    Offline,
    /// The head failed in a way that should succeed later.
    Transient { id: String, error: String },
    /// The head was rejected for lack of a valid session.
    AuthRequired { id: String, error: String },
    /// Another drain cycle is already running.
    AlreadyDraining,
}

impl StopReason {
    /// Whether the cycle stopped with work left that it could not do.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::AuthRequired { .. })
    }

    /// The head that blocked the cycle, if any.
    #[must_use]
    pub fn blocked_id(&self) -> Option<&str> {
        match self {
            Self::Transient { id, .. } | Self::AuthRequired { id, .. } => Some(id),
            Self::Drained | Self::Offline | Self::AlreadyDraining => None,
        }
    }
}

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    pub trigger: DrainTrigger,
    /// Ids delivered, in delivery order.
    pub delivered: Vec<String>,
    /// Actions dropped after a permanent failure, in order.
    pub dropped: Vec<DroppedAction>,
    pub stop: StopReason,
    /// Entries still queued when the cycle ended.
    pub remaining: usize,
}

impl DrainReport {
    pub(crate) const fn new(trigger: DrainTrigger) -> Self {
        Self {
            trigger,
            delivered: Vec::new(),
            dropped: Vec::new(),
            stop: StopReason::Drained,
            remaining: 0,
        }
    }

    /// Number of remote calls that completed with a final outcome.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.delivered.len() + self.dropped.len()
    }
}

/// Result of delivering one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed { class: FailureClass, error: String },
}

/// Perform the remote call for `mutation` and classify the result.
pub fn deliver<A: RemoteApi + ?Sized>(api: &A, mutation: &PendingMutation) -> Delivery {
    let result = match mutation {
        PendingMutation::CreatePatient(request) => api.create_patient(request).map(drop),
        PendingMutation::UpdatePatient {
            patient_id,
            patient,
        } => api.update_patient(*patient_id, patient).map(drop),
        PendingMutation::DeletePatient { patient_id } => api.delete_patient(*patient_id),
        PendingMutation::UploadPrescription(upload) => api.upload_prescription(upload).map(drop),
        PendingMutation::UpdatePrescription {
            prescription_id,
            prescription,
        } => api
            .update_prescription(*prescription_id, prescription)
            .map(drop),
        PendingMutation::DeletePrescription { prescription_id } => {
            api.delete_prescription(*prescription_id)
        }
    };

    match result {
        Ok(()) => Delivery::Delivered,
        Err(e) => classify(mutation, &e),
    }
}

fn classify(mutation: &PendingMutation, e: &ApiError) -> Delivery {
    if e.took_effect() {
        warn!(action = %mutation.target(), error = %e, "server accepted mutation but response was unreadable");
        return Delivery::Delivered;
    }
    Delivery::Failed {
        class: e.class(),
        error: e.to_string(),
    }
}

/// A head that keeps failing transiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledHead {
    pub id: String,
    pub consecutive_failures: u32,
    pub last_error: String,
}

/// Counts consecutive blocked cycles on the same head.
///
/// The queue never gives up on a transient failure; deciding when to tell
/// the user is the caller's policy.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    threshold: u32,
    head: Option<String>,
    consecutive: u32,
    failed_cycles: u32,
}

impl RetryTracker {
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            head: None,
            consecutive: 0,
            failed_cycles: 0,
        }
    }

    const fn alerts_at(&self, count: u32) -> bool {
        let threshold = if self.threshold == 0 { 1 } else { self.threshold };
        count % threshold == 0
    }

    /// Record a cycle that could not run at all, e.g. a busy or unreadable
    /// store. Returns the consecutive count when it reaches the threshold,
    /// and again at every further multiple of it.
    pub fn observe_error(&mut self) -> Option<u32> {
        self.failed_cycles += 1;
        self.alerts_at(self.failed_cycles).then_some(self.failed_cycles)
    }

    /// Consecutive cycles that ended in an error.
    #[must_use]
    pub const fn failed_cycles(&self) -> u32 {
        self.failed_cycles
    }

    /// Feed a drain report. Returns the stalled head when the failure count
    /// reaches the threshold, and again at every further multiple of it.
    pub fn observe(&mut self, report: &DrainReport) -> Option<StalledHead> {
        self.failed_cycles = 0;
        let (id, error) = match &report.stop {
            StopReason::Transient { id, error } | StopReason::AuthRequired { id, error } => {
                (id, error)
            }
            // Offline or overlapping cycles say nothing about the head.
            StopReason::Offline | StopReason::AlreadyDraining => return None,
            StopReason::Drained => {
                self.reset();
                return None;
            }
        };

        if self.head.as_deref() == Some(id.as_str()) {
            self.consecutive += 1;
        } else {
            self.head = Some(id.clone());
            self.consecutive = 1;
        }

        self.alerts_at(self.consecutive).then(|| StalledHead {
            id: id.clone(),
            consecutive_failures: self.consecutive,
            last_error: error.clone(),
        })
    }

    /// Consecutive failures recorded for the current head.
    #[must_use]
    pub const fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn reset(&mut self) {
        self.head = None;
        self.consecutive = 0;
    }
}
