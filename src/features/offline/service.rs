//! Owner of the offline queue.
//!
//! Producers call [`SyncService::enqueue`]; the drain cycle is the only other
//! writer in this process. All queue access goes through one mutex, held for
//! each read-modify-persist step but never across a remote call, so producers
//! are not blocked while a delivery is in flight. Other processes sharing the
//! store are serialized by the store itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::action::QueuedAction;
use super::drain::{deliver, Connectivity, Delivery, DrainReport, DrainTrigger, StopReason};
use super::queue::OfflineQueue;
use super::report::{DroppedAction, FailureReporter};
use super::store::QueueStore;
use crate::api::{FailureClass, RemoteApi};
use crate::error::MedivaultError;

/// Process-wide owner of the offline queue.
pub struct SyncService<S> {
    queue: Mutex<OfflineQueue<S>>,
    draining: AtomicBool,
}

/// Clears the draining flag when a cycle ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: QueueStore> SyncService<S> {
    #[must_use]
    pub fn new(queue: OfflineQueue<S>) -> Self {
        Self {
            queue: Mutex::new(queue),
            draining: AtomicBool::new(false),
        }
    }

    /// Hydrate the queue from `store` and take ownership of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted queue cannot be read.
    pub fn hydrate(store: S) -> Result<Self, MedivaultError> {
        Ok(Self::new(OfflineQueue::hydrate(store)?))
    }

    // Queue mutations commit only after a successful write, so a panic
    // mid-operation leaves a consistent queue behind and the poison is safe
    // to ignore.
    fn lock(&self) -> MutexGuard<'_, OfflineQueue<S>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit an action. Returns `false` if its id was already queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted.
    pub fn enqueue(&self, action: QueuedAction) -> Result<bool, MedivaultError> {
        self.lock().enqueue(action)
    }

    /// Remove the head without delivering it.
    ///
    /// Refused while this service is draining. A drain in another process
    /// only ever removes the entry it just delivered, so racing one can at
    /// worst discard an entry that is being delivered at that moment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` while a drain cycle is running, or an error if
    /// the queue cannot be persisted.
    pub fn discard_head(&self) -> Result<Option<QueuedAction>, MedivaultError> {
        let _guard = DrainGuard::acquire(&self.draining).ok_or_else(|| {
            MedivaultError::InvalidInput("Cannot discard while a sync is running".to_string())
        })?;
        self.lock().dequeue()
    }

    /// Pending count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// The next action a drain would attempt.
    #[must_use]
    pub fn peek_head(&self) -> Option<QueuedAction> {
        self.lock().peek_head().cloned()
    }

    /// Copy of the pending actions, head first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedAction> {
        self.lock().entries().cloned().collect()
    }

    /// Whether a drain cycle is running.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Re-read the persisted queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn refresh(&self) -> Result<(), MedivaultError> {
        self.lock().reload()
    }

    /// Run one drain cycle.
    ///
    /// Returns immediately with [`StopReason::AlreadyDraining`] if another
    /// cycle is in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if a dequeue cannot be persisted or a dropped action
    /// cannot be reported. The affected entry stays at the head.
    pub fn drain<A, C, R>(
        &self,
        api: &A,
        connectivity: &C,
        reporter: &R,
        trigger: DrainTrigger,
    ) -> Result<DrainReport, MedivaultError>
    where
        A: RemoteApi + ?Sized,
        C: Connectivity + ?Sized,
        R: FailureReporter + ?Sized,
    {
        let mut report = DrainReport::new(trigger);

        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!(%trigger, "drain already running, trigger merged");
            report.stop = StopReason::AlreadyDraining;
            report.remaining = self.size();
            return Ok(report);
        };

        info!(%trigger, pending = self.size(), "drain started");

        report.stop = loop {
            let Some(head) = self.peek_head() else {
                break StopReason::Drained;
            };

            if !connectivity.is_online() {
                break StopReason::Offline;
            }

            match deliver(api, &head.action) {
                Delivery::Delivered => {
                    self.lock().dequeue_if_head(&head.id)?;
                    debug!(id = %head.id, kind = %head.kind(), "delivered");
                    report.delivered.push(head.id);
                }
                Delivery::Failed {
                    class: FailureClass::Transient,
                    error,
                } => {
                    info!(id = %head.id, %error, "transient failure, will retry");
                    break StopReason::Transient { id: head.id, error };
                }
                Delivery::Failed {
                    class: FailureClass::AuthRequired,
                    error,
                } => {
                    warn!(id = %head.id, %error, "session rejected, drain paused until login");
                    break StopReason::AuthRequired { id: head.id, error };
                }
                Delivery::Failed {
                    class: FailureClass::Permanent,
                    error,
                } => {
                    let id = head.id.clone();
                    let dropped = DroppedAction::new(head, error);
                    reporter.report(&dropped)?;
                    self.lock().dequeue_if_head(&id)?;
                    report.dropped.push(dropped);
                }
            }
        };

        report.remaining = self.size();
        info!(
            %trigger,
            delivered = report.delivered.len(),
            dropped = report.dropped.len(),
            remaining = report.remaining,
            stop = ?report.stop,
            "drain finished"
        );
        Ok(report)
    }
}
