//! Offline mutation queue.
//!
//! Mutations made while the backend is unreachable are queued durably and
//! replayed in submission order once it comes back:
//! - [`OfflineQueue`]: the deduplicated FIFO and its persistence contract
//! - [`SyncService`]: single owner of the queue, runs drain cycles
//! - [`deliver`]: maps each action kind to its remote call
//! - [`FailureLog`]: where permanently failed actions end up

pub mod action;
pub mod drain;
pub mod queue;
pub mod report;
pub mod service;
pub mod store;

pub use action::{ActionKind, PendingMutation, QueuedAction};
pub use drain::{
    deliver, AlwaysOnline, Connectivity, Delivery, DrainReport, DrainTrigger, RetryTracker,
    StalledHead, StopReason,
};
pub use queue::OfflineQueue;
pub use report::{DroppedAction, FailureLog, FailureRecord, FailureReporter};
pub use service::SyncService;
pub use store::{KvQueueStore, QueueStore, QUEUE_KEY};
