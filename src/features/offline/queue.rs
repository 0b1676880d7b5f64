//! The offline mutation queue.
//!
//! Holds pending mutations in submission order. Every mutation is applied to
//! the latest persisted queue and written back before it becomes visible in
//! memory; if the write fails the in-memory queue is left exactly as it was.
//! After a mutation the in-memory queue mirrors the store, including entries
//! other processes wrote.

use std::collections::VecDeque;

use tracing::debug;

use super::action::QueuedAction;
use super::store::QueueStore;
use crate::error::MedivaultError;

/// Durable FIFO of pending mutations, deduplicated by action id.
pub struct OfflineQueue<S> {
    store: S,
    entries: VecDeque<QueuedAction>,
}

impl<S: QueueStore> OfflineQueue<S> {
    /// Load the persisted queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn hydrate(store: S) -> Result<Self, MedivaultError> {
        let entries = dedupe(store.load()?);
        debug!(size = entries.len(), "offline queue hydrated");
        Ok(Self { store, entries })
    }

    /// Append `action` unless an entry with the same id is already queued.
    ///
    /// Returns `false` when the id was already present; that is not an error.
    /// The check runs against the persisted queue, so an id another process
    /// queued counts as present.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated queue cannot be persisted. The
    /// in-memory queue is unchanged in that case.
    pub fn enqueue(&mut self, action: QueuedAction) -> Result<bool, MedivaultError> {
        let mut added = false;
        let latest = self.store.update(&mut |entries| {
            added = !entries.iter().any(|e| e.id == action.id);
            if added {
                entries.push(action.clone());
            }
            added
        })?;
        self.entries = dedupe(latest);

        if added {
            debug!(id = %action.id, kind = %action.kind(), size = self.entries.len(), "enqueued");
        } else {
            debug!(id = %action.id, "duplicate enqueue absorbed");
        }
        Ok(added)
    }

    /// The oldest entry, without removing it.
    #[must_use]
    pub fn peek_head(&self) -> Option<&QueuedAction> {
        self.entries.front()
    }

    /// Remove the head entry. No-op on an empty queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated queue cannot be persisted. The
    /// in-memory queue is unchanged in that case.
    pub fn dequeue(&mut self) -> Result<Option<QueuedAction>, MedivaultError> {
        self.remove_head_where(|_| true)
    }

    /// Remove the head entry only if it is still `id`.
    ///
    /// Used by the drain loop, which releases the queue while a remote call
    /// is in flight. Another process may have removed the entry meanwhile.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated queue cannot be persisted.
    pub fn dequeue_if_head(&mut self, id: &str) -> Result<Option<QueuedAction>, MedivaultError> {
        self.remove_head_where(|head| head.id == id)
    }

    fn remove_head_where(
        &mut self,
        matches: impl Fn(&QueuedAction) -> bool,
    ) -> Result<Option<QueuedAction>, MedivaultError> {
        let mut removed = None;
        let latest = self.store.update(&mut |entries| {
            if entries.first().is_some_and(&matches) {
                removed = Some(entries.remove(0));
            }
            removed.is_some()
        })?;
        self.entries = dedupe(latest);

        if let Some(action) = &removed {
            debug!(id = %action.id, size = self.entries.len(), "dequeued");
        }
        Ok(removed)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry with `id` is pending.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Pending entries, head first.
    pub fn entries(&self) -> impl Iterator<Item = &QueuedAction> {
        self.entries.iter()
    }

    /// Replace the in-memory queue with the persisted one.
    ///
    /// Picks up entries written by another process sharing the same store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read; the in-memory queue is
    /// unchanged in that case.
    pub fn reload(&mut self) -> Result<(), MedivaultError> {
        self.entries = dedupe(self.store.load()?);
        Ok(())
    }
}

/// Keep the first occurrence of each id. A blob written by hand or by an
/// older build could carry duplicates.
fn dedupe(actions: Vec<QueuedAction>) -> VecDeque<QueuedAction> {
    let mut entries: VecDeque<QueuedAction> = VecDeque::with_capacity(actions.len());
    for action in actions {
        if !entries.iter().any(|e| e.id == action.id) {
            entries.push_back(action);
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::features::offline::action::PendingMutation;
    use crate::features::offline::store::KvQueueStore;
    use crate::storage::{Database, MemoryKvStore, SqliteKvStore};

    /// Store whose writes can be switched off.
    struct FlakyStore {
        inner: KvQueueStore<MemoryKvStore>,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: KvQueueStore::new(MemoryKvStore::new()),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    impl QueueStore for &FlakyStore {
        fn load(&self) -> Result<Vec<QueuedAction>, MedivaultError> {
            self.inner.load()
        }

        fn save(&self, actions: &[QueuedAction]) -> Result<(), MedivaultError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(MedivaultError::Storage("disk unavailable".to_string()));
            }
            self.inner.save(actions)
        }

        fn update(
            &self,
            change: &mut dyn FnMut(&mut Vec<QueuedAction>) -> bool,
        ) -> Result<Vec<QueuedAction>, MedivaultError> {
            let mut actions = self.inner.load()?;
            if change(&mut actions) {
                self.save(&actions)?;
            }
            Ok(actions)
        }
    }

    fn action(id: &str) -> QueuedAction {
        QueuedAction::new(id, PendingMutation::DeletePatient { patient_id: 1 })
    }

    fn ids<S: QueueStore>(queue: &OfflineQueue<S>) -> Vec<String> {
        queue.entries().map(|a| a.id.clone()).collect()
    }

    fn memory_queue() -> OfflineQueue<KvQueueStore<MemoryKvStore>> {
        OfflineQueue::hydrate(KvQueueStore::new(MemoryKvStore::new())).unwrap()
    }

    #[test]
    fn test_duplicates_are_absorbed_in_first_submission_order() {
        let mut queue = memory_queue();

        let submissions = ["a", "b", "a", "c", "b", "b", "d", "a"];
        for id in submissions {
            queue.enqueue(action(id)).unwrap();
        }

        assert_eq!(ids(&queue), vec!["a", "b", "c", "d"]);
        assert_eq!(queue.size(), 4);
    }

    #[test]
    fn test_duplicate_returns_false() {
        let mut queue = memory_queue();
        assert!(queue.enqueue(action("a1")).unwrap());
        assert!(!queue.enqueue(action("a1")).unwrap());
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_duplicate_keeps_original_payload() {
        let mut queue = memory_queue();
        queue.enqueue(action("a1")).unwrap();
        queue
            .enqueue(QueuedAction::new(
                "a1",
                PendingMutation::DeletePatient { patient_id: 99 },
            ))
            .unwrap();

        assert_eq!(
            queue.peek_head().unwrap().action,
            PendingMutation::DeletePatient { patient_id: 1 }
        );
    }

    #[test]
    fn test_dequeue_then_peek_never_returns_removed() {
        let mut queue = memory_queue();
        for id in ["a", "b", "c"] {
            queue.enqueue(action(id)).unwrap();
        }

        while let Some(removed) = queue.dequeue().unwrap() {
            if let Some(head) = queue.peek_head() {
                assert_ne!(head.id, removed.id);
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_queue_operations_are_noops() {
        let mut queue = memory_queue();
        assert!(queue.peek_head().is_none());
        assert!(queue.dequeue().unwrap().is_none());
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn test_dequeue_if_head_checks_id() {
        let mut queue = memory_queue();
        queue.enqueue(action("a")).unwrap();
        queue.enqueue(action("b")).unwrap();

        assert!(queue.dequeue_if_head("b").unwrap().is_none());
        assert_eq!(queue.size(), 2);

        assert_eq!(queue.dequeue_if_head("a").unwrap().unwrap().id, "a");
        assert_eq!(ids(&queue), vec!["b"]);
    }

    #[test]
    fn test_reload_after_restart_preserves_order() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        let open = || {
            let kv = SqliteKvStore::new(Database::open_at(&path).unwrap());
            OfflineQueue::hydrate(KvQueueStore::new(kv)).unwrap()
        };

        let before = {
            let mut queue = open();
            for id in ["a1", "a2", "a3"] {
                queue.enqueue(action(id)).unwrap();
            }
            queue.dequeue().unwrap();
            queue.enqueue(action("a4")).unwrap();
            queue.entries().cloned().collect::<Vec<_>>()
        };

        let after = open();
        assert_eq!(after.entries().cloned().collect::<Vec<_>>(), before);
        assert_eq!(ids(&after), vec!["a2", "a3", "a4"]);
    }

    #[test]
    fn test_failed_enqueue_rolls_back() {
        let store = FlakyStore::new();
        let mut queue = OfflineQueue::hydrate(&store).unwrap();
        queue.enqueue(action("a1")).unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = queue.enqueue(action("a2")).unwrap_err();
        assert!(matches!(err, MedivaultError::Storage(_)));

        // Memory and disk agree
        assert_eq!(ids(&queue), vec!["a1"]);
        assert_eq!(store.inner.load().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_dequeue_rolls_back() {
        let store = FlakyStore::new();
        let mut queue = OfflineQueue::hydrate(&store).unwrap();
        queue.enqueue(action("a1")).unwrap();
        queue.enqueue(action("a2")).unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(queue.dequeue().is_err());
        assert_eq!(ids(&queue), vec!["a1", "a2"]);

        store.fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(queue.dequeue().unwrap().unwrap().id, "a1");
        assert_eq!(store.inner.load().unwrap().len(), 1);
    }

    #[test]
    fn test_reload_sees_other_writers() {
        let kv = MemoryKvStore::new();
        let mut first = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        let mut second = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();

        second.enqueue(action("from-cli")).unwrap();
        assert!(first.is_empty());

        first.reload().unwrap();
        assert_eq!(ids(&first), vec!["from-cli"]);
    }

    #[test]
    fn test_enqueue_does_not_resurrect_removed_entry() {
        let kv = MemoryKvStore::new();
        let mut watcher = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        watcher.enqueue(action("a1")).unwrap();

        // A second process loads the queue while a1 is still pending
        let mut cli = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        assert_eq!(ids(&cli), vec!["a1"]);

        watcher.dequeue_if_head("a1").unwrap();
        cli.enqueue(action("new")).unwrap();

        assert_eq!(ids(&cli), vec!["new"]);
        let persisted: Vec<_> = KvQueueStore::new(&kv)
            .load()
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(persisted, vec!["new"]);
    }

    #[test]
    fn test_dequeue_keeps_entries_added_elsewhere() {
        let kv = MemoryKvStore::new();
        let mut watcher = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        watcher.enqueue(action("a1")).unwrap();

        let mut cli = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        cli.enqueue(action("new")).unwrap();

        // The watcher never reloaded, yet its dequeue keeps "new"
        assert_eq!(watcher.dequeue_if_head("a1").unwrap().unwrap().id, "a1");
        assert_eq!(ids(&watcher), vec!["new"]);
        assert_eq!(KvQueueStore::new(&kv).load().unwrap().len(), 1);
    }

    #[test]
    fn test_dequeue_if_head_after_removal_elsewhere() {
        let kv = MemoryKvStore::new();
        let mut first = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        first.enqueue(action("a1")).unwrap();
        first.enqueue(action("a2")).unwrap();

        let mut second = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        second.dequeue().unwrap();

        // a1 is gone from the store; a2 must not be removed in its place
        assert!(first.dequeue_if_head("a1").unwrap().is_none());
        assert_eq!(ids(&first), vec!["a2"]);
    }

    #[test]
    fn test_duplicate_check_uses_persisted_queue() {
        let kv = MemoryKvStore::new();
        let mut first = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();
        let mut second = OfflineQueue::hydrate(KvQueueStore::new(&kv)).unwrap();

        assert!(first.enqueue(action("a1")).unwrap());
        assert!(!second.enqueue(action("a1")).unwrap());
        assert_eq!(ids(&second), vec!["a1"]);
    }
}
