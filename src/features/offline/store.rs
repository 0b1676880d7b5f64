//! Durable backing for the offline queue.
//!
//! The queue is persisted as one blob: read whole at startup, written whole
//! after every mutation. Mutations re-read the blob under the store's write
//! lock, so processes sharing the store never overwrite each other's entries.

use tracing::debug;

use super::action::QueuedAction;
use crate::error::MedivaultError;
use crate::storage::KeyValueStore;

/// Store key holding the serialized queue.
pub const QUEUE_KEY: &str = "offline_queue";

/// Whole-queue persistence.
pub trait QueueStore {
    /// Read the persisted queue. An absent queue loads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the blob is corrupt.
    fn load(&self) -> Result<Vec<QueuedAction>, MedivaultError>;

    /// Replace the persisted queue. Must be durable before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be guaranteed.
    fn save(&self, actions: &[QueuedAction]) -> Result<(), MedivaultError>;

    /// Apply `change` to the latest persisted queue and write it back, as one
    /// atomic step. `change` returns whether it modified the queue; an
    /// unmodified queue is not rewritten.
    ///
    /// Returns the persisted queue after the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written. Nothing is
    /// persisted in that case.
    fn update(
        &self,
        change: &mut dyn FnMut(&mut Vec<QueuedAction>) -> bool,
    ) -> Result<Vec<QueuedAction>, MedivaultError>;
}

/// [`QueueStore`] on top of any [`KeyValueStore`].
pub struct KvQueueStore<K> {
    kv: K,
}

impl<K: KeyValueStore> KvQueueStore<K> {
    #[must_use]
    pub const fn new(kv: K) -> Self {
        Self { kv }
    }
}

fn decode(blob: Option<&str>) -> Result<Vec<QueuedAction>, MedivaultError> {
    let Some(blob) = blob else {
        return Ok(Vec::new());
    };
    serde_json::from_str(blob).map_err(|e| {
        MedivaultError::Storage(format!("Persisted offline queue is unreadable: {e}"))
    })
}

impl<K: KeyValueStore> QueueStore for KvQueueStore<K> {
    fn load(&self) -> Result<Vec<QueuedAction>, MedivaultError> {
        let actions = decode(self.kv.get(QUEUE_KEY)?.as_deref())?;
        debug!(count = actions.len(), "loaded offline queue");
        Ok(actions)
    }

    fn save(&self, actions: &[QueuedAction]) -> Result<(), MedivaultError> {
        let blob = serde_json::to_string(actions)?;
        self.kv.set(QUEUE_KEY, &blob)
    }

    fn update(
        &self,
        change: &mut dyn FnMut(&mut Vec<QueuedAction>) -> bool,
    ) -> Result<Vec<QueuedAction>, MedivaultError> {
        let mut latest = Vec::new();
        self.kv.update(QUEUE_KEY, &mut |blob| {
            let mut actions = decode(blob.as_deref())?;
            let changed = change(&mut actions);
            let next = if changed {
                Some(serde_json::to_string(&actions)?)
            } else {
                None
            };
            latest = actions;
            Ok(next)
        })?;
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::offline::action::PendingMutation;
    use crate::storage::MemoryKvStore;

    #[test]
    fn test_missing_blob_loads_empty() {
        let store = KvQueueStore::new(MemoryKvStore::new());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let store = KvQueueStore::new(MemoryKvStore::new());
        let actions = vec![
            QueuedAction::new("a1", PendingMutation::DeletePatient { patient_id: 1 }),
            QueuedAction::new("a2", PendingMutation::DeletePatient { patient_id: 2 }),
        ];

        store.save(&actions).unwrap();
        assert_eq!(store.load().unwrap(), actions);
    }

    #[test]
    fn test_corrupt_blob_is_storage_error() {
        let kv = MemoryKvStore::new();
        kv.set(QUEUE_KEY, "{not json").unwrap();

        let err = KvQueueStore::new(&kv).load().unwrap_err();
        assert!(matches!(err, MedivaultError::Storage(_)));
    }

    #[test]
    fn test_update_applies_to_latest_blob() {
        let kv = MemoryKvStore::new();
        let store = KvQueueStore::new(&kv);
        store
            .save(&[QueuedAction::new("a1", PendingMutation::DeletePatient { patient_id: 1 })])
            .unwrap();

        let latest = store
            .update(&mut |actions| {
                actions.push(QueuedAction::new(
                    "a2",
                    PendingMutation::DeletePatient { patient_id: 2 },
                ));
                true
            })
            .unwrap();

        let ids: Vec<_> = latest.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        assert_eq!(store.load().unwrap(), latest);
    }

    #[test]
    fn test_unchanged_update_does_not_write() {
        let kv = MemoryKvStore::new();
        let store = KvQueueStore::new(&kv);

        let latest = store.update(&mut |_| false).unwrap();

        assert!(latest.is_empty());
        assert_eq!(kv.get(QUEUE_KEY).unwrap(), None);
    }
}
