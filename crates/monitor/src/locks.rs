//! Per-key async locks.
//!
//! The dedup check and the notification write must not interleave for the
//! same key, otherwise two evaluation tasks can both see "not yet notified"
//! and both persist. [`KeyedLocks`] hands out one `tokio::sync::Mutex` per
//! key and forgets it once nobody holds or waits for it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

struct Entry {
    slot: Slot,
    /// Holders plus waiters.
    users: usize,
}

pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Entry>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Entry>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Cancel safe: dropping the future while it waits deregisters it.
    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        let slot = {
            let mut slots = self.slots();
            let entry = slots.entry(key.clone()).or_insert_with(|| Entry {
                slot: Slot::default(),
                users: 0,
            });
            entry.users += 1;
            Arc::clone(&entry.slot)
        };

        // Registered before the wait, so a dropped future still releases.
        let mut held = KeyedGuard {
            owner: self,
            key,
            guard: None,
        };
        held.guard = Some(slot.lock_owned().await);
        held
    }

    /// Number of keys currently locked or waited on.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &K) {
        let mut slots = self.slots();
        if let Some(entry) = slots.get_mut(key) {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                slots.remove(key);
            }
        }
    }
}

/// Exclusive access to one key, or a pending wait for it; released on drop.
pub struct KeyedGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    owner: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyedGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("a").await;
            let _b = locks.lock("b").await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn same_key_is_serialised() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("k").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn waiter_keeps_slot_alive() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.lock("k").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("k").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn abandoned_wait_is_pruned() {
        let locks = KeyedLocks::new();
        let first = locks.lock("k").await;

        let mut waiting = Box::pin(locks.lock("k"));
        assert!(tokio::time::timeout(Duration::from_millis(10), waiting.as_mut())
            .await
            .is_err());

        drop(first);
        assert_eq!(locks.len(), 1);
        drop(waiting);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn abandoned_wait_leaves_key_usable() {
        let locks = KeyedLocks::new();
        let first = locks.lock("k").await;
        let timed_out = tokio::time::timeout(Duration::from_millis(10), locks.lock("k")).await;
        assert!(timed_out.is_err());
        drop(first);

        let again = tokio::time::timeout(Duration::from_millis(100), locks.lock("k")).await;
        assert!(again.is_ok());
    }
}
