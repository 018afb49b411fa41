//! Per-key async mutual exclusion.
//!
//! [`KeyedMutex`] hands out at most one [`KeyedMutexGuard`] per key at a
//! time. Different keys never block each other. A key's slot exists only
//! while someone holds or waits for it, so the key space can be unbounded.
//!
//! Release is tied to `Drop`: a guard dropped by a cancelled task unlocks
//! the key, and a `lock()` future dropped while still waiting gives up its
//! reservation.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock slot for a single key.
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters. The slot is removed when this drops to zero.
    users: usize,
}

/// A table of async mutexes created on demand per key.
pub struct KeyedMutex<K> {
    slots: Mutex<HashMap<K, Slot>>,
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until `key` is free and lock it.
    ///
    /// Waiters on the same key are served in FIFO order.
    pub async fn lock(&self, key: K) -> KeyedMutexGuard<'_, K> {
        let mutex = {
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };
        // Created before awaiting so a cancelled wait still releases the slot.
        let reservation = Reservation { owner: self, key };
        let guard = mutex.lock_owned().await;
        KeyedMutexGuard {
            _guard: guard,
            _reservation: reservation,
        }
    }

    /// Run `action` while holding the lock for `key`.
    pub async fn with_lock<F, T>(&self, key: K, action: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.lock(key).await;
        action.await
    }

    /// Number of keys currently held or waited for.
    pub fn active_keys(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot>> {
        // The table is never left inconsistent across a panic, so a poisoned
        // lock is safe to reuse.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &K) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(key);
            }
        }
    }
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one user of a slot; decrements on drop.
struct Reservation<'a, K>
where
    K: Eq + Hash + Clone,
{
    owner: &'a KeyedMutex<K>,
    key: K,
}

impl<K> Drop for Reservation<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.owner.release(&self.key);
    }
}

/// Exclusive access to one key. Unlocks on drop.
pub struct KeyedMutexGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    // Field order matters: unlock first, then give up the slot.
    _guard: OwnedMutexGuard<()>,
    _reservation: Reservation<'a, K>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn slot_is_reclaimed_after_unlock() {
        let mutex = KeyedMutex::new();
        {
            let _g = mutex.lock(1_i64).await;
            assert_eq!(mutex.active_keys(), 1);
        }
        assert_eq!(mutex.active_keys(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let mutex = KeyedMutex::new();
        let _a = mutex.lock(1_i64).await;
        let b = tokio::time::timeout(Duration::from_millis(100), mutex.lock(2)).await;
        assert!(b.is_ok());
        assert_eq!(mutex.active_keys(), 2);
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let mutex = Arc::new(KeyedMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mutex = Arc::clone(&mutex);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                mutex
                    .with_lock(42_i64, async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(mutex.active_keys(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_reservation() {
        let mutex = KeyedMutex::new();
        let held = mutex.lock(7_i64).await;

        let waited = tokio::time::timeout(Duration::from_millis(20), mutex.lock(7)).await;
        assert!(waited.is_err());
        assert_eq!(mutex.active_keys(), 1);

        drop(held);
        assert_eq!(mutex.active_keys(), 0);
    }

    #[tokio::test]
    async fn aborted_holder_unlocks() {
        let mutex = Arc::new(KeyedMutex::new());
        let task = {
            let mutex = Arc::clone(&mutex);
            tokio::spawn(async move {
                mutex
                    .with_lock(3_i64, tokio::time::sleep(Duration::from_secs(60)))
                    .await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        let relocked = tokio::time::timeout(Duration::from_millis(100), mutex.lock(3)).await;
        assert!(relocked.is_ok());
    }
}
