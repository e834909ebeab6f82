use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    /// Holders plus waiters. The slot leaves the map when this reaches zero.
    users: usize,
}

type Slots = HashMap<String, Slot>;

/// In-process mutual exclusion keyed by string.
///
/// Holders of different keys never wait on each other. Slots are created on
/// demand and dropped again once nobody holds or waits on them, so the map
/// only ever contains keys that are in use. A caller that stops waiting
/// (its future is dropped) gives up its place the same way a holder does.
///
/// This only serializes callers inside one process. Running several instances
/// against the same store needs an external lease in place of this map.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<Slots>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let (mutex, lease) = self.enter(key);
        let guard = mutex.lock_owned().await;
        KeyGuard {
            _guard: guard,
            lease,
        }
    }

    /// Keys currently held or awaited
    pub fn active_keys(&self) -> usize {
        self.slots().len()
    }

    fn enter(&self, key: &str) -> (Arc<tokio::sync::Mutex<()>>, Lease<'_>) {
        let mut slots = self.slots();
        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            mutex: Arc::default(),
            users: 0,
        });
        slot.users += 1;
        let lease = Lease {
            locks: self,
            key: key.to_string(),
        };
        (slot.mutex.clone(), lease)
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One user's claim on a slot, from the start of the wait until release
struct Lease<'a> {
    locks: &'a KeyedLocks,
    key: String,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots();
        let idle = match slots.get_mut(&self.key) {
            Some(slot) => {
                slot.users -= 1;
                slot.users == 0
            }
            None => false,
        };
        if idle {
            slots.remove(&self.key);
        }
    }
}

/// Exclusive access to one key, released on drop
pub struct KeyGuard<'a> {
    // Dropped in declaration order: the mutex is released before the lease
    // can retire the slot.
    _guard: OwnedMutexGuard<()>,
    lease: Lease<'a>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.lease.key
    }
}
