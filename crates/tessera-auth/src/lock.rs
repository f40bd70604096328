//! Per-session mutual exclusion for login attempts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Async locks keyed by session token hash.
///
/// Slots are held weakly: once every guard for a session is dropped the
/// slot is pruned on a later acquire.
#[derive(Default)]
pub struct SessionLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the session identified by `token_hash`.
    pub async fn acquire(&self, token_hash: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get(token_hash).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    slots.retain(|_, slot| slot.strong_count() > 0);
                    let lock = Arc::new(AsyncMutex::new(()));
                    slots.insert(token_hash.to_owned(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Sessions with at least one live guard or waiter.
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|slot| slot.strong_count() > 0).count()
    }
}
