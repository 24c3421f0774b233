//! Keyed async lock coalescing concurrent identical primary calls.
//!
//! The first caller for a key takes the lock and talks to the provider.
//! Callers arriving meanwhile wait on the same lock and, once it is
//! released, find the leader's answer in the response cache.
//!
//! The map holds `Weak` references: a key's lock lives exactly as long as
//! someone holds or waits on it, and dead entries are swept on insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::CacheKey;

#[derive(Default)]
pub(crate) struct SingleFlight {
    inflight: Mutex<HashMap<CacheKey, Weak<AsyncMutex<()>>>>,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`.
    pub(crate) async fn acquire(&self, key: &CacheKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            match map.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    map.retain(|_, weak| weak.strong_count() > 0);
                    let lock = Arc::new(AsyncMutex::new(()));
                    map.insert(key.clone(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Keys currently held or awaited.
    pub(crate) fn in_flight(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
