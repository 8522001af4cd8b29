//! Per-key serialization
//!
//! The stores offer no cross-call locking, so every load-mutate-save cycle on
//! a session cart or an order goes through one of these keyed mutexes. Guards
//! are owned, so they can be held across awaits.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }
}
