//! Pinned-panel preference.
//!
//! Hydrated from storage once, then served from cache until explicitly
//! invalidated. Writes go through to storage and notify listeners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::storage::KeyValueStore;

const KEY_PINNED: &str = "panelPinned";

type Listener = Box<dyn Fn(bool) + Send + Sync>;
type Listeners = Arc<Mutex<HashMap<u64, Listener>>>;

#[derive(Clone)]
pub struct PinStore {
    storage: Arc<dyn KeyValueStore>,
    cache: Arc<Mutex<Option<bool>>>,
    listeners: Listeners,
    next_listener: Arc<AtomicU64>,
}

impl PinStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            cache: Arc::new(Mutex::new(None)),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current flag. Reads storage only on first use after construction or
    /// invalidation. An unreadable store counts as unpinned.
    pub async fn pinned(&self) -> bool {
        if let Some(pinned) = self.cached() {
            return pinned;
        }

        let pinned = match self.storage.get(KEY_PINNED).await {
            Ok(value) => value.and_then(|v| v.as_bool()).unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "failed to read pinned flag");
                false
            }
        };
        self.set_cache(Some(pinned));
        pinned
    }

    /// Cached flag without touching storage.
    pub fn cached(&self) -> Option<bool> {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn set_pinned(&self, pinned: bool) -> Result<()> {
        self.set_cache(Some(pinned));
        self.storage.set(KEY_PINNED, Value::Bool(pinned)).await?;

        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.values() {
            listener(pinned);
        }
        Ok(())
    }

    /// Drop the cached flag so the next read goes to storage.
    pub fn invalidate(&self) {
        self.set_cache(None);
    }

    /// Register a change listener. It stays registered until the returned
    /// subscription is dropped.
    pub fn on_pinned_change<F>(&self, listener: F) -> PinSubscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Box::new(listener));
        PinSubscription {
            id,
            listeners: self.listeners.clone(),
        }
    }

    fn set_cache(&self, value: Option<bool>) {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

/// Unsubscribes on drop.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct PinSubscription {
    id: u64,
    listeners: Listeners,
}

impl Drop for PinSubscription {
    fn drop(&mut self) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_hydrates_once() {
        let memory = MemoryStore::new();
        memory.set(KEY_PINNED, Value::Bool(true)).await.unwrap();
        let pins = PinStore::new(Arc::new(memory.clone()));

        assert!(pins.pinned().await);
        assert!(pins.pinned().await);
        assert_eq!(memory.reads(), 1);

        pins.invalidate();
        assert!(pins.pinned().await);
        assert_eq!(memory.reads(), 2);
    }

    #[tokio::test]
    async fn test_set_writes_through_and_notifies() {
        let memory = MemoryStore::new();
        let pins = PinStore::new(Arc::new(memory.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subscription = {
            let seen = seen.clone();
            pins.on_pinned_change(move |v| seen.lock().unwrap().push(v))
        };

        pins.set_pinned(true).await.unwrap();
        assert_eq!(memory.get(KEY_PINNED).await.unwrap(), Some(Value::Bool(true)));
        assert!(pins.pinned().await);
        assert_eq!(memory.reads(), 1, "only the assertion above read storage");

        drop(subscription);
        pins.set_pinned(false).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }
}
