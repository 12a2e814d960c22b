//! Implements the LRU eviction policy.

use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use hashlink::LinkedHashMap;

/// Recency order for the keys of a size-bounded cache.
///
/// The front of the list is the least recently used key. All bookkeeping happens under one
/// mutex, and eviction callbacks run while it is held, so a key evicted here cannot be
/// re-inserted by a concurrent writer until the callback has removed it from the owning map.
#[derive(Debug)]
pub struct LruOrder<K> {
    ordered_keys: Mutex<LinkedHashMap<K, ()>>,
    capacity: Option<usize>,
}

impl<K: Eq + Hash + Clone> LruOrder<K> {
    /// Create a tracker that keeps at most `capacity` keys. `None` never evicts.
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            ordered_keys: Mutex::new(LinkedHashMap::new()),
            capacity,
        }
    }

    /// The configured capacity.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Record that `key` was inserted or overwritten, moving it to the back.
    ///
    /// If the tracker is now over capacity, the least recently used keys are popped and handed to
    /// `on_evict` in eviction order. `key` itself is evicted only when the capacity is zero.
    pub fn upsert(&self, key: K, mut on_evict: impl FnMut(K)) {
        let mut keys = self
            .ordered_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        keys.remove(&key);
        keys.insert(key, ());
        let Some(capacity) = self.capacity else {
            return;
        };
        while keys.len() > capacity {
            let Some((evicted, ())) = keys.pop_front() else {
                break;
            };
            on_evict(evicted);
        }
    }

    /// Record that `key` was read. Unknown keys are ignored.
    pub fn touch(&self, key: &K) {
        let mut keys = self
            .ordered_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if keys.remove(key).is_some() {
            keys.insert(key.clone(), ());
        }
    }

    /// Forget `key`. Returns `true` if it was tracked.
    pub fn remove(&self, key: &K) -> bool {
        self.ordered_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Keys from least to most recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.ordered_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
