//! Bounded, expiring deduplication cache for fallible async computations.
//!
//! Given a key and an async factory, ensures the factory runs at most once per key among
//! concurrent callers. Every caller awaits the same in-flight computation through a [`Shared`]
//! future and receives a clone of its outcome. Successful outcomes are memoized; errors are handed
//! to every waiter and then forgotten, so the next caller starts over.
//!
//! Memoized entries are dropped lazily once they outlive the policy's write or access age, and the
//! least recently used entries are evicted once the policy's size bound is exceeded. Writes also
//! sweep out expired entries at most once per shortest expiry age, so keys that are never read
//! again do not accumulate.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use std::{fmt::Debug, future::Future, hash::Hash, pin::Pin};

use futures::FutureExt as _;
use futures::future::Shared;
use tokio::time::Instant;
use tracing::trace;

use crate::cache::eviction::lru::LruOrder;
use crate::cache::policy::CachePolicy;

/// `None` signals that the factory panicked (caught by `catch_unwind`).
type SharedFut<V, E> = Shared<Pin<Box<dyn Future<Output = Option<Result<V, E>>> + Send>>>;

/// A memoized value and the timestamps the expiry rules look at.
struct Memo<V> {
    value: V,
    written: Instant,
    /// Nanoseconds since the owning cache's epoch.
    accessed: AtomicU64,
}

/// Two-state slot: `InFlight` while a factory future is running, then promoted to `Ready` once
/// the future completes successfully.
enum Slot<V, E> {
    InFlight(SharedFut<V, E>),
    Ready(Memo<V>),
}

/// What a fast-path read found.
enum Probe<V, E> {
    Hit(V),
    Join(SharedFut<V, E>),
    Miss,
}

/// Deduplicating, expiring async cache.
///
/// If [`get_or_try_init`](Self::get_or_try_init) is called concurrently for the same key, only
/// one invocation of the factory runs. All callers receive a clone of the result, whether it is a
/// value or an error.
pub struct SingleFlightCache<K, V, E> {
    map: scc::HashMap<K, Slot<V, E>>,
    order: LruOrder<K>,
    expire_after_write: Option<Duration>,
    expire_after_access: Option<Duration>,
    epoch: Instant,
    /// Nanoseconds since `epoch` of the last expiry sweep.
    last_sweep: AtomicU64,
}

impl<K, V, E> SingleFlightCache<K, V, E>
where
    K: Eq + Hash + Debug + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty cache bounded by `policy`.
    #[must_use]
    pub fn new(policy: &CachePolicy) -> Self {
        Self {
            map: scc::HashMap::with_capacity(policy.initial_capacity.unwrap_or_default()),
            order: LruOrder::new(policy.maximum_size),
            expire_after_write: policy.expire_after_write,
            expire_after_access: policy.expire_after_access,
            epoch: Instant::now(),
            last_sweep: AtomicU64::new(0),
        }
    }

    /// Get the memoized value for `key`, or compute it by running `factory`.
    ///
    /// If another caller is already computing the value for this key, this awaits the in-flight
    /// computation instead of starting a duplicate. `Ok` outcomes are memoized before returning;
    /// `Err` outcomes are returned to every waiter and never memoized.
    ///
    /// # Panics
    ///
    /// Panics if the factory this caller started or joined panicked. The slot is cleared first, so
    /// the next caller retries with a fresh factory invocation.
    pub async fn get_or_try_init<F, Fut>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        // Fast path: value already memoized or in flight.
        match self.probe(&key).await {
            Probe::Hit(v) => return Ok(v),
            Probe::Join(shared) => return self.await_shared(&key, shared).await,
            Probe::Miss => {}
        }

        // Slow path: use entry_async for atomic check-and-insert.
        let shared = match self.map.entry_async(key.clone()).await {
            scc::hash_map::Entry::Occupied(mut occ) => {
                let found = match occ.get() {
                    Slot::Ready(memo) if self.is_live(memo, Instant::now()) => {
                        Self::mark_accessed(memo, self.nanos_since_epoch(Instant::now()));
                        Probe::Hit(memo.value.clone())
                    }
                    Slot::Ready(_) => Probe::Miss,
                    Slot::InFlight(shared) => Probe::Join(shared.clone()),
                };
                match found {
                    Probe::Hit(v) => {
                        drop(occ);
                        self.order.touch(&key);
                        return Ok(v);
                    }
                    Probe::Join(shared) => shared,
                    Probe::Miss => {
                        trace!(key = ?occ.key(), "replacing expired entry");
                        let shared = Self::make_shared(factory);
                        *occ.get_mut() = Slot::InFlight(shared.clone());
                        shared
                    }
                }
            }
            scc::hash_map::Entry::Vacant(vac) => {
                let shared = Self::make_shared(factory);
                vac.insert_entry(Slot::InFlight(shared.clone()));
                shared
            }
        };

        self.await_shared(&key, shared).await
    }

    /// Return the memoized value for `key` without computing or awaiting anything.
    ///
    /// In-flight and expired entries read as `None`.
    pub async fn get(&self, key: &K) -> Option<V> {
        match self.probe(key).await {
            Probe::Hit(v) => Some(v),
            Probe::Join(_) | Probe::Miss => None,
        }
    }

    /// Insert a value, overwriting any existing entry, including an in-flight one.
    ///
    /// Waiters of an overwritten in-flight computation still receive that computation's result,
    /// but it is not memoized.
    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Remove the entry for `key`, returning `true` if it was present.
    ///
    /// Removing an in-flight entry detaches it: its waiters still get its result, but the result
    /// is not memoized, and the next caller starts a fresh computation.
    pub fn remove(&self, key: &K) -> bool {
        self.order.remove(key);
        self.map.remove_sync(key).is_some()
    }

    /// Every live memoized entry, least recently used first.
    #[must_use]
    pub fn ready_entries(&self) -> Vec<(K, V)> {
        let now = Instant::now();
        self.order
            .keys()
            .into_iter()
            .filter_map(|key| {
                let value = self
                    .map
                    .read_sync(&key, |_, slot| match slot {
                        Slot::Ready(memo) if self.is_live(memo, now) => Some(memo.value.clone()),
                        Slot::Ready(_) | Slot::InFlight(_) => None,
                    })
                    .flatten()?;
                Some((key, value))
            })
            .collect()
    }

    /// Returns the number of slots in the cache (both memoized and in flight).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the cache contains no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Read the slot for `key`. A hit refreshes the entry's access time and recency.
    async fn probe(&self, key: &K) -> Probe<V, E> {
        let now = Instant::now();
        let found = self
            .map
            .read_async(key, |_, slot| match slot {
                Slot::Ready(memo) if self.is_live(memo, now) => {
                    Self::mark_accessed(memo, self.nanos_since_epoch(now));
                    Probe::Hit(memo.value.clone())
                }
                Slot::Ready(_) => Probe::Miss,
                Slot::InFlight(shared) => Probe::Join(shared.clone()),
            })
            .await
            .unwrap_or(Probe::Miss);
        // The recency list is only touched once the map's bucket lock is released, since
        // eviction takes the two locks in the opposite order.
        if matches!(found, Probe::Hit(_)) {
            self.order.touch(key);
        }
        found
    }

    /// Await a `Shared` future, then memoize or discard its outcome.
    ///
    /// Promotion only replaces the exact in-flight slot this future came from; if the slot was
    /// removed or overwritten in the meantime the outcome is returned but not memoized.
    async fn await_shared(&self, key: &K, shared: SharedFut<V, E>) -> Result<V, E> {
        let outcome = shared.clone().await;

        match outcome {
            Some(Ok(v)) => {
                let now = Instant::now();
                let promoted = self
                    .map
                    .update_async(key, |_, slot| {
                        let ours = matches!(slot, Slot::InFlight(s) if s.ptr_eq(&shared));
                        if ours {
                            *slot = Slot::Ready(self.new_memo(v.clone(), now));
                        }
                        ours
                    })
                    .await
                    .unwrap_or(false);
                if promoted {
                    self.record_write(key.clone());
                }
                Ok(v)
            }
            Some(Err(e)) => {
                self.remove_in_flight(key, &shared);
                Err(e)
            }
            None => {
                self.remove_in_flight(key, &shared);
                panic!("SingleFlightCache: factory panicked for key {key:?}");
            }
        }
    }

    fn remove_in_flight(&self, key: &K, shared: &SharedFut<V, E>) {
        let removed = self
            .map
            .remove_if_sync(key, |slot| matches!(slot, Slot::InFlight(s) if s.ptr_eq(shared)));
        if removed.is_some() {
            // An expired entry may have been replaced by this computation.
            self.order.remove(key);
        }
    }

    fn insert_at(&self, key: K, value: V, now: Instant) {
        drop(
            self.map
                .upsert_sync(key.clone(), Slot::Ready(self.new_memo(value, now))),
        );
        self.record_write(key);
    }

    /// Move `key` to the back of the recency order, evicting whatever falls off the front.
    fn record_write(&self, key: K) {
        self.order.upsert(key, |evicted| {
            trace!(key = ?evicted, "evicting least recently used entry");
            drop(
                self.map
                    .remove_if_sync(&evicted, |slot| matches!(slot, Slot::Ready(_))),
            );
        });
        self.sweep_if_due();
    }

    /// Drop every expired entry if the shortest expiry age has passed since the last sweep.
    ///
    /// Only one caller wins the sweep for a given interval; the others return immediately.
    fn sweep_if_due(&self) {
        let interval = match (self.expire_after_write, self.expire_after_access) {
            (Some(write), Some(access)) => write.min(access),
            (Some(ttl), None) | (None, Some(ttl)) => ttl,
            (None, None) => return,
        };
        let now = Instant::now();
        let now_nanos = self.nanos_since_epoch(now);
        let last = self.last_sweep.load(Ordering::Relaxed);
        let interval_nanos = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
        if now_nanos.saturating_sub(last) < interval_nanos
            || self
                .last_sweep
                .compare_exchange(last, now_nanos, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
        {
            return;
        }

        let mut expired = Vec::new();
        self.map.retain_sync(|key, slot| match slot {
            Slot::Ready(memo) if !self.is_live(memo, now) => {
                expired.push(key.clone());
                false
            }
            Slot::Ready(_) | Slot::InFlight(_) => true,
        });
        // The recency list is only touched once the map is released.
        for key in &expired {
            if self.map.read_sync(key, |_, _| ()).is_none() {
                self.order.remove(key);
            }
        }
        if !expired.is_empty() {
            trace!(count = expired.len(), "swept expired entries");
        }
    }

    fn new_memo(&self, value: V, now: Instant) -> Memo<V> {
        Memo {
            value,
            written: now,
            accessed: AtomicU64::new(self.nanos_since_epoch(now)),
        }
    }

    fn mark_accessed(memo: &Memo<V>, nanos: u64) {
        memo.accessed.store(nanos, Ordering::Relaxed);
    }

    fn is_live(&self, memo: &Memo<V>, now: Instant) -> bool {
        if let Some(ttl) = self.expire_after_write
            && now.saturating_duration_since(memo.written) >= ttl
        {
            return false;
        }
        if let Some(ttl) = self.expire_after_access {
            let accessed = Duration::from_nanos(memo.accessed.load(Ordering::Relaxed));
            let idle = now
                .saturating_duration_since(self.epoch)
                .saturating_sub(accessed);
            if idle >= ttl {
                return false;
            }
        }
        true
    }

    fn nanos_since_epoch(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.epoch).as_nanos()).unwrap_or(u64::MAX)
    }

    /// Wrap a factory future in `catch_unwind`, producing a `Shared` whose `None` output marks a
    /// panic.
    fn make_shared<F, Fut>(factory: F) -> SharedFut<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let fut = AssertUnwindSafe(factory()).catch_unwind();
        let boxed: Pin<Box<dyn Future<Output = Option<Result<V, E>>> + Send>> =
            Box::pin(async move { fut.await.ok() });
        boxed.shared()
    }
}
