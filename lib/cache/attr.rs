//! Process-wide attribute cache keyed by account identity and remote path.
//!
//! The cache is constructed once and shared by `Arc`. Its policy can be swapped at runtime with
//! [`AttrCache::configure`]; live entries survive the swap.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::cache::policy::{CachePolicy, PolicyError, PolicySpec};
use crate::cache::single_flight::SingleFlightCache;
use crate::path::RemotePath;

/// An entry is keyed by the account it was fetched for and the path it describes, so two
/// identities never share a value.
#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    identity: String,
    path: RemotePath,
}

impl CacheKey {
    fn new(identity: &str, path: &RemotePath) -> Self {
        Self {
            identity: identity.to_owned(),
            path: path.clone(),
        }
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.identity, self.path)
    }
}

/// A memoized lookup. `None` records an explicit "not found".
type Store<V, E> = SingleFlightCache<CacheKey, Option<V>, E>;

struct Active<V, E> {
    spec: PolicySpec,
    store: Option<Arc<Store<V, E>>>,
}

/// Reconfigurable, expiring, single-flight cache of optional attribute values.
///
/// Lookups go through [`get_or_compute`](Self::get_or_compute): concurrent callers for the same
/// `(identity, path)` share one compute, successful outcomes (including `None`) are memoized and
/// failures are handed to every waiter without being memoized.
pub struct AttrCache<V, E> {
    active: RwLock<Active<V, E>>,
}

impl<V, E> AttrCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache running under `spec`.
    #[must_use]
    pub fn new(spec: PolicySpec) -> Self {
        Self {
            active: RwLock::new(Active {
                spec,
                store: Self::build_store(&spec),
            }),
        }
    }

    /// Create a cache from a textual policy spec. See [`PolicySpec::parse`].
    pub fn from_spec(raw: Option<&str>) -> Result<Self, PolicyError> {
        PolicySpec::parse(raw).map(Self::new)
    }

    /// Apply a new textual policy spec.
    ///
    /// An unchanged policy is a no-op. `disabled` drops every entry. Any other policy builds a
    /// fresh store and copies the live entries of the current one into it before swapping, all
    /// under the write lock. On a parse error the current policy stays in effect.
    pub fn configure(&self, raw: Option<&str>) -> Result<(), PolicyError> {
        let spec = PolicySpec::parse(raw)?;
        let mut active = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if active.spec == spec {
            debug!(?spec, "cache policy unchanged");
            return Ok(());
        }

        let store = Self::build_store(&spec);
        if let (Some(old), Some(new)) = (active.store.as_deref(), store.as_deref()) {
            let entries = old.ready_entries();
            debug!(count = entries.len(), "migrating cache entries");
            for (key, value) in entries {
                new.insert(key, value);
            }
        }

        info!(from = ?active.spec, to = ?spec, "cache policy changed");
        *active = Active { spec, store };
        Ok(())
    }

    /// The policy in effect.
    #[must_use]
    pub fn spec(&self) -> PolicySpec {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .spec
    }

    /// The bounds in effect, or `None` while disabled.
    #[must_use]
    pub fn policy(&self) -> Option<CachePolicy> {
        self.spec().policy().copied()
    }

    /// Return the memoized value for `(identity, path)`, or run `compute` to produce it.
    ///
    /// With caching disabled, `compute` runs every time and nothing is memoized.
    pub async fn get_or_compute<F, Fut>(
        &self,
        identity: &str,
        path: &RemotePath,
        compute: F,
    ) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    {
        // The lock is released before awaiting; a reconfigure that lands meanwhile only affects
        // the next lookup.
        let Some(store) = self.store() else {
            return compute().await;
        };
        store
            .get_or_try_init(CacheKey::new(identity, path), compute)
            .await
    }

    /// Return the memoized value for `(identity, path)` without computing anything.
    ///
    /// The outer `None` means nothing is memoized; `Some(None)` is a memoized "not found".
    pub async fn peek(&self, identity: &str, path: &RemotePath) -> Option<Option<V>> {
        let store = self.store()?;
        store.get(&CacheKey::new(identity, path)).await
    }

    /// Memoize `value` for `(identity, path)`, overwriting any existing entry.
    pub fn put(&self, identity: &str, path: &RemotePath, value: V) {
        self.with_store(|store| store.insert(CacheKey::new(identity, path), Some(value)));
    }

    /// Drop the entry for `(identity, path)`, if any.
    pub fn invalidate(&self, identity: &str, path: &RemotePath) {
        let key = CacheKey::new(identity, path);
        if self.with_store(|store| store.remove(&key)) == Some(true) {
            debug!(?key, "invalidated cache entry");
        }
    }

    /// Number of slots held, in flight ones included. Always zero while disabled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_store(Store::<V, E>::len).unwrap_or_default()
    }

    /// Whether no slots are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the active store while holding the read lock, so it cannot interleave
    /// with a [`configure`](Self::configure) migration. `None` while disabled.
    fn with_store<R>(&self, f: impl FnOnce(&Store<V, E>) -> R) -> Option<R> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        active.store.as_deref().map(f)
    }

    /// A handle to the active store for callers that must await. Writes through it may land in a
    /// store that a concurrent reconfigure has already replaced.
    fn store(&self) -> Option<Arc<Store<V, E>>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .store
            .clone()
    }

    fn build_store(spec: &PolicySpec) -> Option<Arc<Store<V, E>>> {
        spec.policy()
            .map(|policy| Arc::new(Store::<V, E>::new(policy)))
    }
}

impl<V, E> Default for AttrCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(PolicySpec::default())
    }
}

impl<V, E> fmt::Debug for AttrCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("AttrCache")
            .field("spec", &active.spec)
            .field("slots", &active.store.as_ref().map(|store| store.len()))
            .finish()
    }
}
