/// Least-recently-used ordering for size-bounded caches.
pub mod lru;
