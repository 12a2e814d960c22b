/// Reconfigurable attribute cache keyed by account identity and path.
pub mod attr;
/// Cache eviction policies.
pub mod eviction;
/// Textual cache policy specs.
pub mod policy;
/// Deduplicating, expiring async cache.
pub mod single_flight;
