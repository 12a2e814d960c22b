//! Cached access to a remote document library.
//!
//! [`path::RemotePath`] normalizes inbound paths, [`cache::attr::AttrCache`] memoizes attribute
//! lookups per account, and [`fs::RemoteFs`] ties both to a [`fs::Backend`].

/// Caching primitives.
pub mod cache;
/// Remote filesystem operations and their backend contract.
pub mod fs;
/// Normalized remote paths.
pub mod path;
