//! Choosing where a write lands when its destination is already taken.
//!
//! With unique naming requested, `report.txt` becomes the first free name among `report.1.txt`,
//! `report.2.txt`, and so on. Without it, an existing destination is overwritten in place.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, trace};

use crate::path::RemotePath;

/// The default bound on candidate names probed before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// Failure to pick a destination.
#[derive(Debug, Error)]
pub enum UniqueNameError<E> {
    /// Every candidate up to the attempt bound was taken.
    #[error("no free name for '{path}' after {attempts} attempts")]
    Exhausted {
        /// The requested destination.
        path: RemotePath,
        /// How many numbered candidates were probed.
        attempts: u32,
    },

    /// The existence check itself failed.
    #[error("existence check failed: {0}")]
    Probe(#[source] E),
}

/// Where a write should go, and whether it replaces an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    /// The path to write.
    pub path: RemotePath,
    /// `true` if a file already exists at `path`, so the write is an update.
    pub exists: bool,
}

/// Resolves write collisions by probing numbered candidate names.
#[derive(Debug, Clone, Copy)]
pub struct UniqueNamer {
    max_attempts: u32,
}

impl Default for UniqueNamer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl UniqueNamer {
    /// Create a namer that probes at most `max_attempts` numbered candidates.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// The bound on numbered candidates.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pick the path a write to `dest` should use.
    ///
    /// `exists` must reflect the live state of the library. If `dest` is free it is returned
    /// unchanged. If it is taken and `unique` is off, `dest` is returned as an overwrite.
    /// Otherwise numbered siblings of `dest` are probed in order and the first free one wins.
    pub async fn resolve<E, F, Fut>(
        &self,
        dest: &RemotePath,
        unique: bool,
        mut exists: F,
    ) -> Result<WriteTarget, UniqueNameError<E>>
    where
        F: FnMut(RemotePath) -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let taken = exists(dest.clone()).await.map_err(UniqueNameError::Probe)?;
        if !taken || !unique {
            return Ok(WriteTarget {
                path: dest.clone(),
                exists: taken,
            });
        }

        let parent = dest.parent();
        let (base, ext) = split_name(dest.name());
        for counter in 1..=self.max_attempts {
            let candidate = parent.child(&format!("{base}.{counter}{ext}"));
            trace!(%candidate, "probing candidate name");
            if !exists(candidate.clone())
                .await
                .map_err(UniqueNameError::Probe)?
            {
                debug!(%dest, %candidate, "resolved name collision");
                return Ok(WriteTarget {
                    path: candidate,
                    exists: false,
                });
            }
        }

        Err(UniqueNameError::Exhausted {
            path: dest.clone(),
            attempts: self.max_attempts,
        })
    }
}

/// Split a file name into its base and its extension.
///
/// The extension is the suffix starting at the last `.`, dot included, or empty when the name
/// has no dot.
#[must_use]
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    }
}
