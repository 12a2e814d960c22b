//! The command-level view of a remote document library.
//!
//! [`RemoteFs`] turns directory, transfer and attribute requests into [`Backend`] calls, keeping
//! the shared attribute cache coherent: listings prime it, attribute lookups go through it, and
//! every mutation invalidates what it touched.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::fs::backend::{Backend, BackendError};
use crate::fs::unique::{UniqueNameError, UniqueNamer};
use crate::fs::{AttrSnapshot, DirEntry, SnapshotCache};
use crate::path::RemotePath;

/// Errors surfaced by [`RemoteFs`] operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path names nothing the account can see.
    #[error("'{0}' does not exist or is not accessible")]
    NotFound(RemotePath),

    /// The backend declined the move.
    #[error("remote library refused to move '{from}' to '{to}'")]
    RenameRefused {
        /// Source of the move.
        from: RemotePath,
        /// Requested destination.
        to: RemotePath,
    },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// No destination name could be chosen for a write.
    #[error(transparent)]
    Name(#[from] UniqueNameError<BackendError>),
}

impl FsError {
    /// Map a backend "not found" onto [`FsError::NotFound`] for `path`.
    fn from_backend(path: &RemotePath, e: BackendError) -> Self {
        match e {
            BackendError::NotFound(_) => Self::NotFound(path.clone()),
            other => Self::Backend(other),
        }
    }
}

/// A write request.
#[derive(Debug, Clone)]
pub struct PutRequest {
    /// The local name of the content, used when `destination` names nothing useful.
    pub source: String,
    /// The requested remote path.
    pub destination: String,
    /// What to write.
    pub content: Bytes,
    /// Pick a fresh numbered name instead of overwriting an existing file.
    pub unique: bool,
}

impl PutRequest {
    /// The remote name the caller most likely meant.
    ///
    /// The destination wins unless it is blank or just repeats `host_alias` (a transfer addressed
    /// to the host as a whole), in which case the source name is used.
    #[must_use]
    pub fn best_filename(&self, host_alias: Option<&str>) -> &str {
        let useless = self.destination.is_empty() || host_alias == Some(self.destination.as_str());
        if useless && !self.source.is_empty() {
            &self.source
        } else {
            &self.destination
        }
    }
}

/// Cached operations over one account's view of a remote library.
pub struct RemoteFs<B: Backend> {
    backend: B,
    identity: String,
    host_alias: Option<String>,
    cache: Arc<SnapshotCache>,
    namer: UniqueNamer,
}

impl<B: Backend> RemoteFs<B> {
    /// Create a filesystem for the account `identity`, sharing `cache` with other accounts.
    #[must_use]
    pub fn new(backend: B, identity: impl Into<String>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            backend,
            identity: identity.into(),
            host_alias: None,
            cache,
            namer: UniqueNamer::default(),
        }
    }

    /// Treat writes addressed to `alias` as addressed to the source's own name.
    #[must_use]
    pub fn with_host_alias(mut self, alias: impl Into<String>) -> Self {
        self.host_alias = Some(alias.into());
        self
    }

    /// Use `namer` for write collision resolution.
    #[must_use]
    pub fn with_namer(mut self, namer: UniqueNamer) -> Self {
        self.namer = namer;
        self
    }

    /// The identity cache entries are keyed under.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The shared attribute cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// The backend this filesystem delegates to.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// List a folder, folders first, priming the cache with every child's attributes.
    #[instrument(name = "RemoteFs::dir", skip(self))]
    pub async fn dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>, FsError> {
        let folders = self
            .backend
            .list_folders(path)
            .await
            .map_err(|e| FsError::from_backend(path, e))?;
        let files = self
            .backend
            .list_files(path)
            .await
            .map_err(|e| FsError::from_backend(path, e))?;

        let entries: Vec<DirEntry> = folders
            .iter()
            .map(|folder| DirEntry {
                name: folder.name.clone(),
                attr: AttrSnapshot::from(folder),
            })
            .chain(files.iter().map(|file| DirEntry {
                name: file.name.clone(),
                attr: AttrSnapshot::from(file),
            }))
            .collect();

        for entry in &entries {
            self.cache
                .put(&self.identity, &path.child(&entry.name), entry.attr);
        }
        debug!(count = entries.len(), "listed folder");
        Ok(entries)
    }

    /// Read a file's content. With `delete` set, the file is removed once read.
    #[instrument(name = "RemoteFs::get", skip(self))]
    pub async fn get(&self, path: &RemotePath, delete: bool) -> Result<Bytes, FsError> {
        let content = self
            .backend
            .read_file(path)
            .await
            .map_err(|e| FsError::from_backend(path, e))?;
        if delete {
            self.delete(path).await?;
        }
        Ok(content)
    }

    /// Write a file, returning the path that was written.
    #[instrument(name = "RemoteFs::put", skip(self, request), fields(destination = %request.destination, unique = request.unique))]
    pub async fn put(&self, request: PutRequest) -> Result<RemotePath, FsError> {
        let dest = RemotePath::new(request.best_filename(self.host_alias.as_deref()));
        let target = self
            .namer
            .resolve(&dest, request.unique, move |candidate| async move {
                self.exists(&candidate).await
            })
            .await?;

        if target.exists {
            debug!(path = %target.path, "updating existing file");
            self.backend
                .update_file(&target.path, request.content)
                .await?;
        } else {
            debug!(path = %target.path, "creating file");
            self.backend
                .create_file(&target.path, request.content)
                .await?;
        }
        self.cache.invalidate(&self.identity, &target.path);
        Ok(target.path)
    }

    /// Delete a file.
    #[instrument(name = "RemoteFs::delete", skip(self))]
    pub async fn delete(&self, path: &RemotePath) -> Result<(), FsError> {
        self.backend
            .delete_file(path)
            .await
            .map_err(|e| FsError::from_backend(path, e))?;
        self.cache.invalidate(&self.identity, path);
        Ok(())
    }

    /// Create a folder.
    #[instrument(name = "RemoteFs::mkdir", skip(self))]
    pub async fn mkdir(&self, path: &RemotePath) -> Result<(), FsError> {
        self.backend.create_folder(path).await?;
        // A memoized "not found" for this path is now wrong.
        self.cache.invalidate(&self.identity, path);
        Ok(())
    }

    /// Delete a folder.
    #[instrument(name = "RemoteFs::rmdir", skip(self))]
    pub async fn rmdir(&self, path: &RemotePath) -> Result<(), FsError> {
        self.backend
            .delete_folder(path)
            .await
            .map_err(|e| FsError::from_backend(path, e))?;
        self.cache.invalidate(&self.identity, path);
        Ok(())
    }

    /// Move a file, overwriting whatever is at `to`.
    #[instrument(name = "RemoteFs::rename", skip(self))]
    pub async fn rename(&self, from: &RemotePath, to: &RemotePath) -> Result<(), FsError> {
        if !self.exists(from).await? {
            return Err(FsError::NotFound(from.clone()));
        }
        let moved = self.backend.move_file(from, to).await?;
        self.cache.invalidate(&self.identity, from);
        self.cache.invalidate(&self.identity, to);
        if !moved {
            warn!("remote library refused the move");
            return Err(FsError::RenameRefused {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(())
    }

    /// Look up the attributes of a file or folder, through the cache.
    #[instrument(name = "RemoteFs::attr", skip(self))]
    pub async fn attr(&self, path: &RemotePath) -> Result<AttrSnapshot, FsError> {
        let backend = self.backend.clone();
        let target = path.clone();
        let snapshot = self
            .cache
            .get_or_compute(&self.identity, path, move || async move {
                fetch_snapshot(&backend, &target).await
            })
            .await?;
        snapshot.ok_or_else(|| FsError::NotFound(path.clone()))
    }

    /// Whether a file exists at `path`, asking the backend rather than the cache.
    pub async fn exists(&self, path: &RemotePath) -> Result<bool, BackendError> {
        Ok(self.backend.find_file(path).await?.is_some())
    }
}

/// Fetch fresh attributes for `path`, trying it as a file first and then as a folder.
async fn fetch_snapshot<B: Backend>(
    backend: &B,
    path: &RemotePath,
) -> Result<Option<AttrSnapshot>, BackendError> {
    debug!(%path, "fetching attributes");
    if let Some(file) = backend.find_file(path).await? {
        return Ok(Some(AttrSnapshot::from(&file)));
    }
    Ok(backend
        .find_folder(path)
        .await?
        .map(|folder| AttrSnapshot::from(&folder)))
}
