//! The contract a remote document library client fulfils.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use thiserror::Error;

use crate::path::RemotePath;

/// A failure reported by a [`Backend`].
///
/// Cloneable so that one failed lookup can be handed to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Nothing exists at the path.
    #[error("remote entry not found: '{0}'")]
    NotFound(RemotePath),

    /// A create collided with an existing entry.
    #[error("remote entry already exists: '{0}'")]
    AlreadyExists(RemotePath),

    /// The library service rejected or failed the request.
    #[error("remote service error: {0}")]
    Service(String),

    /// Local or transport I/O failed.
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// A document stored in the remote library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// The document's name within its folder.
    pub name: String,
    /// Byte length of the document's content.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// A folder in the remote library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    /// The folder's name within its parent. Empty for the library root.
    pub name: String,
    /// Last modification time.
    pub modified: SystemTime,
}

/// A client for a remote document library.
///
/// Every path is relative to the library root. Implementations are cheap to clone; clones share
/// the same session.
pub trait Backend: Clone + Send + Sync + 'static {
    /// List the folders directly inside `dir`.
    fn list_folders(
        &self,
        dir: &RemotePath,
    ) -> impl Future<Output = Result<Vec<RemoteFolder>, BackendError>> + Send;

    /// List the files directly inside `dir`.
    fn list_files(
        &self,
        dir: &RemotePath,
    ) -> impl Future<Output = Result<Vec<RemoteFile>, BackendError>> + Send;

    /// Look up a file. `Ok(None)` means there is no file at `path`.
    fn find_file(
        &self,
        path: &RemotePath,
    ) -> impl Future<Output = Result<Option<RemoteFile>, BackendError>> + Send;

    /// Look up a folder. `Ok(None)` means there is no folder at `path`. The root path resolves to
    /// the library's root folder.
    fn find_folder(
        &self,
        path: &RemotePath,
    ) -> impl Future<Output = Result<Option<RemoteFolder>, BackendError>> + Send;

    /// Read a file's entire content.
    fn read_file(
        &self,
        path: &RemotePath,
    ) -> impl Future<Output = Result<Bytes, BackendError>> + Send;

    /// Create a new file holding `content`.
    fn create_file(
        &self,
        path: &RemotePath,
        content: Bytes,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Replace the content of an existing file.
    fn update_file(
        &self,
        path: &RemotePath,
        content: Bytes,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete a file.
    fn delete_file(&self, path: &RemotePath)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Create a folder.
    fn create_folder(
        &self,
        path: &RemotePath,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete a folder.
    fn delete_folder(
        &self,
        path: &RemotePath,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Move a file, overwriting whatever is at `to`. `Ok(false)` means the library refused the
    /// move.
    fn move_file(
        &self,
        from: &RemotePath,
        to: &RemotePath,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;
}
