//! Command-level access to a remote document library.
/// The contract a remote document library client implements.
pub mod backend;
/// Command verbs and their dispatch onto [`remote::RemoteFs`].
pub mod command;
/// Cached, collision-aware operations over a [`backend::Backend`].
pub mod remote;
/// Write collision resolution.
pub mod unique;

pub use backend::{Backend, BackendError, RemoteFile, RemoteFolder};
pub use remote::{FsError, PutRequest, RemoteFs};
pub use unique::{UniqueNameError, UniqueNamer, WriteTarget};

use std::time::SystemTime;

use crate::cache::attr::AttrCache;

/// The kind of an entry in the remote library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A document.
    File,
    /// A folder.
    Directory,
}

/// Attributes of a remote entry, as memoized by the attribute cache.
///
/// The remote library reports one timestamp per entry; it stands in for creation, access and
/// modification time alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrSnapshot {
    /// Whether this is a file or a folder.
    pub kind: Kind,
    /// Byte length of a file. Always zero for folders.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl AttrSnapshot {
    /// Attributes of a file of `size` bytes.
    #[must_use]
    pub fn file(size: u64, modified: SystemTime) -> Self {
        Self {
            kind: Kind::File,
            size,
            modified,
        }
    }

    /// Attributes of a folder.
    #[must_use]
    pub fn directory(modified: SystemTime) -> Self {
        Self {
            kind: Kind::Directory,
            size: 0,
            modified,
        }
    }

    /// Byte length, or `None` for a folder, whose size the library does not report.
    #[must_use]
    pub fn byte_len(&self) -> Option<u64> {
        match self.kind {
            Kind::File => Some(self.size),
            Kind::Directory => None,
        }
    }

    /// Whether this is a folder.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == Kind::Directory
    }
}

impl From<&RemoteFile> for AttrSnapshot {
    fn from(file: &RemoteFile) -> Self {
        Self::file(file.size, file.modified)
    }
}

impl From<&RemoteFolder> for AttrSnapshot {
    fn from(folder: &RemoteFolder) -> Self {
        Self::directory(folder.modified)
    }
}

/// One child of a listed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The child's name within the listed folder.
    pub name: String,
    /// The child's attributes.
    pub attr: AttrSnapshot,
}

/// The attribute cache as the filesystem layer uses it.
pub type SnapshotCache = AttrCache<AttrSnapshot, BackendError>;
