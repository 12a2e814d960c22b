//! Command verbs and their dispatch onto a [`RemoteFs`].

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use thiserror::Error;

use crate::fs::backend::Backend;
use crate::fs::remote::{FsError, PutRequest, RemoteFs};
use crate::fs::{AttrSnapshot, DirEntry};
use crate::path::RemotePath;

/// Errors produced while interpreting a command verb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The verb is not one of [`CommandName::ALL`].
    #[error("unsupported command '{0}'")]
    UnknownCommand(String),
}

/// The verbs a [`RemoteFs`] handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// List a folder.
    Dir,
    /// Read a file.
    Get,
    /// Write a file.
    Put,
    /// Delete a file.
    Delete,
    /// Create a folder.
    Mkdir,
    /// Delete a folder.
    Rmdir,
    /// Move a file.
    Rename,
    /// Look up attributes.
    Attr,
}

impl CommandName {
    /// Every supported verb.
    pub const ALL: [Self; 8] = [
        Self::Dir,
        Self::Get,
        Self::Put,
        Self::Delete,
        Self::Mkdir,
        Self::Rmdir,
        Self::Rename,
        Self::Attr,
    ];

    /// The canonical spelling of this verb.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Dir => "DIR",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Mkdir => "MKDIR",
            Self::Rmdir => "RMDIR",
            Self::Rename => "RENAME",
            Self::Attr => "ATTR",
        }
    }

    /// Whether `verb` names a supported command, ignoring case.
    #[must_use]
    pub fn supported(verb: &str) -> bool {
        verb.parse::<Self>().is_ok()
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

impl FromStr for CommandName {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let verb = s.trim();
        Self::ALL
            .into_iter()
            .find(|name| name.verb().eq_ignore_ascii_case(verb))
            .ok_or_else(|| CommandError::UnknownCommand(s.to_owned()))
    }
}

/// A command with its arguments. Path arguments are raw strings; `"."` means the root.
#[derive(Debug, Clone)]
pub enum Command {
    /// List the folder at `path`.
    Dir {
        /// Folder to list.
        path: String,
    },
    /// Read the file at `path`.
    Get {
        /// File to read.
        path: String,
        /// Delete the file once it has been read.
        delete: bool,
    },
    /// Write a file.
    Put(PutRequest),
    /// Delete the file at `path`.
    Delete {
        /// File to delete.
        path: String,
    },
    /// Create the folder at `path`.
    Mkdir {
        /// Folder to create.
        path: String,
    },
    /// Delete the folder at `path`.
    Rmdir {
        /// Folder to delete.
        path: String,
    },
    /// Move a file, overwriting the destination.
    Rename {
        /// File to move.
        from: String,
        /// Where it goes.
        to: String,
    },
    /// Look up the attributes at `path`.
    Attr {
        /// Entry to look up.
        path: String,
    },
}

/// What a successfully dispatched command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// The command had no result beyond succeeding.
    Done,
    /// A folder listing.
    Listing(Vec<DirEntry>),
    /// A file's content.
    Content(Bytes),
    /// An entry's attributes.
    Attributes(AttrSnapshot),
    /// The path a write landed on.
    Written(RemotePath),
}

impl Command {
    /// The verb this command answers to.
    #[must_use]
    pub fn name(&self) -> CommandName {
        match self {
            Self::Dir { .. } => CommandName::Dir,
            Self::Get { .. } => CommandName::Get,
            Self::Put(_) => CommandName::Put,
            Self::Delete { .. } => CommandName::Delete,
            Self::Mkdir { .. } => CommandName::Mkdir,
            Self::Rmdir { .. } => CommandName::Rmdir,
            Self::Rename { .. } => CommandName::Rename,
            Self::Attr { .. } => CommandName::Attr,
        }
    }

    /// Run this command against `fs`.
    pub async fn dispatch<B: Backend>(self, fs: &RemoteFs<B>) -> Result<CommandOutput, FsError> {
        match self {
            Self::Dir { path } => fs
                .dir(&RemotePath::from_arg(&path))
                .await
                .map(CommandOutput::Listing),
            Self::Get { path, delete } => fs
                .get(&RemotePath::from_arg(&path), delete)
                .await
                .map(CommandOutput::Content),
            Self::Put(request) => fs.put(request).await.map(CommandOutput::Written),
            Self::Delete { path } => fs
                .delete(&RemotePath::from_arg(&path))
                .await
                .map(|()| CommandOutput::Done),
            Self::Mkdir { path } => fs
                .mkdir(&RemotePath::from_arg(&path))
                .await
                .map(|()| CommandOutput::Done),
            Self::Rmdir { path } => fs
                .rmdir(&RemotePath::from_arg(&path))
                .await
                .map(|()| CommandOutput::Done),
            Self::Rename { from, to } => fs
                .rename(&RemotePath::from_arg(&from), &RemotePath::from_arg(&to))
                .await
                .map(|()| CommandOutput::Done),
            Self::Attr { path } => fs
                .attr(&RemotePath::from_arg(&path))
                .await
                .map(CommandOutput::Attributes),
        }
    }
}
