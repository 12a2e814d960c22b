//! A [`Backend`] that serves a directory on the host filesystem as a document library.
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::io::AsyncWriteExt as _;
use tracing::trace;

use spfs::fs::{Backend, BackendError, RemoteFile, RemoteFolder};
use spfs::path::RemotePath;

fn io_error(path: &RemotePath, e: std::io::Error) -> BackendError {
    match e.kind() {
        ErrorKind::NotFound => BackendError::NotFound(path.clone()),
        ErrorKind::AlreadyExists => BackendError::AlreadyExists(path.clone()),
        _ => BackendError::from(e),
    }
}

fn modified(metadata: &std::fs::Metadata) -> SystemTime {
    metadata.modified().unwrap_or(UNIX_EPOCH)
}

/// Serves the directory tree under `root`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: Arc<PathBuf>,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    fn host_path(&self, path: &RemotePath) -> PathBuf {
        path.segments()
            .fold(self.root.as_ref().clone(), |acc, segment| acc.join(segment))
    }

    /// Stat `path`, mapping "nothing there" to `None`.
    async fn metadata(&self, path: &RemotePath) -> Result<Option<std::fs::Metadata>, BackendError> {
        match tokio::fs::metadata(self.host_path(path)).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every child of `dir` whose metadata passes `keep`, sorted by name.
    async fn children(
        &self,
        dir: &RemotePath,
        keep: impl Fn(&std::fs::Metadata) -> bool,
    ) -> Result<Vec<(String, std::fs::Metadata)>, BackendError> {
        let mut read_dir = tokio::fs::read_dir(self.host_path(dir))
            .await
            .map_err(|e| io_error(dir, e))?;
        let mut children = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                trace!(name = ?entry.file_name(), "skipping non-UTF-8 entry");
                continue;
            };
            let metadata = entry.metadata().await?;
            if keep(&metadata) {
                children.push((name, metadata));
            }
        }
        children.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(children)
    }
}

impl Backend for LocalBackend {
    async fn list_folders(&self, dir: &RemotePath) -> Result<Vec<RemoteFolder>, BackendError> {
        Ok(self
            .children(dir, std::fs::Metadata::is_dir)
            .await?
            .into_iter()
            .map(|(name, metadata)| RemoteFolder {
                name,
                modified: modified(&metadata),
            })
            .collect())
    }

    async fn list_files(&self, dir: &RemotePath) -> Result<Vec<RemoteFile>, BackendError> {
        Ok(self
            .children(dir, std::fs::Metadata::is_file)
            .await?
            .into_iter()
            .map(|(name, metadata)| RemoteFile {
                name,
                size: metadata.len(),
                modified: modified(&metadata),
            })
            .collect())
    }

    async fn find_file(&self, path: &RemotePath) -> Result<Option<RemoteFile>, BackendError> {
        if path.is_root() {
            return Ok(None);
        }
        Ok(self
            .metadata(path)
            .await?
            .filter(std::fs::Metadata::is_file)
            .map(|metadata| RemoteFile {
                name: path.name().to_owned(),
                size: metadata.len(),
                modified: modified(&metadata),
            }))
    }

    async fn find_folder(&self, path: &RemotePath) -> Result<Option<RemoteFolder>, BackendError> {
        Ok(self
            .metadata(path)
            .await?
            .filter(std::fs::Metadata::is_dir)
            .map(|metadata| RemoteFolder {
                name: path.name().to_owned(),
                modified: modified(&metadata),
            }))
    }

    async fn read_file(&self, path: &RemotePath) -> Result<Bytes, BackendError> {
        tokio::fs::read(self.host_path(path))
            .await
            .map(Bytes::from)
            .map_err(|e| io_error(path, e))
    }

    async fn create_file(&self, path: &RemotePath, content: Bytes) -> Result<(), BackendError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.host_path(path))
            .await
            .map_err(|e| io_error(path, e))?;
        file.write_all(&content).await?;
        file.flush().await?;
        Ok(())
    }

    async fn update_file(&self, path: &RemotePath, content: Bytes) -> Result<(), BackendError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.host_path(path))
            .await
            .map_err(|e| io_error(path, e))?;
        file.write_all(&content).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_file(&self, path: &RemotePath) -> Result<(), BackendError> {
        tokio::fs::remove_file(self.host_path(path))
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn create_folder(&self, path: &RemotePath) -> Result<(), BackendError> {
        tokio::fs::create_dir(self.host_path(path))
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn delete_folder(&self, path: &RemotePath) -> Result<(), BackendError> {
        if path.is_root() {
            return Err(BackendError::Service(
                "refusing to delete the library root".to_owned(),
            ));
        }
        tokio::fs::remove_dir_all(self.host_path(path))
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn move_file(&self, from: &RemotePath, to: &RemotePath) -> Result<bool, BackendError> {
        if to.is_root() || self.find_folder(&to.parent()).await?.is_none() {
            return Ok(false);
        }
        if self.find_folder(to).await?.is_some() {
            return Ok(false);
        }
        tokio::fs::rename(self.host_path(from), self.host_path(to))
            .await
            .map_err(|e| io_error(from, e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        (dir, backend)
    }

    #[tokio::test]
    async fn lists_folders_and_files_separately() {
        let (dir, backend) = backend();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let folders = backend.list_folders(&RemotePath::root()).await.unwrap();
        let files = backend.list_files(&RemotePath::root()).await.unwrap();

        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "sub");
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(files[1].size, 2);
    }

    #[tokio::test]
    async fn find_distinguishes_files_from_folders() {
        let (dir, backend) = backend();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("x.bin"), b"xyz").unwrap();

        let file = RemotePath::new("sub/x.bin");
        let folder = RemotePath::new("sub");
        assert_eq!(backend.find_file(&file).await.unwrap().unwrap().size, 3);
        assert!(backend.find_folder(&file).await.unwrap().is_none());
        assert!(backend.find_file(&folder).await.unwrap().is_none());
        assert_eq!(
            backend.find_folder(&folder).await.unwrap().unwrap().name,
            "sub"
        );
        assert!(
            backend
                .find_folder(&RemotePath::root())
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            backend
                .find_file(&RemotePath::new("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn create_refuses_to_clobber_and_update_requires_existing() {
        let (_dir, backend) = backend();
        let path = RemotePath::new("doc.txt");

        assert!(matches!(
            backend.update_file(&path, Bytes::from_static(b"x")).await,
            Err(BackendError::NotFound(_))
        ));
        backend
            .create_file(&path, Bytes::from_static(b"first"))
            .await
            .unwrap();
        assert!(matches!(
            backend.create_file(&path, Bytes::from_static(b"again")).await,
            Err(BackendError::AlreadyExists(_))
        ));
        backend
            .update_file(&path, Bytes::from_static(b"2nd"))
            .await
            .unwrap();
        assert_eq!(backend.read_file(&path).await.unwrap(), "2nd");
    }

    #[tokio::test]
    async fn move_overwrites_but_refuses_missing_parent() {
        let (_dir, backend) = backend();
        let a = RemotePath::new("a.txt");
        let b = RemotePath::new("b.txt");
        backend.create_file(&a, Bytes::from_static(b"a")).await.unwrap();
        backend.create_file(&b, Bytes::from_static(b"b")).await.unwrap();

        assert!(!backend
            .move_file(&a, &RemotePath::new("nowhere/a.txt"))
            .await
            .unwrap());
        assert!(backend.move_file(&a, &b).await.unwrap());
        assert_eq!(backend.read_file(&b).await.unwrap(), "a");
        assert!(backend.find_file(&a).await.unwrap().is_none());
    }
}
