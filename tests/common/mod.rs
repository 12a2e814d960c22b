#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use spfs::cache::policy::PolicySpec;
use spfs::fs::{Backend, BackendError, RemoteFile, RemoteFolder, RemoteFs, SnapshotCache};
use spfs::path::RemotePath;

pub const IDENTITY: &str = "alice@https://example.test/sites/docs";

/// The single timestamp every mock entry reports.
pub fn mock_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

#[derive(Default)]
pub struct MockState {
    files: Mutex<BTreeMap<RemotePath, Bytes>>,
    folders: Mutex<BTreeSet<RemotePath>>,
    pub find_file_calls: AtomicUsize,
    pub find_folder_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    /// When set, lookups fail with a service error.
    pub fail_lookups: AtomicBool,
    /// When set, `move_file` reports a refusal.
    pub refuse_moves: AtomicBool,
}

/// An in-memory document library that counts the lookups it serves.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &'static [u8]) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn with_folder(self, path: &str) -> Self {
        self.add_folder(path);
        self
    }

    pub fn add_file(&self, path: &str, content: &'static [u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(RemotePath::new(path), Bytes::from_static(content));
    }

    pub fn add_folder(&self, path: &str) {
        self.state
            .folders
            .lock()
            .unwrap()
            .insert(RemotePath::new(path));
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state
            .files
            .lock()
            .unwrap()
            .contains_key(&RemotePath::new(path))
    }

    pub fn content(&self, path: &str) -> Option<Bytes> {
        self.state
            .files
            .lock()
            .unwrap()
            .get(&RemotePath::new(path))
            .cloned()
    }

    pub fn find_file_calls(&self) -> usize {
        self.state.find_file_calls.load(Ordering::SeqCst)
    }

    pub fn find_folder_calls(&self) -> usize {
        self.state.find_folder_calls.load(Ordering::SeqCst)
    }

    fn folder_exists(&self, path: &RemotePath) -> bool {
        path.is_root() || self.state.folders.lock().unwrap().contains(path)
    }

    fn check_lookups(&self) -> Result<(), BackendError> {
        if self.state.fail_lookups.load(Ordering::SeqCst) {
            return Err(BackendError::Service("lookup failed".to_owned()));
        }
        Ok(())
    }

    /// Give concurrently polled callers a chance to pile up behind an in-flight lookup.
    async fn latency() {
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
    }
}

impl Backend for MockBackend {
    async fn list_folders(&self, dir: &RemotePath) -> Result<Vec<RemoteFolder>, BackendError> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.folder_exists(dir) {
            return Err(BackendError::NotFound(dir.clone()));
        }
        Ok(self
            .state
            .folders
            .lock()
            .unwrap()
            .iter()
            .filter(|folder| !folder.is_root() && folder.parent() == *dir)
            .map(|folder| RemoteFolder {
                name: folder.name().to_owned(),
                modified: mock_time(),
            })
            .collect())
    }

    async fn list_files(&self, dir: &RemotePath) -> Result<Vec<RemoteFile>, BackendError> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.folder_exists(dir) {
            return Err(BackendError::NotFound(dir.clone()));
        }
        Ok(self
            .state
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(file, _)| file.parent() == *dir)
            .map(|(file, content)| RemoteFile {
                name: file.name().to_owned(),
                size: content.len() as u64,
                modified: mock_time(),
            })
            .collect())
    }

    async fn find_file(&self, path: &RemotePath) -> Result<Option<RemoteFile>, BackendError> {
        self.state.find_file_calls.fetch_add(1, Ordering::SeqCst);
        Self::latency().await;
        self.check_lookups()?;
        Ok(self
            .state
            .files
            .lock()
            .unwrap()
            .get(path)
            .map(|content| RemoteFile {
                name: path.name().to_owned(),
                size: content.len() as u64,
                modified: mock_time(),
            }))
    }

    async fn find_folder(&self, path: &RemotePath) -> Result<Option<RemoteFolder>, BackendError> {
        self.state.find_folder_calls.fetch_add(1, Ordering::SeqCst);
        Self::latency().await;
        self.check_lookups()?;
        Ok(self.folder_exists(path).then(|| RemoteFolder {
            name: path.name().to_owned(),
            modified: mock_time(),
        }))
    }

    async fn read_file(&self, path: &RemotePath) -> Result<Bytes, BackendError> {
        self.state
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(path.clone()))
    }

    async fn create_file(&self, path: &RemotePath, content: Bytes) -> Result<(), BackendError> {
        let mut files = self.state.files.lock().unwrap();
        if files.contains_key(path) {
            return Err(BackendError::AlreadyExists(path.clone()));
        }
        files.insert(path.clone(), content);
        Ok(())
    }

    async fn update_file(&self, path: &RemotePath, content: Bytes) -> Result<(), BackendError> {
        let mut files = self.state.files.lock().unwrap();
        let Some(existing) = files.get_mut(path) else {
            return Err(BackendError::NotFound(path.clone()));
        };
        *existing = content;
        Ok(())
    }

    async fn delete_file(&self, path: &RemotePath) -> Result<(), BackendError> {
        self.state
            .files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(path.clone()))
    }

    async fn create_folder(&self, path: &RemotePath) -> Result<(), BackendError> {
        if !self.state.folders.lock().unwrap().insert(path.clone()) {
            return Err(BackendError::AlreadyExists(path.clone()));
        }
        Ok(())
    }

    async fn delete_folder(&self, path: &RemotePath) -> Result<(), BackendError> {
        if !self.state.folders.lock().unwrap().remove(path) {
            return Err(BackendError::NotFound(path.clone()));
        }
        Ok(())
    }

    async fn move_file(&self, from: &RemotePath, to: &RemotePath) -> Result<bool, BackendError> {
        if self.state.refuse_moves.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut files = self.state.files.lock().unwrap();
        let content = files
            .remove(from)
            .ok_or_else(|| BackendError::NotFound(from.clone()))?;
        files.insert(to.clone(), content);
        Ok(true)
    }
}

/// A cache running under the default policy.
pub fn default_cache() -> Arc<SnapshotCache> {
    Arc::new(SnapshotCache::new(PolicySpec::default()))
}

/// A filesystem for [`IDENTITY`] over `backend` with a fresh default cache.
pub fn remote_fs(backend: &MockBackend) -> RemoteFs<MockBackend> {
    RemoteFs::new(backend.clone(), IDENTITY, default_cache())
}
