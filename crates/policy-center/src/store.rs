use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::StoreError;

/// Read-only view of the shared key/value store holding policy documents.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<String, StoreError>;
}

/// Process-local store, used by tests and by `serve` when no remote store is configured.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    entries: RwLock<HashMap<String, String>>,
    failures: AtomicUsize,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, document: impl Into<String>) {
        self.entries.write().insert(key.into(), document.into());
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Makes the next `count` reads fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        if self.take_failure() {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// Reads `<dir>/<key>.json`; lets a policy be edited on disk while the loop runs.
#[derive(Clone, Debug)]
pub struct FilePolicyStore {
    dir: PathBuf,
}

impl FilePolicyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl PolicyStore for FilePolicyStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(err) => Err(StoreError::Backend(format!("{}: {err}", path.display()))),
        }
    }
}
