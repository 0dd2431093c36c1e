//! Object storage abstraction for the alert ledger

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{Result, WatchError};

/// Minimal object store contract: existence check, whole-object read,
/// whole-object overwrite.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Returns `WatchError::Storage` if the object does not exist.
    async fn download(&self, name: &str) -> Result<Vec<u8>>;

    /// Replaces the object if it exists.
    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
}

/// In-memory object store for tests.
///
/// Reads and writes can be made to fail to exercise the fail-open paths.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    uploads: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, name: &str, data: &[u8]) -> Self {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(name.to_string(), data.to_vec());
        }
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw object contents, if present
    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.read().ok()?.get(name).cloned()
    }

    /// Number of successful uploads so far
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(WatchError::Storage("simulated read outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        self.check_reads()?;
        let objects = self
            .objects
            .read()
            .map_err(|_| WatchError::Internal("lock poisoned".to_string()))?;
        Ok(objects.contains_key(name))
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        self.check_reads()?;
        let objects = self
            .objects
            .read()
            .map_err(|_| WatchError::Internal("lock poisoned".to_string()))?;
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| WatchError::Storage(format!("object not found: {name}")))
    }

    async fn upload(&self, name: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WatchError::Storage("simulated write outage".to_string()));
        }
        let mut objects = self
            .objects
            .write()
            .map_err(|_| WatchError::Internal("lock poisoned".to_string()))?;
        objects.insert(name.to_string(), data);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
