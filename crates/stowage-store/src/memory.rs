use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::id::BlobId;
use crate::traits::BlobStore;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock` and
/// keyed by a sequential 8-byte little-endian counter, so identifiers are
/// never reused within one store. Deleting a missing identifier is a no-op.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<BlobId, Vec<u8>>>,
    next_key: AtomicU64,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            next_key: AtomicU64::new(1),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.read_map().values().map(|b| b.len() as u64).sum()
    }

    /// Remove all blobs from the store. Identifiers are not reused afterwards.
    pub fn clear(&self) {
        self.write_map().clear();
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<BlobId, Vec<u8>>> {
        self.blobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<BlobId, Vec<u8>>> {
        self.blobs.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, data: &[u8]) -> StoreResult<BlobId> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let id = BlobId::new(key.to_le_bytes().to_vec());
        self.write_map().insert(id.clone(), data.to_vec());
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> StoreResult<Vec<u8>> {
        self.read_map()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn del(&self, id: &BlobId) -> StoreResult<()> {
        self.write_map().remove(id);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &count)
            .finish()
    }
}
