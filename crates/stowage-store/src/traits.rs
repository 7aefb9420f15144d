use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::id::BlobId;

/// Uniform blob storage contract.
///
/// All implementations must satisfy these invariants:
/// - `put` never mutates its input and returns a fresh identifier that stays
///   valid until a successful `del`.
/// - `get` returns exactly the bytes stored under the identifier, or
///   [`StoreError::NotFound`](crate::StoreError::NotFound) carrying the
///   queried identifier.
/// - Every call is bounded by the backend's configured timeout.
/// - No retries: collaborator failures are returned with the operation that
///   hit them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return the identifier to fetch it with.
    async fn put(&self, data: &[u8]) -> StoreResult<BlobId>;

    /// Fetch the blob stored under `id`.
    async fn get(&self, id: &BlobId) -> StoreResult<Vec<u8>>;

    /// Remove the blob stored under `id`.
    ///
    /// Whether deleting a missing identifier is an error, and whether
    /// deletion is supported at all, depends on the backend.
    async fn del(&self, id: &BlobId) -> StoreResult<()>;

    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, data: &[u8]) -> StoreResult<BlobId> {
        (**self).put(data).await
    }

    async fn get(&self, id: &BlobId) -> StoreResult<Vec<u8>> {
        (**self).get(id).await
    }

    async fn del(&self, id: &BlobId) -> StoreResult<()> {
        (**self).del(id).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    async fn put(&self, data: &[u8]) -> StoreResult<BlobId> {
        (**self).put(data).await
    }

    async fn get(&self, id: &BlobId) -> StoreResult<Vec<u8>> {
        (**self).get(id).await
    }

    async fn del(&self, id: &BlobId) -> StoreResult<()> {
        (**self).del(id).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}
