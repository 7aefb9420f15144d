//! Backend-agnostic blob storage for Stowage.
//!
//! This crate defines the `put / get / del` contract every Stowage backend
//! implements, together with the pieces all backends share: the opaque
//! [`BlobId`], the [`StoreError`] taxonomy and the [`TimeoutScope`] that
//! bounds every call.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - `stowage-sql` -- single-table relational store with client-minted keys
//! - `stowage-cluster` -- content-addressed store backed by a pinning cluster
//!
//! # Design Rules
//!
//! 1. Identifiers are opaque outside the backend that minted them.
//! 2. Every public operation runs under exactly one timeout scope.
//! 3. Cancelled means "stopped waiting", never "rolled back".
//! 4. No retries: collaborator errors are returned with operation context.
//! 5. `NotFound` is compared by kind, not by the identifier it carries.

pub mod error;
pub mod id;
pub mod memory;
pub mod timeout;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{BoxError, ErrorKind, Operation, StoreError, StoreResult};
pub use id::BlobId;
pub use memory::InMemoryBlobStore;
pub use timeout::TimeoutScope;
pub use traits::BlobStore;
