//! # stowage-cluster
//!
//! Blob store backed by a replicating pinning cluster.
//!
//! Each `put` stages the payload in a uniquely named temporary file, adds it
//! to the cluster with the configured replication factors and returns the
//! content identifier (as UTF-8 bytes). `get` streams the content back.
//! Identical payloads share one pin, so `del` is unsupported.
//!
//! ## Components
//!
//! - [`PinningCluster`]: the collaborator seam (`id`, `add`, `cat`)
//! - [`RestClusterClient`]: HTTP implementation over the cluster REST API
//!   and its IPFS proxy
//! - [`ClusterBlobStore`]: the [`BlobStore`](stowage_store::BlobStore)
//!   implementation
//!
//! ```no_run
//! use stowage_cluster::{ClusterBlobStore, ClusterConfig, RestClientConfig, RestClusterClient};
//! use stowage_store::BlobStore;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RestClusterClient::new(&RestClientConfig::default())?;
//! let config = ClusterConfig::default().with_replication(1, 3);
//! let store = ClusterBlobStore::connect(client, config).await?;
//!
//! let id = store.put(b"hello").await?;
//! assert_eq!(store.get(&id).await?, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod cid;
pub mod client;
pub mod error;
pub mod rest;
pub mod staging;
pub mod store;

pub use cid::ContentId;
pub use client::{AddParams, AddedOutput, ClusterIdentity, ContentReader, PinningCluster};
pub use error::{ClusterError, ClusterResult};
pub use rest::{RestClientConfig, RestClusterClient};
pub use staging::StagedFile;
pub use store::{ClusterBlobStore, ClusterConfig, DEFAULT_TIMEOUT};
