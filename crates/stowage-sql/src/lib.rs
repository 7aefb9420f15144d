//! Relational blob table backend for Stowage.
//!
//! Blobs live in a single `kv (k INTEGER PRIMARY KEY, v BLOB)` table in
//! SQLite. Keys are minted by the store itself: the high 32 bits are the
//! [`ExecutionId`] of the running process, the low 32 bits a per-store
//! counter. Every process start uses a new execution id, so writers never
//! collide and the database never has to hand out a sequence.
//!
//! ```no_run
//! # async fn demo() -> stowage_store::StoreResult<()> {
//! use std::time::Duration;
//! use stowage_sql::{setup_db, Database, ExecutionId, SqlBlobStore, SqlConfig};
//! use stowage_store::BlobStore;
//!
//! let db = Database::open("blobs.db")?;
//! setup_db(&db, Duration::from_secs(5)).await?;
//!
//! let config = SqlConfig::new(ExecutionId::for_current_start("node-1"));
//! let store = SqlBlobStore::open(db, config).await?;
//! let id = store.put(b"payload").await?;
//! assert_eq!(store.get(&id).await?, b"payload");
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod key;
pub mod store;

pub use database::{setup_db, Database, TABLE_NAME};
pub use key::{ExecutionId, KeyMinter, SqlKey};
pub use store::{SqlBlobStore, SqlConfig, DEFAULT_TIMEOUT};
