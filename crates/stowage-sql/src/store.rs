use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use stowage_store::{BlobId, BlobStore, Operation, StoreError, StoreResult, TimeoutScope};
use tracing::{debug, info};

use crate::database::{Database, SQL_DELETE, SQL_INSERT, SQL_SELECT};
use crate::key::{ExecutionId, KeyMinter, SqlKey};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`SqlBlobStore`].
#[derive(Clone, Debug)]
pub struct SqlConfig {
    /// Maximum duration of each `put`, `get` and `del`. Zero means calls
    /// never time out.
    pub default_timeout: Duration,
    /// High half of every key this store mints. Must be unique per process
    /// start.
    pub execution_id: ExecutionId,
}

impl SqlConfig {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            execution_id,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Blob store over a single `kv (k, v)` table.
///
/// Keys are minted client-side ([`KeyMinter`]) and inserted explicitly, so
/// `put` needs a single round trip and no engine auto-increment. The insert,
/// select and delete statements are prepared once at construction and
/// reused from the connection's statement cache.
pub struct SqlBlobStore {
    db: Database,
    config: SqlConfig,
    minter: KeyMinter,
}

impl SqlBlobStore {
    /// Open a store on a database whose table has already been set up.
    ///
    /// Fails with [`StoreError::Configuration`] when the statements cannot be
    /// prepared (typically because [`setup_db`](crate::setup_db) was never
    /// run).
    pub async fn open(db: Database, config: SqlConfig) -> StoreResult<Self> {
        let scope = TimeoutScope::new(config.default_timeout);
        scope
            .run(
                Operation::Connect,
                db.call(Operation::Connect, |conn| {
                    conn.set_prepared_statement_cache_capacity(16);
                    for (name, sql) in [("put", SQL_INSERT), ("get", SQL_SELECT), ("del", SQL_DELETE)] {
                        conn.prepare_cached(sql).map_err(|e| {
                            StoreError::Configuration(format!(
                                "unable to prepare {name}() statement: {e}"
                            ))
                        })?;
                    }
                    Ok(())
                }),
            )
            .await?;

        info!(
            execution_id = %config.execution_id,
            timeout = ?config.default_timeout,
            "sql blob store ready"
        );
        let minter = KeyMinter::new(config.execution_id);
        Ok(Self { db, config, minter })
    }

    pub fn config(&self) -> &SqlConfig {
        &self.config
    }

    /// Keys minted so far by this store instance.
    pub fn keys_issued(&self) -> u32 {
        self.minter.issued()
    }

    fn scope(&self) -> TimeoutScope {
        TimeoutScope::new(self.config.default_timeout)
    }
}

#[async_trait]
impl BlobStore for SqlBlobStore {
    async fn put(&self, data: &[u8]) -> StoreResult<BlobId> {
        let scope = self.scope();
        let key = self.minter.next()?;
        let payload = data.to_vec();

        scope
            .run(
                Operation::Put,
                self.db.call(Operation::Put, move |conn| {
                    conn.prepare_cached(SQL_INSERT)
                        .and_then(|mut stmt| stmt.execute(params![key.as_i64(), payload]))
                        .map_err(|e| {
                            StoreError::backend(Operation::Put, format!("inserting key {key}"), e)
                        })?;
                    Ok(())
                }),
            )
            .await?;

        debug!(%key, bytes = data.len(), "blob stored");
        Ok(key.to_blob_id())
    }

    async fn get(&self, id: &BlobId) -> StoreResult<Vec<u8>> {
        let key = SqlKey::from_blob_id(id)?;
        let scope = self.scope();

        let data = scope
            .run(
                Operation::Get,
                self.db.call(Operation::Get, move |conn| {
                    conn.prepare_cached(SQL_SELECT)
                        .and_then(|mut stmt| {
                            stmt.query_row(params![key.as_i64()], |row| row.get::<_, Vec<u8>>(0))
                                .optional()
                        })
                        .map_err(|e| {
                            StoreError::backend(Operation::Get, format!("querying key {key}"), e)
                        })
                }),
            )
            .await?;

        match data {
            Some(data) => {
                debug!(%key, bytes = data.len(), "blob fetched");
                Ok(data)
            }
            None => Err(StoreError::NotFound(id.clone())),
        }
    }

    async fn del(&self, id: &BlobId) -> StoreResult<()> {
        let key = SqlKey::from_blob_id(id)?;
        let scope = self.scope();

        let removed = scope
            .run(
                Operation::Del,
                self.db.call(Operation::Del, move |conn| {
                    conn.prepare_cached(SQL_DELETE)
                        .and_then(|mut stmt| stmt.execute(params![key.as_i64()]))
                        .map_err(|e| {
                            StoreError::backend(Operation::Del, format!("deleting key {key}"), e)
                        })
                }),
            )
            .await?;

        debug!(%key, removed, "blob deleted");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sql"
    }
}

impl std::fmt::Debug for SqlBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlBlobStore")
            .field("execution_id", &self.config.execution_id)
            .field("keys_issued", &self.minter.issued())
            .finish()
    }
}
