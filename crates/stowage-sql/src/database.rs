use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rusqlite::Connection;
use stowage_store::{Operation, StoreError, StoreResult, TimeoutScope};
use tracing::info;

/// Name of the blob table.
pub const TABLE_NAME: &str = "kv";

pub(crate) const SQL_CREATE_TABLE: &str = "
create table kv (
    k INTEGER not null primary key,
    v BLOB
)";
pub(crate) const SQL_PROBE_TABLE: &str = "select k from kv limit 1";
pub(crate) const SQL_INSERT: &str = "insert into kv (k, v) values (?1, ?2)";
pub(crate) const SQL_SELECT: &str = "select v from kv where k = ?1";
pub(crate) const SQL_DELETE: &str = "delete from kv where k = ?1";

/// Shared handle to an open SQLite connection.
///
/// Cloning is cheap; clones share the connection. Statements run on the
/// blocking thread pool one at a time, so the handle is safe to use from any
/// number of tasks.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Configuration(format!("unable to open {}: {e}", path.display()))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .and_then(|_| conn.busy_timeout(Duration::from_secs(5)))
            .map_err(|e| StoreError::Configuration(format!("unable to configure database: {e}")))?;
        info!(path = %path.display(), "database opened");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::Configuration(format!("unable to open in-memory database: {e}"))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// A panic in an earlier statement does not invalidate the connection,
    /// so a poisoned lock is recovered rather than propagated.
    pub(crate) async fn call<T, F>(&self, op: Operation, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::backend(op, "database task failed", e))?
    }

    #[cfg(test)]
    pub(crate) fn lock_for_test(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Create the blob table.
///
/// Refuses to touch a database that already has the table, so pointing the
/// setup step at a live database fails loudly instead of clobbering it.
pub async fn setup_db(db: &Database, timeout: Duration) -> StoreResult<()> {
    let scope = TimeoutScope::new(timeout);
    scope
        .run(
            Operation::Setup,
            db.call(Operation::Setup, |conn| {
                match conn.prepare(SQL_PROBE_TABLE) {
                    Ok(_) => {
                        return Err(StoreError::AlreadyInitialized(format!(
                            "table {TABLE_NAME} already exists (db is set up)"
                        )))
                    }
                    Err(e) if is_missing_table(&e) => {}
                    Err(e) => {
                        return Err(StoreError::backend(
                            Operation::Setup,
                            format!("unexpected error probing {TABLE_NAME} table"),
                            e,
                        ))
                    }
                }
                conn.execute_batch(SQL_CREATE_TABLE).map_err(|e| {
                    StoreError::backend(
                        Operation::Setup,
                        format!("unable to create {TABLE_NAME} table"),
                        e,
                    )
                })
            }),
        )
        .await?;
    info!(table = TABLE_NAME, "database set up");
    Ok(())
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table")
    )
}
