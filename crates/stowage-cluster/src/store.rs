use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stowage_store::{BlobId, BlobStore, Operation, StoreError, StoreResult, TimeoutScope};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cid::ContentId;
use crate::client::{AddParams, AddedOutput, ClusterIdentity, PinningCluster};
use crate::error::ClusterError;
use crate::staging::StagedFile;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered add events between the client and the listener.
const EVENT_BUFFER: usize = 64;

/// Configuration for [`ClusterBlobStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum duration of each call. Zero means calls never time out.
    #[serde(with = "duration_millis", rename = "default_timeout_ms")]
    pub default_timeout: Duration,
    /// Directory for staged upload files.
    pub temp_dir: PathBuf,
    /// -1 = all peers, 0 = cluster default, >0 = that many peers.
    pub replication_factor_min: i32,
    pub replication_factor_max: i32,
    /// Add content on the receiving peer only.
    pub local: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            temp_dir: std::env::temp_dir(),
            replication_factor_min: 0,
            replication_factor_max: 0,
            local: false,
        }
    }
}

impl ClusterConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_replication(mut self, min: i32, max: i32) -> Self {
        self.replication_factor_min = min;
        self.replication_factor_max = max;
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !self.temp_dir.is_dir() {
            return Err(StoreError::Configuration(format!(
                "temp_dir {} is not a directory",
                self.temp_dir.display()
            )));
        }
        for (name, factor) in [
            ("replication_factor_min", self.replication_factor_min),
            ("replication_factor_max", self.replication_factor_max),
        ] {
            if factor < -1 {
                return Err(StoreError::Configuration(format!(
                    "{name} must be -1, 0 or positive, got {factor}"
                )));
            }
        }
        if self.replication_factor_min > 0
            && self.replication_factor_max > 0
            && self.replication_factor_min > self.replication_factor_max
        {
            return Err(StoreError::Configuration(format!(
                "replication_factor_min ({}) exceeds replication_factor_max ({})",
                self.replication_factor_min, self.replication_factor_max
            )));
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Blob store backed by a pinning cluster.
///
/// `put` stages the payload in a temporary file, adds it with the configured
/// pinning options and returns the content identifier's text bytes. `get`
/// streams the content back. Content-addressed pins are shared between
/// identical payloads, so `del` is not supported.
pub struct ClusterBlobStore<C> {
    cluster: C,
    config: ClusterConfig,
    identity: ClusterIdentity,
}

impl<C: PinningCluster> ClusterBlobStore<C> {
    /// Validate `config` and check that the cluster answers.
    pub async fn connect(cluster: C, config: ClusterConfig) -> StoreResult<Self> {
        config.validate()?;

        let scope = TimeoutScope::new(config.default_timeout);
        let identity = scope
            .run(Operation::Connect, async {
                cluster.id().await.map_err(|e| {
                    StoreError::Configuration(format!("unable to fetch cluster id: {e}"))
                })
            })
            .await?;

        info!(
            peer = %identity.id,
            peername = %identity.peername,
            peers = identity.cluster_peers.len(),
            timeout = ?config.default_timeout,
            "cluster blob store ready"
        );
        Ok(Self {
            cluster,
            config,
            identity,
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Identity reported by the cluster at connect time.
    pub fn identity(&self) -> &ClusterIdentity {
        &self.identity
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    fn add_params(&self, name: &str) -> AddParams {
        AddParams {
            replication_factor_min: self.config.replication_factor_min,
            replication_factor_max: self.config.replication_factor_max,
            name: name.to_owned(),
            local: self.config.local,
        }
    }

    /// Add `staged` and wait for its content identifier. The listener task
    /// ends when `cancel` fires.
    async fn add_staged(
        &self,
        staged: &StagedFile,
        cancel: CancellationToken,
    ) -> StoreResult<ContentId> {
        let params = self.add_params(staged.name());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (cid_tx, cid_rx) = oneshot::channel();
        tokio::spawn(listen_for_cid(events_rx, cid_tx, cancel));

        let paths = [staged.path().to_path_buf()];
        self.cluster
            .add(&paths, &params, events_tx)
            .await
            .map_err(|e| StoreError::backend(Operation::Put, "adding to cluster", e))?;
        cid_rx.await.map_err(|_| {
            StoreError::backend(
                Operation::Put,
                "adding to cluster",
                "add finished without a content identifier",
            )
        })
    }
}

/// Wait for the first add event that carries a usable content identifier.
///
/// Ends when the identifier is found, the event stream closes, or `cancel`
/// fires.
async fn listen_for_cid(
    mut events: mpsc::Receiver<AddedOutput>,
    found: oneshot::Sender<ContentId>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };
        let Some(text) = event.cid else {
            trace!(name = %event.name, bytes = event.bytes, "add progress");
            continue;
        };
        match ContentId::parse(&text) {
            Ok(cid) => {
                // The receiver is gone only if put already returned.
                let _ = found.send(cid);
                return;
            }
            Err(e) => warn!(cid = %text, error = %e, "ignoring malformed content identifier"),
        }
    }
}

#[async_trait]
impl<C: PinningCluster> BlobStore for ClusterBlobStore<C> {
    async fn put(&self, data: &[u8]) -> StoreResult<BlobId> {
        let scope = TimeoutScope::new(self.config.default_timeout);
        let token = scope.token();

        let (staged, cid) = scope
            .run(Operation::Put, async {
                let staged = StagedFile::write(&self.config.temp_dir, data)
                    .await
                    .map_err(|e| StoreError::backend(Operation::Put, "writing staged file", e))?;
                match self.add_staged(&staged, token).await {
                    Ok(cid) => Ok((staged, cid)),
                    Err(e) => {
                        staged.remove().await;
                        Err(e)
                    }
                }
            })
            .await?;

        debug!(%cid, name = staged.name(), bytes = data.len(), "blob pinned");
        staged.remove().await;
        Ok(cid.to_blob_id())
    }

    async fn get(&self, id: &BlobId) -> StoreResult<Vec<u8>> {
        let cid = ContentId::from_blob_id(id)?;
        let scope = TimeoutScope::new(self.config.default_timeout);

        let data = scope
            .run(Operation::Get, async {
                let mut reader = self.cluster.cat(cid.as_str()).await.map_err(|e| match e {
                    ClusterError::ContentNotFound(_) => StoreError::NotFound(id.clone()),
                    e => StoreError::backend(Operation::Get, format!("unable to fetch cid {cid}"), e),
                })?;
                let mut data = Vec::new();
                reader.read_to_end(&mut data).await.map_err(|e| {
                    StoreError::backend(Operation::Get, format!("error reading cid data {cid}"), e)
                })?;
                Ok(data)
            })
            .await?;

        debug!(%cid, bytes = data.len(), "blob fetched");
        Ok(data)
    }

    async fn del(&self, _id: &BlobId) -> StoreResult<()> {
        Err(StoreError::Unsupported {
            op: Operation::Del,
            backend: "cluster",
        })
    }

    fn backend(&self) -> &'static str {
        "cluster"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClusterConfig::default();
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_replication_factors() {
        let err = ClusterConfig::default()
            .with_replication(-2, 0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("replication_factor_min"));

        assert!(ClusterConfig::default()
            .with_replication(3, 2)
            .validate()
            .is_err());
        ClusterConfig::default().with_replication(-1, -1).validate().unwrap();
        ClusterConfig::default().with_replication(2, 0).validate().unwrap();
    }

    #[test]
    fn rejects_missing_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClusterConfig {
            temp_dir: dir.path().join("missing"),
            ..ClusterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_reads_millisecond_timeout() {
        let config: ClusterConfig = serde_json::from_str(
            r#"{"default_timeout_ms": 1500, "replication_factor_min": 1, "local": true}"#,
        )
        .unwrap();
        assert_eq!(config.default_timeout, Duration::from_millis(1500));
        assert_eq!(config.replication_factor_min, 1);
        assert_eq!(config.replication_factor_max, 0);
        assert!(config.local);
    }

    #[tokio::test]
    async fn listener_skips_progress_and_malformed_ids() {
        let (tx, rx) = mpsc::channel(8);
        let (found_tx, found_rx) = oneshot::channel();
        let task = tokio::spawn(listen_for_cid(rx, found_tx, CancellationToken::new()));

        tx.send(AddedOutput::progress("f", 10)).await.unwrap();
        tx.send(AddedOutput::added("f", "not a cid", 10)).await.unwrap();
        tx.send(AddedOutput::added("f", "QmGood", 10)).await.unwrap();

        assert_eq!(found_rx.await.unwrap().as_str(), "QmGood");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn listener_stops_on_cancel() {
        let (tx, rx) = mpsc::channel(8);
        let (found_tx, found_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listen_for_cid(rx, found_tx, cancel.clone()));

        cancel.cancel();
        task.await.unwrap();
        assert!(found_rx.await.is_err());
        assert!(tx.is_closed());
    }
}
