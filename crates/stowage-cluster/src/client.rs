use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::error::ClusterResult;

/// Streaming reader over content fetched from the cluster.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// Identity of the cluster peer a client talks to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    /// Peer id of the answering cluster peer.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub peername: String,
    #[serde(default)]
    pub version: String,
    /// Peer ids of every cluster member known to the answering peer.
    #[serde(default)]
    pub cluster_peers: Vec<String>,
    /// Set when the peer is up but unhealthy.
    #[serde(default)]
    pub error: String,
}

/// Pinning parameters attached to an add request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddParams {
    /// Minimum number of peers that must hold a copy: -1 = all peers,
    /// 0 = cluster default, >0 = exactly that many.
    pub replication_factor_min: i32,
    /// Maximum number of peers that may hold a copy, same encoding.
    pub replication_factor_max: i32,
    /// Human-readable pin name.
    pub name: String,
    /// Add the content on the receiving peer only.
    pub local: bool,
}

/// One progress or result event emitted while adding content.
///
/// Progress events carry only `name` and `bytes`; the result event carries
/// the content identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AddedOutput {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_cid")]
    pub cid: Option<String>,
    /// Bytes processed so far.
    #[serde(default)]
    pub bytes: u64,
    /// Size of the added DAG.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub allocations: Vec<String>,
}

impl AddedOutput {
    /// A progress event without a content identifier.
    pub fn progress(name: impl Into<String>, bytes: u64) -> Self {
        Self {
            name: name.into(),
            bytes,
            ..Self::default()
        }
    }

    /// A result event carrying `cid`.
    pub fn added(name: impl Into<String>, cid: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            cid: Some(cid.into()),
            size,
            ..Self::default()
        }
    }
}

/// Clusters encode identifiers either as plain strings or as IPLD links
/// (`{"/": "<cid>"}`). Empty identifiers mean "no identifier yet".
fn deserialize_cid<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CidRepr {
        Text(String),
        Link {
            #[serde(rename = "/")]
            link: String,
        },
    }

    let repr = Option::<CidRepr>::deserialize(deserializer)?;
    Ok(repr
        .map(|r| match r {
            CidRepr::Text(s) => s,
            CidRepr::Link { link } => link,
        })
        .filter(|s| !s.is_empty()))
}

/// The pinning cluster as seen by the blob store.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait PinningCluster: Send + Sync {
    /// Fetch the identity of the cluster peer. Used as a reachability check.
    async fn id(&self) -> ClusterResult<ClusterIdentity>;

    /// Add the files at `paths` and pin the result with `params`.
    ///
    /// Progress and result events are sent on `events` in the order the
    /// cluster produces them. The receiver may go away at any point; a
    /// closed channel is not an error and must not stall the call.
    async fn add(
        &self,
        paths: &[PathBuf],
        params: &AddParams,
        events: mpsc::Sender<AddedOutput>,
    ) -> ClusterResult<()>;

    /// Open a streaming read of the content named by `cid`.
    async fn cat(&self, cid: &str) -> ClusterResult<ContentReader>;
}
