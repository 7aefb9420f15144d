//! In-process pinning cluster for store tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use stowage_cluster::{
    AddParams, AddedOutput, ClusterError, ClusterIdentity, ClusterResult, ContentReader,
    PinningCluster,
};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MockCluster {
    pub pins: Mutex<HashMap<String, Vec<u8>>>,
    pub params: Mutex<Vec<AddParams>>,
    pub staged_paths: Mutex<Vec<PathBuf>>,
    /// Sender of the most recent stalled add, kept so tests can observe the
    /// listener.
    pub last_sender: Mutex<Option<mpsc::Sender<AddedOutput>>>,
    pub adds: AtomicUsize,

    /// Progress events emitted before the result.
    pub progress_events: usize,
    /// Never complete `add`.
    pub stall_add: bool,
    /// Complete `add` without emitting a content identifier.
    pub omit_cid: bool,
    pub fail_add: bool,
    /// Never complete `cat`.
    pub stall_cat: bool,
    pub fail_id: bool,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cid_for(data: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        format!("QmMock{:016x}", hasher.finish())
    }

    pub fn last_params(&self) -> Option<AddParams> {
        self.params.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PinningCluster for MockCluster {
    async fn id(&self) -> ClusterResult<ClusterIdentity> {
        if self.fail_id {
            return Err(ClusterError::Status {
                status: 503,
                body: "peer is starting".into(),
            });
        }
        Ok(ClusterIdentity {
            id: "12D3KooWMock".into(),
            peername: "mock-0".into(),
            version: "1.0.0".into(),
            cluster_peers: vec!["12D3KooWMock".into()],
            error: String::new(),
        })
    }

    async fn add(
        &self,
        paths: &[PathBuf],
        params: &AddParams,
        events: mpsc::Sender<AddedOutput>,
    ) -> ClusterResult<()> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.params.lock().unwrap().push(params.clone());
        self.staged_paths.lock().unwrap().extend(paths.iter().cloned());

        if self.fail_add {
            return Err(ClusterError::Api {
                code: 500,
                message: "not enough peers to allocate".into(),
            });
        }
        if self.stall_add {
            *self.last_sender.lock().unwrap() = Some(events.clone());
            std::future::pending::<()>().await;
        }

        for path in paths {
            let data = tokio::fs::read(path).await?;
            for i in 0..self.progress_events {
                let _ = events
                    .send(AddedOutput::progress(&params.name, (i as u64 + 1) * 256))
                    .await;
            }
            if self.omit_cid {
                continue;
            }
            let cid = Self::cid_for(&data);
            let size = data.len() as u64;
            self.pins.lock().unwrap().insert(cid.clone(), data);
            let _ = events.send(AddedOutput::added(&params.name, cid, size)).await;
        }
        Ok(())
    }

    async fn cat(&self, cid: &str) -> ClusterResult<ContentReader> {
        if self.stall_cat {
            std::future::pending::<()>().await;
        }
        let data = self
            .pins
            .lock()
            .unwrap()
            .get(cid)
            .cloned()
            .ok_or_else(|| ClusterError::ContentNotFound(cid.to_owned()))?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }
}
