use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stowage_store::{BlobId, StoreError, StoreResult};

/// Identifies one run of one server process.
///
/// Forms the high 32 bits of every key the relational store mints. Two
/// processes (or two runs of the same process) must never share an
/// execution id, which is what lets each of them mint keys without asking
/// the database for a sequence. Zero is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(u32);

impl ExecutionId {
    /// Use an explicit, caller-managed execution id.
    pub fn new(raw: u32) -> StoreResult<Self> {
        if raw == 0 {
            return Err(StoreError::Configuration(
                "execution id must be non-zero".into(),
            ));
        }
        Ok(Self(raw))
    }

    /// Derive an execution id from a server identity and its start time.
    ///
    /// The value is the first four bytes of a BLAKE3 hash over both inputs,
    /// so restarts of the same server (different `started_at`) and
    /// different servers starting at the same instant get different ids
    /// with overwhelming probability.
    pub fn derive(server_identity: &str, started_at: DateTime<Utc>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"stowage.execution-id.v1\0");
        hasher.update(server_identity.as_bytes());
        hasher.update(&[0]);
        hasher.update(&started_at.timestamp().to_le_bytes());
        hasher.update(&started_at.timestamp_subsec_nanos().to_le_bytes());
        let b = hasher.finalize();
        let b = b.as_bytes();
        match u32::from_le_bytes([b[0], b[1], b[2], b[3]]) {
            0 => Self(1),
            raw => Self(raw),
        }
    }

    /// Derive an execution id for a server starting now.
    pub fn for_current_start(server_identity: &str) -> Self {
        Self::derive(server_identity, Utc::now())
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A 64-bit relational key: execution id in the high half, counter in the low.
///
/// Encoded as 8 little-endian bytes in the [`BlobId`] handed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SqlKey(u64);

impl SqlKey {
    /// Length of an encoded key.
    pub const ENCODED_LEN: usize = 8;

    pub fn from_parts(execution_id: u32, counter: u32) -> Self {
        Self((u64::from(execution_id) << 32) | u64::from(counter))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// The key as stored in the `k` column. Keys whose execution id has the
    /// top bit set map to negative integers; the mapping is lossless.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn from_i64(value: i64) -> Self {
        Self(value as u64)
    }

    pub fn execution_id(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn counter(self) -> u32 {
        self.0 as u32
    }

    pub fn encode(self) -> [u8; Self::ENCODED_LEN] {
        self.0.to_le_bytes()
    }

    /// Decode an 8-byte little-endian key.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let arr: [u8; Self::ENCODED_LEN] = bytes.try_into().map_err(|_| {
            StoreError::invalid_identifier(format!(
                "relational keys are {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(u64::from_le_bytes(arr)))
    }

    pub fn to_blob_id(self) -> BlobId {
        BlobId::new(self.encode().to_vec())
    }

    pub fn from_blob_id(id: &BlobId) -> StoreResult<Self> {
        Self::decode(id.as_bytes())
    }
}

impl fmt::Display for SqlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}", self.execution_id(), self.counter())
    }
}

/// Mints strictly increasing keys for one execution id.
///
/// The counter is the only shared mutable state in the relational store. It
/// lives in the store instance, starts at zero and is advanced with a single
/// atomic read-modify-write, so concurrent callers never observe the same
/// value. Once the low half is exhausted minting fails instead of wrapping.
#[derive(Debug)]
pub struct KeyMinter {
    execution_id: ExecutionId,
    counter: AtomicU32,
}

impl KeyMinter {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self::starting_after(execution_id, 0)
    }

    pub(crate) fn starting_after(execution_id: ExecutionId, issued: u32) -> Self {
        Self {
            execution_id,
            counter: AtomicU32::new(issued),
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Number of keys handed out so far.
    pub fn issued(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Mint the next key.
    pub fn next(&self) -> StoreResult<SqlKey> {
        let prev = self
            .counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| c.checked_add(1))
            .map_err(|_| StoreError::KeySpaceExhausted {
                execution_id: self.execution_id.get(),
            })?;
        Ok(SqlKey::from_parts(self.execution_id.get(), prev + 1))
    }
}
