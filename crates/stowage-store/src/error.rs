use std::fmt;
use std::time::Duration;

use crate::id::BlobId;

/// The public operation an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    Get,
    Del,
    /// Schema creation (`setup_db`).
    Setup,
    /// Store construction and reachability checks.
    Connect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put => write!(f, "put"),
            Self::Get => write!(f, "get"),
            Self::Del => write!(f, "del"),
            Self::Setup => write!(f, "setup"),
            Self::Connect => write!(f, "connect"),
        }
    }
}

/// Coarse classification of a [`StoreError`].
///
/// Callers that only care about *what kind* of failure happened compare
/// kinds: two `NotFound` errors for different identifiers are the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Configuration,
    Transient,
    Timeout,
    Unsupported,
    InvalidIdentifier,
}

/// Boxed error from a collaborator (database engine, cluster client, filesystem).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record or object maps to the queried identifier.
    #[error("blob {0} not found")]
    NotFound(BlobId),

    /// The backend could not be constructed from its configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The schema the store needs already exists.
    #[error("already initialized: {0}")]
    AlreadyInitialized(String),

    /// The engine, network or filesystem failed during a call.
    #[error("{op} failed: {context}: {source}")]
    Backend {
        op: Operation,
        context: String,
        #[source]
        source: BoxError,
    },

    /// The configured deadline elapsed before the operation completed.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: Operation, after: Duration },

    /// The backend does not implement this operation.
    #[error("{op} is not supported by the {backend} backend")]
    Unsupported { op: Operation, backend: &'static str },

    /// The identifier cannot be decoded by this backend.
    #[error("invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },

    /// Every key for this execution id has been handed out.
    #[error("key space exhausted for execution id {execution_id:#010x}")]
    KeySpaceExhausted { execution_id: u32 },
}

impl StoreError {
    /// Wrap a collaborator error with the failing operation and context.
    pub fn backend(
        op: Operation,
        context: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Backend {
            op,
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn invalid_identifier(reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            reason: reason.into(),
        }
    }

    /// The classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Configuration(_) | Self::AlreadyInitialized(_) | Self::KeySpaceExhausted { .. } => {
                ErrorKind::Configuration
            }
            Self::Backend { .. } => ErrorKind::Transient,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// The identifier carried by a `NotFound` error.
    pub fn not_found_id(&self) -> Option<&BlobId> {
        match self {
            Self::NotFound(id) => Some(id),
            _ => None,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
