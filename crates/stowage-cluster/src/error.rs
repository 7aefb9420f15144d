use std::io;

/// Errors reported by a pinning cluster client.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cluster answered with a non-success status.
    #[error("cluster returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The cluster reported an error inside an otherwise successful response.
    #[error("cluster error {code}: {message}")]
    Api { code: u16, message: String },

    /// No content is known for the identifier.
    #[error("content {0} not found")]
    ContentNotFound(String),

    /// A response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The client configuration is unusable.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Result alias for cluster client operations.
pub type ClusterResult<T> = Result<T, ClusterError>;
