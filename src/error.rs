use thiserror::Error;

/// Errors that can occur during RPC operations.
///
/// Wire-side failures (malformed frames, handler errors, unknown operations)
/// never travel back to the peer; they are logged and dropped. The variants
/// here surface local failures to the caller of this crate's API.
#[derive(Error, Debug)]
pub enum RpcError {
    /// I/O failure on a transport endpoint
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A frame decoded but did not carry the fields the protocol requires
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The transport address is already claimed by another endpoint
    #[error("address already in use: {0}")]
    AddressInUse(String),

    /// A handler reported a failure; no response is sent for the request
    #[error("handler error: {0}")]
    Handler(String),

    /// The client went away before a response arrived
    #[error("connection closed")]
    ConnectionClosed,

    /// The channel has been shut down
    #[error("channel closed")]
    Closed,

    /// A background task panicked or was cancelled
    #[error("task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for RpcError {
    fn from(err: tokio::task::JoinError) -> Self {
        // ---
        RpcError::Join(err.to_string())
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
