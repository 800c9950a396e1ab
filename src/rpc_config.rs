//! Public, transport-agnostic RPC configuration.
//!
//! The same `RpcConfig` is handed to both ends: the server claims
//! `request_address`, the client writes requests to it and claims a private
//! reply address derived from `reply_dir` and `reply_prefix`.

use std::path::PathBuf;

/// Default cap on concurrently running dispatches per server.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Default capacity of a listener's frame inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Default file-name prefix of a client's reply endpoint.
pub const DEFAULT_REPLY_PREFIX: &str = "pipe-rpc-client";

/// Channel configuration.
///
/// # Example
///
/// ```
/// use pipe_rpc::RpcConfig;
///
/// let config = RpcConfig::new("/tmp/calculator.requests")
///     .with_max_in_flight(32)
///     .with_reply_prefix("calculator-client");
///
/// assert_eq!(config.max_in_flight, 32);
/// ```
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Well-known address shared by the server and its clients.
    ///
    /// For the FIFO transport this is a filesystem path; for the memory
    /// transport it is any string.
    pub request_address: String,

    /// Directory in which clients create their reply endpoints (FIFO only).
    pub reply_dir: PathBuf,

    /// Prefix of every reply endpoint name.
    pub reply_prefix: String,

    /// Upper bound on dispatches running at once on a server.
    ///
    /// When reached, the server stops reading until a dispatch finishes.
    pub max_in_flight: usize,

    /// Number of complete frames a listener buffers before its reader waits.
    pub inbox_capacity: usize,
}

impl RpcConfig {
    /// Create a config for the given request address with defaults elsewhere.
    pub fn new(request_address: impl Into<String>) -> Self {
        Self {
            request_address: request_address.into(),
            reply_dir: std::env::temp_dir(),
            reply_prefix: DEFAULT_REPLY_PREFIX.to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }

    /// Set the directory used for reply endpoints.
    pub fn with_reply_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reply_dir = dir.into();
        self
    }

    /// Set the reply endpoint name prefix.
    pub fn with_reply_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reply_prefix = prefix.into();
        self
    }

    /// Set the in-flight dispatch cap. Zero is treated as one.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit.max(1);
        self
    }

    /// Set the listener inbox capacity. Zero is treated as one.
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_defaults() {
        // ---
        let config = RpcConfig::new("requests");
        assert_eq!(config.request_address, "requests");
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.inbox_capacity, DEFAULT_INBOX_CAPACITY);
        assert_eq!(config.reply_prefix, DEFAULT_REPLY_PREFIX);
        assert_eq!(config.reply_dir, std::env::temp_dir());
    }

    #[test]
    fn test_zero_limits_clamped() {
        // ---
        let config = RpcConfig::new("requests")
            .with_max_in_flight(0)
            .with_inbox_capacity(0);
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.inbox_capacity, 1);
    }
}
