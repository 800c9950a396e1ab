//! Asynchronous request/response RPC between processes over named
//! byte-stream endpoints.
//!
//! A [`RpcServer`] claims a well-known address and dispatches every request
//! frame it reads to a handler in the currently bound [`Registry`]. A
//! [`RpcClient`] claims a private reply address, tags each request with a
//! correlation id and resolves the matching [`PendingCall`] when the
//! response comes back, in whatever order responses arrive.
//!
//! Frames are JSON documents ended by a single NUL byte. Two transports
//! are provided: named FIFOs (unix) and an in-process memory hub.
//!

// Import all sub modules once...
mod client;
mod domain;
mod macros;
mod server;
mod transport;

mod rpc_config;
mod sync_util;

mod error;

pub mod protocol;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{PendingCall, RpcClient};
pub use server::{Handler, HandlerResult, Registry, RpcServer};

pub use rpc_config::{RpcConfig, DEFAULT_INBOX_CAPACITY, DEFAULT_MAX_IN_FLIGHT, DEFAULT_REPLY_PREFIX};

pub use error::{Result, RpcError};
pub use protocol::CorrelationId;

pub use transport::{create_memory_transport, create_memory_transport_with_hub, MemoryHub};

#[cfg(unix)]
pub use transport::create_fifo_transport;

// --- public re-exports
pub use domain::{
    //
    Address,
    ClaimMode,
    Listener,
    Transport,
    TransportPtr,
};
