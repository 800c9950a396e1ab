// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the domain-level transport interface used by the
//! client and server channels to exchange frames. It intentionally avoids
//! any reference to pipes, sockets, or other concrete mechanisms.
//!
//! A transport knows two things only: how to claim a named inbound endpoint
//! and deliver the complete frames written to it, and how to write one
//! complete frame to an endpoint named by someone else. Correlation,
//! dispatch and rebinding are handled elsewhere.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use crate::{Result, RpcConfig};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// A transport address.
///
/// Names an inbound endpoint: a FIFO path for the FIFO transport, an
/// arbitrary key for the memory transport. Requests carry the client's
/// reply address verbatim, so the protocol layer treats it as opaque text.
///
/// Addresses are immutable, cheap to clone, and safe to share across threads.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub Arc<str>);

impl Address {
    /// Borrow the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How [`Transport::listen`] treats an address that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMode {
    /// Remove whatever is there and take the address over.
    ///
    /// Used for a server's well-known request address, which may be left
    /// behind by a previous run.
    Reclaim,

    /// Fail with [`RpcError::AddressInUse`](crate::RpcError::AddressInUse).
    ///
    /// Used for private reply addresses, where a collision means another
    /// client owns the name.
    Exclusive,
}

/// An owned inbound endpoint.
///
/// Complete frames written to [`address`](Self::address) arrive on the inbox
/// with their terminator stripped, one frame per item. Dropping the listener
/// releases the endpoint: the transport stops delivering to it and removes
/// any backing resource (such as a FIFO node).
pub struct Listener {
    // ---
    address: Address,
    inbox: mpsc::Receiver<Bytes>,
    _release: Box<dyn Send + Sync>,
}

impl Listener {
    /// Assemble a listener (transport implementations only).
    ///
    /// `release` is dropped together with the listener and is expected to
    /// free the endpoint in its `Drop` impl.
    pub fn new(
        address: Address,
        inbox: mpsc::Receiver<Bytes>,
        release: impl Send + Sync + 'static,
    ) -> Self {
        Self {
            address,
            inbox,
            _release: Box::new(release),
        }
    }

    /// The address this listener owns.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Wait for the next complete frame.
    ///
    /// Returns `None` once the transport side has shut down. Cancel safe:
    /// a frame is never lost when the future is dropped before completion.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbox.recv().await
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Transport abstraction.
///
/// Implementations must ensure that:
/// - Once `listen()` returns, frames sent to that address afterwards are
///   delivered to the listener, whole and one at a time.
/// - `send()` hands the entire frame to the endpoint in one write. It may
///   wait until the endpoint accepts it; there is no timeout.
/// - No assumptions are made about ordering between frames sent by
///   different callers.
///
/// The memory transport serves as the reference implementation of these
/// semantics.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat its methods as
/// normal `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Produce a fresh address that is very unlikely to exist yet.
    ///
    /// Used for a client's private reply endpoint. Callers still claim it
    /// with [`ClaimMode::Exclusive`] and retry on collision.
    fn private_address(&self, config: &RpcConfig) -> Address;

    /// Claim `address` and start receiving the frames written to it.
    async fn listen(&self, address: &Address, claim: ClaimMode) -> Result<Listener>;

    /// Write one complete, terminated frame to the endpoint at `address`.
    async fn send(&self, address: &Address, frame: Bytes) -> Result<()>;
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - a server and many clients can share one transport instance
pub type TransportPtr = Arc<dyn Transport>;
