//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the transport
//! layer. The FIFO transport approximates it as closely as the operating
//! system allows.
//!
//! - Once `listen()` returns, frames sent to that address afterwards are
//!   deliverable to the listener.
//! - Each `send()` is one atomic write. The bytes are split at terminators
//!   exactly as a stream reader would; an unterminated tail is discarded.
//! - A full inbox makes `send()` wait, like a full pipe.
//! - Sending to an address nobody listens on fails with `NotFound`.
//!
//! ## Non-Goals
//!
//! This transport does not emulate partial writes, interleaving, or any
//! other failure mode of a real byte stream.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::FrameBuffer;
use crate::sync_util::lock_ignore_poison;
use crate::{
    // ---
    log_debug,
    log_warn,
    Address,
    ClaimMode,
    Listener,
    Result,
    RpcConfig,
    RpcError,
    Transport,
    TransportPtr,
};

/// Shared address space for the in-memory transport.
///
/// All `MemoryTransport` instances that share a `MemoryHub` can send to each
/// other's listeners, exactly as processes sharing a filesystem can open each
/// other's FIFOs.
///
/// Construct one hub per test to keep parallel tests isolated:
///
/// ```
/// # use pipe_rpc::{MemoryHub, RpcConfig};
/// let hub = MemoryHub::new();
/// let config = RpcConfig::new("calculator");
///
/// let server_side = pipe_rpc::create_memory_transport_with_hub(&config, hub.clone());
/// let client_side = pipe_rpc::create_memory_transport_with_hub(&config, hub);
/// # let _ = (server_side, client_side);
/// ```
pub struct MemoryHub {
    // ---
    endpoints: Mutex<HashMap<Address, Endpoint>>,
    generation: AtomicU64,
}

struct Endpoint {
    generation: u64,
    tx: mpsc::Sender<Bytes>,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    /// Number of addresses currently claimed.
    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.endpoints).len()
    }

    /// True if no address is claimed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `address` is currently claimed.
    pub fn contains(&self, address: &Address) -> bool {
        lock_ignore_poison(&self.endpoints).contains_key(address)
    }

    fn claim(
        self: &Arc<Self>,
        address: &Address,
        claim: ClaimMode,
        capacity: usize,
    ) -> Result<Listener> {
        // ---
        let (tx, rx) = mpsc::channel(capacity);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        let mut endpoints = lock_ignore_poison(&self.endpoints);

        if let Some(existing) = endpoints.get(address) {
            match claim {
                ClaimMode::Exclusive if !existing.tx.is_closed() => {
                    return Err(RpcError::AddressInUse(address.to_string()));
                }
                _ => log_debug!("memory: reclaiming {address}"),
            }
        }

        endpoints.insert(address.clone(), Endpoint { generation, tx });

        let release = Release {
            hub: self.clone(),
            address: address.clone(),
            generation,
        };

        Ok(Listener::new(address.clone(), rx, release))
    }

    fn sender(&self, address: &Address) -> Option<mpsc::Sender<Bytes>> {
        lock_ignore_poison(&self.endpoints)
            .get(address)
            .map(|ep| ep.tx.clone())
    }

    fn release(&self, address: &Address, generation: u64) {
        // ---
        let mut endpoints = lock_ignore_poison(&self.endpoints);

        // A reclaimed address belongs to the newer listener; leave it alone.
        if endpoints
            .get(address)
            .is_some_and(|ep| ep.generation == generation)
        {
            endpoints.remove(address);
            log_debug!("memory: released {address}");
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        // ---
        Self {
            endpoints: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }
}

/// Unregisters a listener's address when the listener is dropped.
struct Release {
    hub: Arc<MemoryHub>,
    address: Address,
    generation: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.hub.release(&self.address, self.generation);
    }
}

/// In-memory transport.
///
/// Routes frames through a shared [`MemoryHub`]. Multiple transport instances
/// sharing the same hub reach each other's listeners.
struct MemoryTransport {
    // ---
    hub: Arc<MemoryHub>,
    inbox_capacity: usize,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn name(&self) -> &'static str {
        "memory"
    }

    fn private_address(&self, config: &RpcConfig) -> Address {
        Address::from(format!("{}.{}", config.reply_prefix, Uuid::new_v4().simple()))
    }

    async fn listen(&self, address: &Address, claim: ClaimMode) -> Result<Listener> {
        self.hub.claim(address, claim, self.inbox_capacity)
    }

    /// Split the write into frames and queue each one on the listener's inbox.
    async fn send(&self, address: &Address, frame: Bytes) -> Result<()> {
        // ---
        let tx = self.hub.sender(address).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no listener at {address}"))
        })?;

        let mut buffer = FrameBuffer::new();
        for body in buffer.push(&frame) {
            tx.send(body).await.map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, format!("listener at {address} closed"))
            })?;
        }

        if buffer.pending_len() > 0 {
            log_warn!(
                "memory: discarded {} unterminated bytes sent to {address}",
                buffer.pending_len()
            );
        }

        Ok(())
    }
}

/// Create an in-memory transport with its own private hub.
///
/// Server and clients must share the returned pointer (it is cheap to clone)
/// to reach each other.
pub fn create_memory_transport(config: &RpcConfig) -> TransportPtr {
    // ---
    create_memory_transport_with_hub(config, MemoryHub::new())
}

/// Create an in-memory transport over an explicitly shared hub.
pub fn create_memory_transport_with_hub(config: &RpcConfig, hub: Arc<MemoryHub>) -> TransportPtr {
    // ---
    Arc::new(MemoryTransport {
        hub,
        inbox_capacity: config.inbox_capacity.max(1),
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::protocol::encode_frame;
    use tokio::time::{timeout, Duration};

    fn transport() -> (TransportPtr, Arc<MemoryHub>) {
        let hub = MemoryHub::new();
        let config = RpcConfig::new("test");
        (create_memory_transport_with_hub(&config, hub.clone()), hub)
    }

    #[tokio::test]
    async fn test_listen_then_send_delivers() {
        // ---
        let (transport, _hub) = transport();
        let address = Address::from("inbox");

        let mut listener = transport.listen(&address, ClaimMode::Exclusive).await.unwrap();
        transport
            .send(&address, encode_frame(b"hello".to_vec()))
            .await
            .unwrap();

        let frame = timeout(Duration::from_millis(100), listener.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("inbox closed unexpectedly");
        assert_eq!(&frame[..], b"hello");
    }

    #[tokio::test]
    async fn test_one_write_many_frames() {
        // ---
        let (transport, _hub) = transport();
        let address = Address::from("inbox");
        let mut listener = transport.listen(&address, ClaimMode::Exclusive).await.unwrap();

        transport
            .send(&address, Bytes::from_static(b"a\0b\0partial"))
            .await
            .unwrap();

        assert_eq!(&listener.recv().await.unwrap()[..], b"a");
        assert_eq!(&listener.recv().await.unwrap()[..], b"b");
        assert!(timeout(Duration::from_millis(50), listener.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_send_without_listener_fails() {
        // ---
        let (transport, _hub) = transport();
        let err = transport
            .send(&Address::from("nobody"), encode_frame(b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_exclusive_claim_collides() {
        // ---
        let (transport, _hub) = transport();
        let address = Address::from("taken");

        let _first = transport.listen(&address, ClaimMode::Exclusive).await.unwrap();
        let second = transport.listen(&address, ClaimMode::Exclusive).await;
        assert!(matches!(second, Err(RpcError::AddressInUse(_))));
    }

    #[tokio::test]
    async fn test_reclaim_replaces_and_old_release_is_ignored() {
        // ---
        let (transport, hub) = transport();
        let address = Address::from("well-known");

        let mut old = transport.listen(&address, ClaimMode::Reclaim).await.unwrap();
        let mut new = transport.listen(&address, ClaimMode::Reclaim).await.unwrap();

        // The displaced listener sees its inbox close.
        assert!(old.recv().await.is_none());

        drop(old);
        assert!(hub.contains(&address));

        transport
            .send(&address, encode_frame(b"to-new".to_vec()))
            .await
            .unwrap();
        assert_eq!(&new.recv().await.unwrap()[..], b"to-new");

        drop(new);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_zero_inbox_capacity_is_clamped() {
        // ---
        let mut config = RpcConfig::new("test");
        config.inbox_capacity = 0;
        let transport = create_memory_transport(&config);
        let address = Address::from("inbox");

        let mut listener = transport.listen(&address, ClaimMode::Exclusive).await.unwrap();
        transport
            .send(&address, encode_frame(b"fits".to_vec()))
            .await
            .unwrap();
        assert_eq!(&listener.recv().await.unwrap()[..], b"fits");
    }

    #[test]
    fn test_private_addresses_unique() {
        // ---
        let (transport, _hub) = transport();
        let config = RpcConfig::new("x").with_reply_prefix("client");

        let a = transport.private_address(&config);
        let b = transport.private_address(&config);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("client."));
    }
}
