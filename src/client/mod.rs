//! Client channel: requests out, correlated responses back.
//!
//! A client owns one private reply endpoint for its whole life and a reader
//! task that matches every response on it to a pending call by correlation
//! id. Responses may arrive in any order.
mod pending;

use crate::protocol::{CorrelationId, IdAllocator, RequestMessage, ResponseMessage};
use crate::sync_util::lock_ignore_poison;
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    Address,
    ClaimMode,
    Listener,
    Result,
    RpcConfig,
    RpcError,
    TransportPtr,
};
use pending::{PendingRequests, Reply};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Attempts at claiming a fresh reply address before giving up.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// RPC client for one server address.
///
/// Cheap to clone; clones share the reply endpoint, the id sequence and the
/// pending-call table. Many requests may be outstanding at once.
///
/// # Example
///
/// ```
/// use pipe_rpc::{create_memory_transport, Registry, RpcClient, RpcConfig, RpcServer};
/// use serde_json::json;
///
/// # async fn example() -> pipe_rpc::Result<()> {
/// let config = RpcConfig::new("calculator");
/// let transport = create_memory_transport(&config);
///
/// let server = RpcServer::new(transport.clone(), &config).await?;
/// let registry = Registry::new();
/// registry.add("double", |p| Ok(Some(json!(p["value"].as_i64().unwrap_or(0) * 2))));
/// server.bind(registry).await?;
///
/// let client = RpcClient::new(transport, &config).await?;
/// let answer = client.call("double", json!({"value": 21})).await?;
/// assert_eq!(answer, Some(json!(42)));
///
/// // Unknown operations resolve to "no value"
/// assert_eq!(client.call("missing", json!(null)).await?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    // ---
    transport: TransportPtr,
    server: Address,
    reply: Address,
    ids: IdAllocator,
    pending: Arc<Mutex<PendingRequests>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

/// A request that has been sent and awaits its response.
///
/// Resolves to `Ok(Some(payload))`, or `Ok(None)` when the server replied
/// without a payload. Resolves to [`RpcError::ConnectionClosed`] if the
/// client is closed first. If the server never replies (a failing handler,
/// an unbound server, a lost frame) the future never resolves; wrap it in
/// [`tokio::time::timeout`] where that matters.
#[derive(Debug)]
#[must_use = "a PendingCall does nothing unless awaited"]
pub struct PendingCall {
    id: CorrelationId,
    rx: oneshot::Receiver<Reply>,
}

impl PendingCall {
    /// Correlation id the request was sent with.
    pub fn id(&self) -> CorrelationId {
        self.id
    }
}

impl Future for PendingCall {
    type Output = Result<Option<Value>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // ---
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.map_err(|_| RpcError::ConnectionClosed))
    }
}

impl RpcClient {
    // ---

    /// Claim a private reply endpoint and start the response reader.
    ///
    /// Requests go to `config.request_address`. The reply address comes from
    /// [`Transport::private_address`](crate::Transport::private_address); a
    /// collision with an existing endpoint is retried with a fresh name a
    /// few times.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if no reply endpoint can be claimed.
    pub async fn new(transport: TransportPtr, config: &RpcConfig) -> Result<Self> {
        // ---
        let listener = claim_reply_endpoint(&transport, config).await?;
        let reply = listener.address().clone();
        let server = Address::from(config.request_address.as_str());

        log_info!(
            "client {reply} ready for {server} ({} transport)",
            transport.name()
        );

        let pending = Arc::new(Mutex::new(PendingRequests::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(reply_loop(listener, pending.clone(), closed.clone()));

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                server,
                reply,
                ids: IdAllocator::new(),
                pending,
                reader: Mutex::new(Some(reader)),
                closed,
            }),
        })
    }

    /// The private address responses are sent to.
    pub fn reply_address(&self) -> &Address {
        &self.inner.reply
    }

    /// True once the client is closed, explicitly or because its reply
    /// endpoint went away. Requests fail with [`RpcError::Closed`] from then on.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        lock_ignore_poison(&self.inner.pending).len()
    }

    /// Send a request and return a future for its response.
    ///
    /// The frame has been written once this returns; awaiting the returned
    /// [`PendingCall`] only waits for the reply.
    ///
    /// # Errors
    ///
    /// [`RpcError::Closed`] after [`close`](Self::close), or the transport's
    /// error if the request could not be written. In both cases nothing is
    /// left pending.
    pub async fn request(&self, op: impl Into<String>, payload: Value) -> Result<PendingCall> {
        // ---
        let id = self.inner.ids.next_id();
        let frame = RequestMessage {
            response_path: self.inner.reply.to_string(),
            id,
            op: op.into(),
            payload,
        }
        .encode()?;

        // Register before writing so a fast reply always finds its slot.
        let rx = {
            let mut pending = lock_ignore_poison(&self.inner.pending);
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(RpcError::Closed);
            }
            pending.register(id)
        };

        if let Err(err) = self.inner.transport.send(&self.inner.server, frame).await {
            lock_ignore_poison(&self.inner.pending).remove(id);
            log_warn!("client {}: request {id} not sent: {err}", self.inner.reply);
            return Err(err);
        }

        log_debug!("client {}: sent request {id}", self.inner.reply);
        Ok(PendingCall { id, rx })
    }

    /// Send a request and wait for its response.
    pub async fn call(&self, op: impl Into<String>, payload: Value) -> Result<Option<Value>> {
        self.request(op, payload).await?.await
    }

    /// Like [`request`](Self::request), serializing `payload` first.
    pub async fn request_typed<TReq>(&self, op: impl Into<String>, payload: &TReq) -> Result<PendingCall>
    where
        TReq: Serialize,
    {
        // ---
        let payload = serde_json::to_value(payload)?;
        self.request(op, payload).await
    }

    /// Like [`call`](Self::call), with `serde` types on both ends.
    ///
    /// `Ok(None)` still means the server replied without a payload.
    pub async fn call_typed<TReq, TResp>(
        &self,
        op: impl Into<String>,
        payload: &TReq,
    ) -> Result<Option<TResp>>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        // ---
        let reply = self.request_typed(op, payload).await?.await?;
        reply
            .map(serde_json::from_value::<TResp>)
            .transpose()
            .map_err(RpcError::from)
    }

    /// Stop the reader and release the reply endpoint.
    ///
    /// Calls still pending resolve to [`RpcError::ConnectionClosed`] and
    /// later requests fail with [`RpcError::Closed`]. Idempotent; affects
    /// every clone.
    pub async fn close(&self) -> Result<()> {
        // ---
        {
            let _pending = lock_ignore_poison(&self.inner.pending);
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }

        let reader = lock_ignore_poison(&self.inner.reader).take();
        if let Some(reader) = reader {
            reader.abort();
            match reader.await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => return Err(err.into()),
            }
        }

        let dropped = lock_ignore_poison(&self.inner.pending).clear();
        log_info!(
            "client {}: closed, {dropped} call(s) abandoned",
            self.inner.reply
        );
        Ok(())
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("server", &self.inner.server)
            .field("reply", &self.inner.reply)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // ---
        if let Some(reader) = lock_ignore_poison(&self.reader).take() {
            reader.abort();
        }
        lock_ignore_poison(&self.pending).clear();
    }
}

async fn claim_reply_endpoint(transport: &TransportPtr, config: &RpcConfig) -> Result<Listener> {
    // ---
    let mut attempt = 1;
    loop {
        let address = transport.private_address(config);
        match transport.listen(&address, ClaimMode::Exclusive).await {
            Ok(listener) => return Ok(listener),
            Err(RpcError::AddressInUse(_)) if attempt < MAX_CLAIM_ATTEMPTS => {
                log_debug!("reply address {address} taken, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Match incoming responses to pending calls until the endpoint closes.
///
/// An endpoint that closes under the client closes the client too.
async fn reply_loop(
    mut listener: Listener,
    pending: Arc<Mutex<PendingRequests>>,
    closed: Arc<AtomicBool>,
) {
    // ---
    while let Some(frame) = listener.recv().await {
        let response = match ResponseMessage::decode(&frame) {
            Ok(response) => response,
            Err(_err) => {
                log_warn!("client {}: dropping bad response: {_err}", listener.address());
                continue;
            }
        };

        let id = response.id;
        if !lock_ignore_poison(&pending).complete(id, response.payload) {
            log_debug!("client {}: no pending call for id {id}", listener.address());
        }
    }

    let mut table = lock_ignore_poison(&pending);
    closed.store(true, Ordering::Release);
    let _abandoned = table.clear();
    log_error!(
        "client {}: reply endpoint closed, {_abandoned} call(s) abandoned",
        listener.address()
    );
}
