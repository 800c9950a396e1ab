//! Server channel: one reader loop over the well-known request address.
//!
//! The server claims its request address at construction and starts
//! reading once a registry is bound. Each complete request frame is
//! dispatched on its own task against whichever registry is bound when the
//! dispatch runs. Concurrency is capped by a semaphore; the reader does not
//! take the next frame until a dispatch slot is free.
//!
//! `bind` is the only operation with a strong ordering guarantee: it stops
//! the current reader, waits until every dispatch that reader spawned has
//! finished, swaps the registry and starts a fresh reader. When `bind`
//! returns, nothing from the previous binding is still running.

mod dispatch;
mod drain;
mod handler;
mod registry;

pub use handler::{Handler, HandlerResult};
pub use registry::Registry;

use crate::{
    // ---
    log_debug,
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
use dispatch::{dispatch, Binding, DispatchContext};
use drain::DrainBarrier;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

/// RPC server bound to one request address.
///
/// Cheap to clone; clones share the same endpoint and binding. The reader
/// is signalled to stop when the last clone is dropped, but only
/// [`shutdown`](Self::shutdown) waits for in-flight dispatches.
///
/// # Example
///
/// ```
/// use pipe_rpc::{create_memory_transport, Registry, RpcConfig, RpcServer};
/// use serde_json::json;
///
/// # async fn example() -> pipe_rpc::Result<()> {
/// let config = RpcConfig::new("calculator");
/// let transport = create_memory_transport(&config);
///
/// let server = RpcServer::new(transport, &config).await?;
///
/// let registry = Registry::new();
/// registry.add("ping", |_| Ok(Some(json!("pong"))));
/// server.bind(registry).await?;
///
/// server.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcServer {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    address: Address,
    ctx: Arc<DispatchContext>,
    permits: Arc<Semaphore>,
    drain: DrainBarrier,
    state: Mutex<State>,
}

enum State {
    /// Endpoint claimed, nothing reading yet.
    Idle(Listener),
    Running(Worker),
    /// Told to stop, still draining. The listener comes back on the handle.
    Stopping(JoinHandle<Listener>),
    Closed,
}

/// A running reader loop. The task hands the listener back when it exits.
struct Worker {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<Listener>,
}

impl State {
    /// Stop any reader and take the listener back, leaving `Closed`.
    ///
    /// Cancel safe: dropped while draining, the state stays `Stopping` and
    /// the next caller resumes the wait. `None` means already closed.
    async fn take_listener(&mut self) -> Result<Option<Listener>> {
        // ---
        match std::mem::replace(self, State::Closed) {
            State::Idle(listener) => return Ok(Some(listener)),
            State::Closed => return Ok(None),
            State::Running(worker) => {
                // Err means the loop already exited on its own
                let _ = worker.stop_tx.send(());
                *self = State::Stopping(worker.join);
            }
            stopping @ State::Stopping(_) => *self = stopping,
        }

        let State::Stopping(join) = self else {
            return Ok(None);
        };
        let joined = join.await;
        *self = State::Closed;
        Ok(Some(joined?))
    }
}

impl RpcServer {
    // ---

    /// Claim `config.request_address` and create an unbound server.
    ///
    /// A stale endpoint left at the address by an earlier run is replaced.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the address cannot be claimed.
    pub async fn new(transport: TransportPtr, config: &RpcConfig) -> Result<Self> {
        // ---
        let address = Address::from(config.request_address.as_str());
        let listener = transport.listen(&address, ClaimMode::Reclaim).await?;

        log_info!(
            "server listening on {address} ({} transport, max {} in flight)",
            transport.name(),
            config.max_in_flight
        );

        let binding: Binding = Arc::new(RwLock::new(None));

        Ok(Self {
            inner: Arc::new(Inner {
                address,
                ctx: Arc::new(DispatchContext { transport, binding }),
                permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
                drain: DrainBarrier::new(),
                state: Mutex::new(State::Idle(listener)),
            }),
        })
    }

    /// The request address this server reads from.
    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    /// Bind `registry`, replacing any previous binding.
    ///
    /// Waits for every dispatch started under the previous binding to
    /// finish before the new registry becomes visible. Frames that arrive
    /// meanwhile stay queued on the endpoint and are handled by the new
    /// binding. Concurrent calls are serialized.
    ///
    /// If the returned future is dropped before it completes, the previous
    /// registry stays bound but nothing is read until a later `bind`, which
    /// finishes the interrupted drain and proceeds normally.
    ///
    /// # Errors
    ///
    /// [`RpcError::Closed`] after [`shutdown`](Self::shutdown).
    pub async fn bind(&self, registry: impl Into<Arc<Registry>>) -> Result<()> {
        // ---
        let registry = registry.into();
        let mut state = self.inner.state.lock().await;

        if matches!(*state, State::Running(_) | State::Stopping(_)) {
            log_debug!("server {}: draining previous binding", self.inner.address);
        }
        let Some(listener) = state.take_listener().await? else {
            return Err(RpcError::Closed);
        };

        // Park the listener so a cancelled bind leaves the server usable.
        *state = State::Idle(listener);

        log_info!(
            "server {}: binding {} operation(s)",
            self.inner.address,
            registry.len()
        );
        *self.inner.ctx.binding.write().await = Some(registry);

        if let State::Idle(listener) = std::mem::replace(&mut *state, State::Closed) {
            *state = State::Running(self.start(listener));
        }
        Ok(())
    }

    /// Clear the binding without stopping the reader.
    ///
    /// Requests read from now on are dropped with no response, and calls
    /// already dispatched finish against the registry they looked up.
    pub async fn unbind(&self) {
        // ---
        let previous = self.inner.ctx.binding.write().await.take();
        if previous.is_some() {
            log_info!("server {}: unbound", self.inner.address);
        }
    }

    /// True if a registry is currently bound.
    pub async fn is_bound(&self) -> bool {
        self.inner.ctx.binding.read().await.is_some()
    }

    /// Number of dispatches currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.drain.in_flight()
    }

    /// Stop reading, wait for in-flight dispatches and release the endpoint.
    ///
    /// Idempotent. Afterwards [`bind`](Self::bind) fails with
    /// [`RpcError::Closed`].
    pub async fn shutdown(&self) -> Result<()> {
        // ---
        let mut state = self.inner.state.lock().await;

        let listener = state.take_listener().await?;

        self.inner.ctx.binding.write().await.take();

        if let Some(listener) = listener {
            log_info!("server {}: shut down", listener.address());
            drop(listener);
        }
        Ok(())
    }

    fn start(&self, listener: Listener) -> Worker {
        // ---
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(read_loop(
            listener,
            stop_rx,
            self.inner.ctx.clone(),
            self.inner.permits.clone(),
            self.inner.drain.clone(),
        ));
        Worker { stop_tx, join }
    }
}

impl fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcServer")
            .field("address", &self.inner.address)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        if let State::Running(worker) = std::mem::replace(self.state.get_mut(), State::Closed) {
            let _ = worker.stop_tx.send(());
        }
    }
}

/// Read frames until told to stop, dispatching each on its own task.
///
/// A dispatch slot is taken before the next frame is read, so stopping
/// never discards a frame that has already left the endpoint. Returns the
/// listener once every dispatch it spawned has finished.
async fn read_loop(
    mut listener: Listener,
    mut stop_rx: oneshot::Receiver<()>,
    ctx: Arc<DispatchContext>,
    permits: Arc<Semaphore>,
    drain: DrainBarrier,
) -> Listener {
    // ---
    loop {
        let permit = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let frame = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            frame = listener.recv() => match frame {
                Some(frame) => frame,
                None => {
                    log_warn!("server {}: endpoint closed, reader exiting", listener.address());
                    break;
                }
            },
        };

        let guard = drain.check_in();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            dispatch(frame, &ctx).await;
        });
    }

    drain.wait_idle().await;
    log_debug!("server {}: reader stopped", listener.address());
    listener
}
