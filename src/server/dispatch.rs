//! Handling of one inbound request, start to finish.
//!
//! Decode, look up against the currently bound registry, invoke, encode,
//! reply. Nothing that goes wrong here leaves the dispatch: every failure
//! is logged and the request is dropped.

use super::Registry;
use crate::protocol::{RequestMessage, ResponseMessage};
use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    Address,
    Result,
    RpcError,
    TransportPtr,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The server's current registry, or `None` while unbound.
pub(super) type Binding = Arc<RwLock<Option<Arc<Registry>>>>;

/// Everything a dispatch needs, shared by all dispatches of a server.
pub(super) struct DispatchContext {
    pub(super) transport: TransportPtr,
    pub(super) binding: Binding,
}

/// Run one dispatch to completion, logging instead of failing.
pub(super) async fn dispatch(frame: Bytes, ctx: &DispatchContext) {
    // ---
    match dispatch_inner(frame, ctx).await {
        Ok(()) => {}
        Err(RpcError::Malformed(_reason)) => {
            log_debug!("dropping malformed request: {_reason}");
        }
        Err(_err) => {
            log_warn!("dispatch failed: {_err}");
        }
    }
}

async fn dispatch_inner(frame: Bytes, ctx: &DispatchContext) -> Result<()> {
    // ---
    let request = RequestMessage::decode(&frame)?;

    let registry = ctx.binding.read().await.clone();
    let Some(registry) = registry else {
        log_debug!(
            "dropping request {} for '{}': no registry bound",
            request.id,
            request.op
        );
        return Ok(());
    };

    let payload = match registry.get(&request.op) {
        Some(handler) => {
            let body = request.payload;
            match tokio::task::spawn_blocking(move || handler.call(body)).await {
                Ok(Ok(value)) => value,
                Ok(Err(_err)) => {
                    log_warn!("handler '{}' failed for request {}: {_err}", request.op, request.id);
                    return Ok(());
                }
                Err(_join) => {
                    log_error!("handler '{}' panicked on request {}", request.op, request.id);
                    return Ok(());
                }
            }
        }
        None => {
            log_debug!("no handler for '{}', replying without payload", request.op);
            None
        }
    };

    let response = ResponseMessage {
        id: request.id,
        payload,
    };

    let reply_to = Address::from(request.response_path);
    ctx.transport.send(&reply_to, response.encode()?).await
}
