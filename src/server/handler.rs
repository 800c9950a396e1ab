use crate::{Result, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Outcome of one handler invocation.
///
/// - `Ok(Some(doc))`: respond with `doc` as the payload
/// - `Ok(None)`: respond with no payload ("no value")
/// - `Err(_)`: send nothing; the caller's pending call stays unresolved
pub type HandlerResult = Result<Option<Value>>;

type HandlerFn = dyn Fn(Value) -> HandlerResult + Send + Sync;

/// A registered operation.
///
/// Handlers are synchronous. The server runs each invocation on the
/// blocking thread pool, so a handler may take its time, but it must
/// eventually return: a rebind waits for every running handler.
///
/// Wrapped in Arc for cheap cloning out of the registry.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap a function over raw documents.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    /// Wrap a function over `serde` types.
    ///
    /// The payload is deserialized into `TReq` and the returned `TResp` is
    /// serialized back into a document. A payload that does not fit `TReq`
    /// is a handler error, so no response is sent for it.
    pub fn typed<F, TReq, TResp>(func: F) -> Self
    where
        F: Fn(TReq) -> Result<TResp> + Send + Sync + 'static,
        TReq: DeserializeOwned,
        TResp: Serialize,
    {
        // ---
        Self::new(move |payload: Value| {
            let req: TReq = serde_json::from_value(payload)
                .map_err(|err| RpcError::Handler(format!("bad payload: {err}")))?;
            let resp = func(req)?;
            Ok(Some(serde_json::to_value(resp)?))
        })
    }

    /// Invoke the handler.
    pub fn call(&self, payload: Value) -> HandlerResult {
        (self.0)(payload)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}
