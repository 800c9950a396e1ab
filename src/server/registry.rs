//! Handler registry: operation name to [`Handler`].
//!
//! A registry is built by the hosting application and handed to a server
//! with [`RpcServer::bind`](crate::RpcServer::bind). Binding shares the
//! registry by `Arc`; rebinding swaps in a different `Arc` and never touches
//! the old registry's contents.
//!
//! Lookups take a shared lock and clone the handler out, so invocations
//! never run under the lock. `add` and `remove` take it exclusively.

use super::handler::{Handler, HandlerResult};
use crate::sync_util::{read_ignore_poison, write_ignore_poison};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe table of named operations.
///
/// # Example
///
/// ```
/// use pipe_rpc::Registry;
/// use serde_json::json;
///
/// let registry = Registry::new();
/// registry.add("double", |payload| {
///     let value = payload["value"].as_i64().unwrap_or_default();
///     Ok(Some(json!(value * 2)))
/// });
///
/// let handler = registry.get("double").unwrap();
/// assert_eq!(handler.call(json!({"value": 21})).unwrap(), Some(json!(42)));
/// assert!(registry.get("missing").is_none());
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    // ---
    handlers: RwLock<HashMap<String, Handler>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any previous handler.
    pub fn add<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_handler(name, Handler::new(func));
    }

    /// Register a `serde`-typed function under `name`.
    ///
    /// See [`Handler::typed`].
    pub fn add_typed<F, TReq, TResp>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(TReq) -> Result<TResp> + Send + Sync + 'static,
        TReq: DeserializeOwned,
        TResp: Serialize,
    {
        self.add_handler(name, Handler::typed(func));
    }

    /// Register an already wrapped handler under `name`.
    pub fn add_handler(&self, name: impl Into<String>, handler: Handler) {
        // ---
        let mut handlers = write_ignore_poison(&self.handlers);
        handlers.insert(name.into(), handler);
    }

    /// Remove the handler registered under `name`.
    ///
    /// Returns true if one was present.
    pub fn remove(&self, name: &str) -> bool {
        // ---
        let mut handlers = write_ignore_poison(&self.handlers);
        handlers.remove(name).is_some()
    }

    /// Look up the handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<Handler> {
        // ---
        let handlers = read_ignore_poison(&self.handlers);
        handlers.get(name).cloned()
    }

    /// True if a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        read_ignore_poison(&self.handlers).contains_key(name)
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        read_ignore_poison(&self.handlers).len()
    }

    /// True if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<String> {
        // ---
        let mut names: Vec<String> = read_ignore_poison(&self.handlers).keys().cloned().collect();
        names.sort();
        names
    }
}

impl<S> FromIterator<(S, Handler)> for Registry
where
    S: Into<String>,
{
    /// Build a registry from `(name, handler)` pairs; later duplicates win.
    fn from_iter<I: IntoIterator<Item = (S, Handler)>>(iter: I) -> Self {
        // ---
        let handlers = iter
            .into_iter()
            .map(|(name, handler)| (name.into(), handler))
            .collect();

        Self {
            handlers: RwLock::new(handlers),
        }
    }
}
