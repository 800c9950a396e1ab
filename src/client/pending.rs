use crate::protocol::CorrelationId;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Payload delivered to a waiting call; `None` is "no value".
pub(super) type Reply = Option<Value>;

/// Tracks pending requests waiting for responses
///
/// Uses a HashMap to map correlation IDs to oneshot channels.
/// When a response arrives, the channel is used to deliver the payload
/// to the waiting future. Dropping a sender (via `remove` or `clear`)
/// wakes the waiting future with a closed-channel error.
#[derive(Debug, Default)]
pub(super) struct PendingRequests {
    // ---
    requests: HashMap<CorrelationId, oneshot::Sender<Reply>>,
}

impl PendingRequests {
    // ---

    /// Create a new empty pending requests tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request
    ///
    /// Returns a receiver that will be notified when the response arrives.
    pub fn register(&mut self, id: CorrelationId) -> oneshot::Receiver<Reply> {
        // ---
        let (tx, rx) = oneshot::channel();
        self.requests.insert(id, tx);
        rx
    }

    /// Complete a pending request with the response payload
    ///
    /// Returns true if the id was found. The entry is removed either way,
    /// so a duplicate response for the same id is reported as unknown.
    pub fn complete(&mut self, id: CorrelationId, reply: Reply) -> bool {
        // ---
        match self.requests.remove(&id) {
            Some(tx) => {
                // The caller may have dropped its future; nothing to do then
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    /// Remove a pending request without delivering a response
    pub fn remove(&mut self, id: CorrelationId) -> bool {
        self.requests.remove(&id).is_some()
    }

    /// Drop every pending request, waking all waiters
    pub fn clear(&mut self) -> usize {
        // ---
        let count = self.requests.len();
        self.requests.clear();
        count
    }

    /// Get the number of pending requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }
}
