use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation ID for matching requests to responses
///
/// A per-client sequence number. Transports give no ordering guarantee, so
/// this number is the only thing that ties a response to its caller.
///
/// # Format
///
/// A bare JSON number on the wire: `{"id": 7, ...}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    // ---

    /// Get the raw sequence number
    pub fn get(self) -> u64 {
        // ---
        self.0
    }
}

impl fmt::Display for CorrelationId {
    // ---

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    // ---

    fn from(id: u64) -> Self {
        // ---
        Self(id)
    }
}

/// Hands out correlation IDs for one client.
///
/// Starts at 0 and never reuses a value for the lifetime of the allocator.
/// Wrapping after 2^64 requests is not a practical concern.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    // ---

    /// Create an allocator whose first ID is 0
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Take the next ID
    pub fn next_id(&self) -> CorrelationId {
        // ---
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sequential_from_zero() {
        // ---
        let ids = IdAllocator::new();
        assert_eq!(ids.next_id().get(), 0);
        assert_eq!(ids.next_id().get(), 1);
        assert_eq!(ids.next_id().get(), 2);
    }

    #[test]
    fn test_unique_across_threads() {
        // ---
        let ids = Arc::new(IdAllocator::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_wire_format() {
        // ---
        let id = CorrelationId::from(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(id.to_string(), "42");
    }
}
