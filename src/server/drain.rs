//! Quiescence barrier for one reader loop.
//!
//! Every dispatch checks in when it is spawned and checks out when its
//! guard is dropped, whether it finished, failed or panicked. The reader
//! loop, once told to stop, waits on [`DrainBarrier::wait_idle`] before
//! handing its listener back, so a rebind never overlaps a dispatch from
//! the previous binding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counts running dispatches and wakes waiters when the count hits zero.
#[derive(Debug, Clone, Default)]
pub(crate) struct DrainBarrier {
    inner: Arc<Inner>,
}

/// Held by a running dispatch; checks out on drop.
#[derive(Debug)]
pub(crate) struct DrainGuard {
    inner: Arc<Inner>,
}

impl DrainBarrier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register one running dispatch.
    pub(crate) fn check_in(&self) -> DrainGuard {
        // ---
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        DrainGuard {
            inner: self.inner.clone(),
        }
    }

    /// Number of dispatches checked in and not yet checked out.
    pub(crate) fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait until every checked-in dispatch has checked out.
    ///
    /// Returns immediately if nothing is running. The caller is expected to
    /// have stopped issuing new check-ins first.
    pub(crate) async fn wait_idle(&self) {
        // ---
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);

            // Register before checking the count so a check-out that lands
            // in between is not missed.
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        // ---
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
