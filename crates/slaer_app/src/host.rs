//! Tokio-backed frame host.
//!
//! Each frame request becomes a task that sleeps for one frame interval and
//! then runs the callback. Cancellation aborts the task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

use slaer_runtime::{FrameCallback, FrameHost, FrameToken};

/// Frame host that paces callbacks on a tokio runtime.
#[derive(Debug)]
pub struct TokioFrameHost {
    handle: Handle,
    interval: Duration,
    next_token: AtomicU64,
    pending: Arc<DashMap<FrameToken, AbortHandle>>,
}

impl TokioFrameHost {
    /// Create a host firing at `frame_rate` frames per second on the current
    /// tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(frame_rate: f64) -> Self {
        Self::with_handle(Handle::current(), frame_rate)
    }

    /// Create a host on an explicit runtime handle.
    #[must_use]
    pub fn with_handle(handle: Handle, frame_rate: f64) -> Self {
        Self {
            handle,
            interval: Duration::from_secs_f64(1.0 / frame_rate.max(1.0)),
            next_token: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Returns the delay between a request and its callback.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the number of requests not yet fired or cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl FrameHost for TokioFrameHost {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let interval = self.interval;
        let pending = Arc::clone(&self.pending);

        let task = self.handle.spawn(async move {
            tokio::time::sleep(interval).await;
            pending.remove(&token);
            callback();
        });
        self.pending.insert(token, task.abort_handle());
        if task.is_finished() {
            self.pending.remove(&token);
        }
        trace!(token = token.0, "frame requested");
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        if let Some((_, task)) = self.pending.remove(&token) {
            task.abort();
            trace!(token = token.0, "frame cancelled");
        }
    }
}
