//! Host environment collaborators.
//!
//! The runtime never reads time, schedules frames, or measures the viewport
//! on its own. It calls into these traits, which the embedding host provides.
//! Deterministic implementations ([`ManualClock`], [`ManualFrameHost`],
//! [`FixedViewport`]) are included for headless use and tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, now: Duration) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// Identifies an outstanding frame request. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// A callback to run on the next frame.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// The host's animation-frame primitive.
///
/// Implementations must invoke callbacks asynchronously, never from inside
/// [`FrameHost::request_frame`] itself, roughly once per display refresh.
pub trait FrameHost: Send + Sync {
    /// Schedule `callback` for the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameToken;

    /// Cancel a pending request. Unknown or already-fired tokens are ignored.
    fn cancel_frame(&self, token: FrameToken);
}

/// A frame host pumped explicitly by the caller.
///
/// Requests queue up until [`ManualFrameHost::run_pending`] fires them.
pub struct ManualFrameHost {
    next_token: AtomicU64,
    pending: Mutex<Vec<(FrameToken, FrameCallback)>>,
}

impl ManualFrameHost {
    /// Create a host with no pending frames.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Fire every callback pending at the time of the call. Requests made by
    /// those callbacks wait for the next call.
    ///
    /// Returns the number of callbacks fired.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.lock());
        let fired = batch.len();
        for (token, callback) in batch {
            trace!(token = token.0, "firing frame");
            callback();
        }
        fired
    }

    /// Returns the number of queued requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for ManualFrameHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualFrameHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualFrameHost")
            .field("next_token", &self.next_token.load(Ordering::Relaxed))
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().push((token, callback));
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.pending.lock().retain(|(pending, _)| *pending != token);
    }
}

/// Reports the size of the host viewport in logical pixels.
pub trait Viewport: Send + Sync {
    /// Current `[width, height]`.
    fn size(&self) -> [u32; 2];
}

/// A viewport whose size is set by the caller.
#[derive(Debug)]
pub struct FixedViewport {
    size: Mutex<[u32; 2]>,
}

impl FixedViewport {
    /// Create a viewport of the given size.
    #[must_use]
    pub fn new(size: [u32; 2]) -> Self {
        Self {
            size: Mutex::new(size),
        }
    }

    /// Change the reported size.
    pub fn set(&self, size: [u32; 2]) {
        *self.size.lock() = size;
    }
}

impl Viewport for FixedViewport {
    fn size(&self) -> [u32; 2] {
        *self.size.lock()
    }
}
