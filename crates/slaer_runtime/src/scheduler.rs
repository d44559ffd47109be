//! Frame scheduler.
//!
//! Drives the simulation one frame at a time:
//!
//! 1. Compute the frame delta from the host clock, clamped to
//!    [`SchedulerConfig::max_frame_delta`].
//! 2. Dispatch every component of every live object (see [`crate::dispatch`]).
//! 3. Request the next frame from the host, keeping its cancellation token.
//!
//! The scheduler has two states, [`LoopState::Stopped`] and
//! [`LoopState::Running`]. Stopping is cooperative: it cancels the outstanding
//! host request and bumps a run generation that every frame checks before
//! dispatching and before rescheduling. A frame already in progress always
//! finishes.
//!
//! Objects are snapshotted at the start of each frame, so objects created
//! during a frame are first visited on the next one, and objects removed
//! during a frame are still visited in it.
//!
//! Lifecycle calls made from inside a frame never re-enter dispatch for the
//! object being updated. An object whose lock cannot be taken within the
//! frame budget is skipped for that frame, and a `start()` issued while a
//! frame is dispatching requests its first frame from the host instead of
//! running it inline.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::context::Context;
use crate::dispatch::{DispatchCounts, dispatch_object};
use crate::host::{Clock, FrameHost, FrameToken};

/// Upper bound on the frame delta, in seconds.
pub const MAX_FRAME_DELTA: f64 = 0.1;

/// Frame time budget at 60 Hz.
pub const FRAME_BUDGET: Duration = Duration::from_micros(16_667);

/// Configuration for the frame scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Largest delta, in seconds, ever passed to behaviours.
    pub max_frame_delta: f64,
    /// Dispatch time above which a frame is reported as over budget.
    pub frame_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_frame_delta: MAX_FRAME_DELTA,
            frame_budget: FRAME_BUDGET,
        }
    }
}

/// Scheduler run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No frame is pending.
    Stopped,
    /// A frame is pending or executing.
    Running,
}

/// Summary of one dispatched frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Delta passed to behaviours, in seconds.
    pub dt: f64,
    /// Objects visited.
    pub objects: usize,
    /// Calls made.
    pub calls: DispatchCounts,
    /// Objects skipped because they stayed locked elsewhere.
    pub busy: usize,
}

/// Seconds between two clock readings, clamped to `[0, max]`.
#[must_use]
pub fn frame_delta(previous: Duration, now: Duration, max: f64) -> f64 {
    now.saturating_sub(previous).as_secs_f64().min(max)
}

#[derive(Debug)]
struct RunState {
    state: LoopState,
    /// Incremented on every start/stop; frames from older runs are ignored.
    generation: u64,
    /// Clock reading at the previous frame.
    previous: Duration,
    /// Outstanding host request.
    token: Option<FrameToken>,
    /// Frames dispatched since construction.
    frames: u64,
    last_report: Option<FrameReport>,
    /// Frames currently dispatching, counting nested ticks.
    depth: usize,
}

struct SchedulerInner {
    context: Arc<Context>,
    host: Arc<dyn FrameHost>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    run: Mutex<RunState>,
}

/// The frame loop. Cheap to clone; clones drive the same loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a stopped scheduler over `context`.
    #[must_use]
    pub fn new(
        context: Arc<Context>,
        host: Arc<dyn FrameHost>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                context,
                host,
                clock,
                config,
                run: Mutex::new(RunState {
                    state: LoopState::Stopped,
                    generation: 0,
                    previous: Duration::ZERO,
                    token: None,
                    frames: 0,
                    last_report: None,
                    depth: 0,
                }),
            }),
        }
    }

    /// Start the loop.
    ///
    /// The first frame runs immediately with a zero delta; later frames are
    /// requested from the host. Called while a frame is dispatching, the
    /// first frame is requested from the host too. Starting a running
    /// scheduler does nothing.
    pub fn start(&self) {
        let (generation, nested) = {
            let mut run = self.inner.run.lock();
            if run.state == LoopState::Running {
                warn!(generation = run.generation, "scheduler already running");
                return;
            }
            run.state = LoopState::Running;
            run.generation += 1;
            run.previous = self.inner.clock.now();
            (run.generation, run.depth > 0)
        };
        info!(generation, nested, "scheduler started");
        if nested {
            self.inner.reschedule(generation);
        } else {
            self.inner.frame(generation);
        }
    }

    /// Stop the loop, cancelling the pending frame. Safe to call when stopped.
    pub fn stop(&self) {
        let (token, was_running, frames) = {
            let mut run = self.inner.run.lock();
            let was_running = run.state == LoopState::Running;
            run.state = LoopState::Stopped;
            if was_running {
                run.generation += 1;
            }
            (run.token.take(), was_running, run.frames)
        };
        if let Some(token) = token {
            self.inner.host.cancel_frame(token);
        }
        if was_running {
            info!(frames, "scheduler stopped");
        } else {
            debug!("stop requested while already stopped");
        }
    }

    /// Dispatch one frame with an explicit delta, independent of the run
    /// state and the host. Useful for fixed-step and headless stepping.
    pub fn tick(&self, dt: f64) -> FrameReport {
        let report = self.inner.dispatch_frame(dt);
        self.inner.record(report);
        report
    }

    /// Returns the current run state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.inner.run.lock().state
    }

    /// Returns `true` while the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Returns the number of frames dispatched so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.inner.run.lock().frames
    }

    /// Returns the report of the most recent frame.
    #[must_use]
    pub fn last_report(&self) -> Option<FrameReport> {
        self.inner.run.lock().last_report
    }

    /// Returns the context this scheduler drives.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.inner.context
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("run", &*self.inner.run.lock())
            .finish_non_exhaustive()
    }
}

impl SchedulerInner {
    /// Body of one host frame for run `generation`.
    fn frame(self: &Arc<Self>, generation: u64) {
        let dt = {
            let mut run = self.run.lock();
            if run.state != LoopState::Running || run.generation != generation {
                trace!(generation, "stale frame ignored");
                return;
            }
            run.token = None;
            let now = self.clock.now();
            let dt = frame_delta(run.previous, now, self.config.max_frame_delta);
            run.previous = now;
            dt
        };

        let report = self.dispatch_frame(dt);
        self.record(report);
        self.reschedule(generation);
    }

    fn reschedule(self: &Arc<Self>, generation: u64) {
        if !self.is_current(generation) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let token = self.host.request_frame(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.frame(generation);
            }
        }));

        let mut run = self.run.lock();
        if run.state == LoopState::Running && run.generation == generation {
            run.token = Some(token);
        } else {
            // Stopped while the request was being made.
            drop(run);
            self.host.cancel_frame(token);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let run = self.run.lock();
        run.state == LoopState::Running && run.generation == generation
    }

    fn dispatch_frame(&self, dt: f64) -> FrameReport {
        let _frame = self.context.frame_guard();
        self.run.lock().depth += 1;

        let started = Instant::now();
        let objects = self.context.object_store().snapshot();
        let behaviours = self.context.behaviour_registry();

        let mut calls = DispatchCounts::default();
        let mut busy = 0;
        for object in &objects {
            // The lock is already ours when a behaviour re-enters the frame.
            let Some(mut object) = object.try_lock_for(self.config.frame_budget) else {
                busy += 1;
                continue;
            };
            calls.add(dispatch_object(&mut object, dt, behaviours));
        }
        self.run.lock().depth -= 1;

        if busy > 0 {
            warn!(busy, "skipped objects locked for the whole frame budget");
        }
        let elapsed = started.elapsed();
        if elapsed > self.config.frame_budget {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.frame_budget.as_millis() as u64,
                objects = objects.len(),
                "frame exceeded time budget"
            );
        }

        debug!(
            dt,
            objects = objects.len(),
            behaviour_calls = calls.behaviours,
            inline_calls = calls.inline,
            "frame dispatched"
        );

        FrameReport {
            dt,
            objects: objects.len() - busy,
            calls,
            busy,
        }
    }

    fn record(&self, report: FrameReport) {
        let mut run = self.run.lock();
        run.frames += 1;
        run.last_report = Some(report);
    }
}
