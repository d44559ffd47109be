//! # slaer_runtime
//!
//! The behaviour side of the slaer runtime. A [`Context`] holds the template
//! store, the live object store, and the behaviour registry; a [`Scheduler`]
//! dispatches every component of every live object once per host frame; a
//! [`Runtime`] wraps both behind the application-facing API.
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use slaer_component::components_from_json;
//! use slaer_runtime::{ManualFrameHost, Runtime};
//!
//! let host = Arc::new(ManualFrameHost::new());
//! let runtime = Runtime::builder().with_frame_host(host.clone()).build().unwrap();
//!
//! runtime.behaviour("spin", |_object, dt, state| {
//!     if let Some(angle) = state.as_data_mut() {
//!         *angle = json!(angle.as_f64().unwrap_or(0.0) + dt);
//!     }
//! });
//! let template = runtime
//!     .entity(Some("wheel"), Some(components_from_json(json!({"spin": 0.0})).unwrap()))
//!     .unwrap();
//! runtime.create(&template, None, None).unwrap();
//!
//! runtime.loaded();
//! assert!(runtime.is_running());
//! host.run_pending();
//! runtime.stop();
//! ```

pub mod behaviour;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod runtime;
pub mod scheduler;
pub mod surface;

pub use behaviour::{Behaviour, BehaviourRef, BehaviourRegistry, RegisteredBehaviour};
pub use config::{AUTORUN, Settings};
pub use context::Context;
pub use dispatch::{Dispatch, DispatchCounts, DispatchOutcome};
pub use error::RuntimeError;
pub use host::{
    Clock, FixedViewport, FrameCallback, FrameHost, FrameToken, ManualClock, ManualFrameHost,
    SystemClock, Viewport,
};
pub use runtime::{Runtime, RuntimeBuilder};
pub use scheduler::{FrameReport, LoopState, MAX_FRAME_DELTA, Scheduler, SchedulerConfig};
pub use surface::{Resolution, Surface, SurfaceOptions, SurfaceRef, SurfaceRegistry};
