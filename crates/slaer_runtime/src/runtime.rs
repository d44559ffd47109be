//! The runtime facade.
//!
//! [`Runtime`] bundles a [`Context`], a [`Scheduler`], the [`Settings`], and
//! the surfaces behind the flat API applications use: `configure`, `config`,
//! `entity`, `entities`, `object`, `objects`, `behaviour`, `behaviours`,
//! `start`, `stop`, `reset`, `surface`.
//!
//! ## Startup Sequence
//!
//! 1. Build with [`RuntimeBuilder`]; a frame host is mandatory.
//! 2. Register templates, objects, and behaviours.
//! 3. Call [`Runtime::loaded`] once the host has finished loading. With
//!    `autorun` set (the default) this starts the scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info};

use slaer_component::{ComponentValue, Components, Instance, InstanceRef};

use crate::behaviour::{Behaviour, BehaviourRef};
use crate::config::Settings;
use crate::context::Context;
use crate::error::RuntimeError;
use crate::host::{Clock, FrameHost, SystemClock, Viewport};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::surface::{SurfaceOptions, SurfaceRef, SurfaceRegistry};

/// Builder for a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    settings: Settings,
    scheduler: SchedulerConfig,
    frame_host: Option<Arc<dyn FrameHost>>,
    clock: Option<Arc<dyn Clock>>,
    viewport: Option<Arc<dyn Viewport>>,
}

impl RuntimeBuilder {
    /// Start a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Use the given scheduler configuration.
    #[must_use]
    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Set the host's animation-frame primitive.
    #[must_use]
    pub fn with_frame_host(mut self, host: Arc<dyn FrameHost>) -> Self {
        self.frame_host = Some(host);
        self
    }

    /// Set the time source. Defaults to [`SystemClock`].
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the viewport used to size surfaces.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Arc<dyn Viewport>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Build the runtime.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::HostUnavailable`] if no frame host was supplied; the
    /// scheduler cannot run without one.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        let host = self
            .frame_host
            .ok_or(RuntimeError::HostUnavailable("animation frame host"))?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let context = Arc::new(Context::new());
        let scheduler = Scheduler::new(Arc::clone(&context), host, clock, self.scheduler);

        debug!(autorun = self.settings.autorun(), "runtime built");
        Ok(Runtime {
            context,
            scheduler,
            settings: RwLock::new(self.settings),
            surfaces: SurfaceRegistry::new(),
            viewport: self.viewport,
        })
    }
}

/// A complete simulation: stores, loop, settings, and surfaces.
pub struct Runtime {
    context: Arc<Context>,
    scheduler: Scheduler,
    settings: RwLock<Settings>,
    surfaces: SurfaceRegistry,
    viewport: Option<Arc<dyn Viewport>>,
}

impl Runtime {
    /// Shorthand for [`RuntimeBuilder::new`].
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    // -- Settings --

    /// Set an option.
    pub fn configure(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.settings.write().configure(name, value);
    }

    /// Returns every option.
    #[must_use]
    pub fn config(&self) -> Map<String, Value> {
        self.settings.read().config().clone()
    }

    /// Returns a single option.
    #[must_use]
    pub fn config_value(&self, name: &str) -> Option<Value> {
        self.settings.read().config_value(name).cloned()
    }

    // -- Stores --

    /// See [`Context::entity`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn entity(
        &self,
        name: Option<&str>,
        components: Option<Components>,
    ) -> Result<InstanceRef, RuntimeError> {
        Ok(self.context.entity(name, components)?)
    }

    /// Returns every template by name.
    #[must_use]
    pub fn entities(&self) -> IndexMap<String, InstanceRef> {
        self.context.entities()
    }

    /// See [`Context::create`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn create(
        &self,
        template: &InstanceRef,
        name: Option<&str>,
        overrides: Option<Components>,
    ) -> Result<InstanceRef, RuntimeError> {
        Ok(self.context.create(template, name, overrides)?)
    }

    /// See [`Context::create_from`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn create_from(
        &self,
        template: &str,
        name: Option<&str>,
        overrides: Option<Components>,
    ) -> Result<InstanceRef, RuntimeError> {
        Ok(self.context.create_from(template, name, overrides)?)
    }

    /// See [`Context::clone_entity`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn clone_entity(
        &self,
        source: &str,
        name: Option<&str>,
        overrides: Components,
    ) -> Result<InstanceRef, RuntimeError> {
        Ok(self.context.clone_entity(source, name, overrides)?)
    }

    /// See [`Context::object`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn object(
        &self,
        name: Option<&str>,
        components: Option<Components>,
    ) -> Result<InstanceRef, RuntimeError> {
        Ok(self.context.object(name, components)?)
    }

    /// Returns every live object by name.
    ///
    /// Inside a behaviour, the handle of the object being updated is already
    /// locked; reach it through the `&mut Instance` argument instead.
    #[must_use]
    pub fn objects(&self) -> IndexMap<String, InstanceRef> {
        self.context.objects()
    }

    /// See [`Context::clone_object`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn clone_object(
        &self,
        source: &str,
        name: Option<&str>,
        overrides: Components,
    ) -> Result<InstanceRef, RuntimeError> {
        Ok(self.context.clone_object(source, name, overrides)?)
    }

    /// Register a closure as the behaviour for component `name`.
    pub fn behaviour<F>(&self, name: impl Into<String>, f: F) -> BehaviourRef
    where
        F: Fn(&mut Instance, f64, &mut ComponentValue) + Send + Sync + 'static,
    {
        self.context.behaviour(name, f)
    }

    /// Register a [`Behaviour`] implementation for component `name`.
    pub fn behaviour_with<B>(&self, name: impl Into<String>, behaviour: B) -> BehaviourRef
    where
        B: Behaviour + 'static,
    {
        self.context.behaviour_with(name, behaviour)
    }

    /// Returns every behaviour by name.
    #[must_use]
    pub fn behaviours(&self) -> BTreeMap<String, BehaviourRef> {
        self.context.behaviours()
    }

    // -- Lifecycle --

    /// Start the frame loop.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stop the frame loop.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Clear templates, objects, and behaviours. Does not stop the loop.
    pub fn reset(&self) {
        self.context.reset();
    }

    /// Host load-completion hook. Starts the loop when `autorun` is set.
    ///
    /// Returns `true` if the loop was started.
    pub fn loaded(&self) -> bool {
        let autorun = self.settings.read().autorun();
        info!(autorun, "host finished loading");
        if autorun {
            self.start();
        }
        autorun
    }

    // -- Surfaces --

    /// Create a surface sized for the current viewport.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::HostUnavailable`] without a viewport, and
    /// [`RuntimeError::UnknownSurfaceResolutionFormat`] for a bad resolution.
    pub fn surface(&self, options: SurfaceOptions) -> Result<SurfaceRef, RuntimeError> {
        let viewport = self
            .viewport
            .as_ref()
            .ok_or(RuntimeError::HostUnavailable("viewport"))?;
        self.surfaces.create(options, viewport.size())
    }

    /// Returns every surface in creation order.
    #[must_use]
    pub fn surfaces(&self) -> Vec<SurfaceRef> {
        self.surfaces.list()
    }

    /// Host viewport-resize hook. Resizes every surface.
    pub fn resized(&self, viewport: [u32; 2]) {
        self.surfaces.resize_all(viewport);
    }

    // -- Parts --

    /// The simulation context.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// The frame scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns `true` while the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("settings", &*self.settings.read())
            .field("surfaces", &self.surfaces.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use slaer_component::components_from_json;

    use super::*;
    use crate::host::{FixedViewport, ManualClock, ManualFrameHost};

    fn runtime(settings: Settings) -> (Runtime, Arc<ManualFrameHost>) {
        let host = Arc::new(ManualFrameHost::new());
        let runtime = Runtime::builder()
            .with_settings(settings)
            .with_frame_host(host.clone())
            .with_clock(Arc::new(ManualClock::new()))
            .with_viewport(Arc::new(FixedViewport::new([640, 480])))
            .build()
            .unwrap();
        (runtime, host)
    }

    #[test]
    fn test_build_without_frame_host_fails() {
        let err = Runtime::builder().build().unwrap_err();
        assert!(matches!(err, RuntimeError::HostUnavailable(_)));
    }

    #[test]
    fn test_loaded_autoruns_by_default() {
        let (runtime, host) = runtime(Settings::default());
        assert!(runtime.loaded());
        assert!(runtime.is_running());
        assert_eq!(host.pending_count(), 1);
    }

    #[test]
    fn test_loaded_respects_autorun_false() {
        let (runtime, host) = runtime(Settings::new().with_autorun(false));
        assert!(!runtime.loaded());
        assert!(!runtime.is_running());
        assert_eq!(host.pending_count(), 0);
    }

    #[test]
    fn test_configure_before_load() {
        let (runtime, _host) = runtime(Settings::default());
        runtime.configure("autorun", false);
        runtime.configure("title", "demo");
        assert_eq!(runtime.config_value("title"), Some(json!("demo")));
        assert_eq!(runtime.config().len(), 2);
        assert!(!runtime.loaded());
    }

    #[test]
    fn test_reset_does_not_stop() {
        let (runtime, host) = runtime(Settings::default());
        let template = runtime
            .entity(Some("T"), Some(components_from_json(json!({"a": 1})).unwrap()))
            .unwrap();
        runtime.create(&template, None, None).unwrap();
        runtime.behaviour("a", |_, _, _| {});
        runtime.start();

        runtime.reset();
        assert!(runtime.objects().is_empty());
        assert!(runtime.entities().is_empty());
        assert!(runtime.behaviours().is_empty());
        assert!(runtime.is_running());

        host.run_pending();
        assert_eq!(runtime.scheduler().frames(), 2);
        runtime.stop();
        assert!(!runtime.is_running());
    }

    #[test]
    fn test_surface_uses_viewport() {
        let (runtime, _host) = runtime(Settings::default());
        let surface = runtime
            .surface(SurfaceOptions {
                resolution: Some(json!("0.5")),
                ..SurfaceOptions::default()
            })
            .unwrap();
        assert_eq!(surface.lock().size(), [320, 240]);
        runtime.resized([1000, 100]);
        assert_eq!(surface.lock().size(), [500, 50]);
        assert_eq!(runtime.surfaces().len(), 1);
    }

    #[test]
    fn test_surface_without_viewport_fails() {
        let runtime = Runtime::builder()
            .with_frame_host(Arc::new(ManualFrameHost::new()))
            .build()
            .unwrap();
        assert!(matches!(
            runtime.surface(SurfaceOptions::default()),
            Err(RuntimeError::HostUnavailable("viewport"))
        ));
    }

    #[test]
    fn test_clone_and_create_from_forward_to_stores() {
        let (runtime, _host) = runtime(Settings::default());
        runtime
            .entity(Some("T"), Some(components_from_json(json!({"a": 1})).unwrap()))
            .unwrap();
        let derived = runtime
            .clone_entity("T", Some("T2"), components_from_json(json!({"b": 2})).unwrap())
            .unwrap();
        assert_eq!(derived.lock().data("a"), Some(&json!(1)));
        assert_eq!(runtime.entities().len(), 2);

        let object = runtime.create_from("T2", Some("o"), None).unwrap();
        assert_eq!(object.lock().data("b"), Some(&json!(2)));
        let copy = runtime
            .clone_object("o", None, components_from_json(json!({"a": 9, "c": 3})).unwrap())
            .unwrap();
        assert_eq!(copy.lock().data("a"), Some(&json!(1)));
        assert_eq!(copy.lock().data("c"), Some(&json!(3)));
        assert_eq!(copy.lock().name, "obj#0");

        assert!(matches!(
            runtime.clone_object("missing", None, Components::new()),
            Err(RuntimeError::Registry(_))
        ));
    }

    #[test]
    fn test_invalid_name_surfaces_as_runtime_error() {
        let (runtime, _host) = runtime(Settings::default());
        assert!(matches!(
            runtime.object(Some(""), None),
            Err(RuntimeError::Registry(_))
        ));
    }
}
