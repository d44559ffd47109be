//! Simulation context: the template store, the object store, and the
//! behaviour registry.
//!
//! A [`Context`] owns all three stores. The scheduler holds it behind an
//! `Arc`, so several independent simulations can run side by side and tests
//! never share state.
//!
//! Frames and [`Context::reset`] are serialised by a reentrant frame guard: a
//! reset from another thread waits for the running frame to finish, while a
//! reset issued by a behaviour inside the frame proceeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::info;

use slaer_component::{
    ComponentValue, Components, Instance, InstanceRef, Objects, Registry, RegistryError,
    Templates, extend,
};

use crate::behaviour::{Behaviour, BehaviourRef, BehaviourRegistry};

/// The three stores of one simulation.
#[derive(Debug, Default)]
pub struct Context {
    templates: Registry<Templates>,
    objects: Registry<Objects>,
    behaviours: BehaviourRegistry,
    frame: ReentrantMutex<()>,
}

impl Context {
    /// Create a context with empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Templates --

    /// Return the template named `name`, creating it on first reference.
    ///
    /// # Errors
    ///
    /// See [`Registry::get_or_create`].
    pub fn entity(
        &self,
        name: Option<&str>,
        components: Option<Components>,
    ) -> Result<InstanceRef, RegistryError> {
        self.templates.get_or_create(name, components)
    }

    /// Returns every template by name.
    #[must_use]
    pub fn entities(&self) -> IndexMap<String, InstanceRef> {
        self.templates.all()
    }

    /// Derive a new template from an existing one. The source's values win.
    ///
    /// # Errors
    ///
    /// See [`Registry::clone_instance`].
    pub fn clone_entity(
        &self,
        source: &str,
        name: Option<&str>,
        overrides: Components,
    ) -> Result<InstanceRef, RegistryError> {
        self.templates.clone_instance(source, name, overrides)
    }

    /// Create an object from `template`.
    ///
    /// The template's components are copied and `overrides` only fill keys
    /// the template lacks. The result is registered through
    /// [`Context::object`], so creating under an existing object name merges
    /// into that object.
    ///
    /// # Errors
    ///
    /// See [`Registry::get_or_create`].
    pub fn create(
        &self,
        template: &InstanceRef,
        name: Option<&str>,
        overrides: Option<Components>,
    ) -> Result<InstanceRef, RegistryError> {
        let mut components = template
            .try_lock()
            .ok_or_else(|| RegistryError::InstanceBusy(self.name_of(template)))?
            .components
            .clone();
        if let Some(overrides) = overrides {
            extend(&mut components, &[&overrides]);
        }
        self.objects.get_or_create(name, Some(components))
    }

    /// Create an object from the template registered as `template`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownInstance`] if no such template exists, plus the
    /// errors of [`Context::create`].
    pub fn create_from(
        &self,
        template: &str,
        name: Option<&str>,
        overrides: Option<Components>,
    ) -> Result<InstanceRef, RegistryError> {
        let template_ref =
            self.templates
                .get(template)
                .ok_or_else(|| RegistryError::UnknownInstance {
                    store: "template",
                    name: template.to_string(),
                })?;
        self.create(&template_ref, name, overrides)
    }

    /// Registered name of `instance` in either store, for error reporting
    /// when the instance itself cannot be locked.
    fn name_of(&self, instance: &InstanceRef) -> String {
        self.templates
            .all()
            .into_iter()
            .chain(self.objects.all())
            .find(|(_, candidate)| Arc::ptr_eq(candidate, instance))
            .map_or_else(|| "<unregistered>".to_string(), |(name, _)| name)
    }

    // -- Objects --

    /// Return the object named `name`, creating it on first reference.
    /// Supplied components overwrite existing keys.
    ///
    /// # Errors
    ///
    /// See [`Registry::get_or_create`].
    pub fn object(
        &self,
        name: Option<&str>,
        components: Option<Components>,
    ) -> Result<InstanceRef, RegistryError> {
        self.objects.get_or_create(name, components)
    }

    /// Returns every live object by name.
    ///
    /// Inside a behaviour, the handle of the object being updated is already
    /// locked; reach it through the `&mut Instance` argument instead.
    #[must_use]
    pub fn objects(&self) -> IndexMap<String, InstanceRef> {
        self.objects.all()
    }

    /// Copy an existing object under a new name. The source's values win.
    ///
    /// # Errors
    ///
    /// See [`Registry::clone_instance`].
    pub fn clone_object(
        &self,
        source: &str,
        name: Option<&str>,
        overrides: Components,
    ) -> Result<InstanceRef, RegistryError> {
        self.objects.clone_instance(source, name, overrides)
    }

    // -- Behaviours --

    /// Register a closure as the behaviour for component `name`.
    pub fn behaviour<F>(&self, name: impl Into<String>, f: F) -> BehaviourRef
    where
        F: Fn(&mut Instance, f64, &mut ComponentValue) + Send + Sync + 'static,
    {
        self.behaviours.register_fn(name, f)
    }

    /// Register a [`Behaviour`] implementation for component `name`.
    pub fn behaviour_with<B>(&self, name: impl Into<String>, behaviour: B) -> BehaviourRef
    where
        B: Behaviour + 'static,
    {
        self.behaviours.register(name, behaviour)
    }

    /// Returns every behaviour by name.
    #[must_use]
    pub fn behaviours(&self) -> BTreeMap<String, BehaviourRef> {
        self.behaviours.list()
    }

    // -- Stores --

    /// The template store.
    #[must_use]
    pub fn template_store(&self) -> &Registry<Templates> {
        &self.templates
    }

    /// The live object store.
    #[must_use]
    pub fn object_store(&self) -> &Registry<Objects> {
        &self.objects
    }

    /// The behaviour registry.
    #[must_use]
    pub fn behaviour_registry(&self) -> &BehaviourRegistry {
        &self.behaviours
    }

    /// Hold off [`Context::reset`] on other threads until the guard drops.
    /// The scheduler holds this for the whole of each frame.
    pub fn frame_guard(&self) -> ReentrantMutexGuard<'_, ()> {
        self.frame.lock()
    }

    /// Clear objects, templates, and behaviours.
    ///
    /// Waits for a frame running on another thread to finish. A running
    /// scheduler keeps running and dispatches empty frames.
    pub fn reset(&self) {
        let _frame = self.frame_guard();
        self.objects.reset();
        self.templates.reset();
        self.behaviours.reset();
        info!("context reset");
    }
}
