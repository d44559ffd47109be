//! Named-instance registry.
//!
//! A [`Registry`] maps unique names to shared [`Instance`] handles. It is
//! instantiated twice by the runtime: once for templates ([`Templates`]) and
//! once for live objects ([`Objects`]). The store kind only decides the
//! anonymous-name prefix and the label used in logs and errors.
//!
//! Re-registering a name merges (incoming keys win). Cloning extends
//! (source keys win). See [`crate::merge`].

use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use crate::component::Components;
use crate::error::RegistryError;
use crate::instance::{Instance, InstanceRef, NameAllocator};
use crate::merge::{extend, merge};

/// Describes one kind of store.
pub trait StoreKind: Send + Sync + 'static {
    /// Human-readable label (`"template"`, `"object"`).
    const LABEL: &'static str;
    /// Prefix for generated names.
    const ANONYMOUS_PREFIX: &'static str;
}

/// Marker for the template store.
#[derive(Debug)]
pub struct Templates;

impl StoreKind for Templates {
    const LABEL: &'static str = "template";
    const ANONYMOUS_PREFIX: &'static str = "ent#";
}

/// Marker for the live object store.
#[derive(Debug)]
pub struct Objects;

impl StoreKind for Objects {
    const LABEL: &'static str = "object";
    const ANONYMOUS_PREFIX: &'static str = "obj#";
}

#[derive(Debug)]
struct RegistryState {
    /// Instances keyed by name, in registration order.
    instances: IndexMap<String, InstanceRef>,
    /// Generator for unnamed instances.
    anonymous: NameAllocator,
}

impl RegistryState {
    /// Next generated name not already taken by an explicitly named instance.
    fn next_anonymous_name(&mut self) -> String {
        loop {
            let name = self.anonymous.allocate();
            if !self.instances.contains_key(&name) {
                return name;
            }
        }
    }

    fn resolve_name(&mut self, name: Option<&str>) -> Result<String, RegistryError> {
        match name {
            Some(name) => validate_name(name).map(str::to_string),
            None => Ok(self.next_anonymous_name()),
        }
    }
}

/// Registry of named instances for one store kind.
#[derive(Debug)]
pub struct Registry<K: StoreKind> {
    state: RwLock<RegistryState>,
    _kind: PhantomData<K>,
}

impl<K: StoreKind> Registry<K> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                instances: IndexMap::new(),
                anonymous: NameAllocator::new(K::ANONYMOUS_PREFIX),
            }),
            _kind: PhantomData,
        }
    }

    /// Return the instance named `name`, creating it on first reference.
    ///
    /// - `name == None` registers a new instance under a generated name.
    /// - If the name exists and `components` is supplied and differs from the
    ///   stored map, the components are merged in (incoming keys win).
    /// - Identical components are not merged again.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidName`] for empty names, and
    /// [`RegistryError::InstanceBusy`] when the existing instance is locked by
    /// an in-progress update of that same instance.
    pub fn get_or_create(
        &self,
        name: Option<&str>,
        components: Option<Components>,
    ) -> Result<InstanceRef, RegistryError> {
        let mut state = self.state.write();
        let name = state.resolve_name(name)?;

        if let Some(existing) = state.instances.get(&name) {
            if let Some(components) = components {
                let mut instance = existing
                    .try_lock()
                    .ok_or_else(|| RegistryError::InstanceBusy(name.clone()))?;
                if instance.components == components {
                    trace!(store = K::LABEL, name, "components unchanged, skipping merge");
                } else {
                    merge(&mut instance.components, &[&components]);
                    debug!(
                        store = K::LABEL,
                        name,
                        keys = components.len(),
                        "merged components into existing instance"
                    );
                }
            }
            return Ok(Arc::clone(existing));
        }

        let instance = Arc::new(Mutex::new(Instance::new(
            name.clone(),
            components.unwrap_or_default(),
        )));
        state.instances.insert(name.clone(), Arc::clone(&instance));
        debug!(store = K::LABEL, name, "registered instance");
        Ok(instance)
    }

    /// Register a new instance copying `source`'s components, with
    /// `overrides` filling only the keys the source lacks.
    ///
    /// A clone registered under an existing name replaces that instance.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownInstance`] if `source` is not registered,
    /// [`RegistryError::InvalidName`] for an empty `name`, and
    /// [`RegistryError::InstanceBusy`] if the source is mid-update.
    pub fn clone_instance(
        &self,
        source: &str,
        name: Option<&str>,
        overrides: Components,
    ) -> Result<InstanceRef, RegistryError> {
        let mut state = self.state.write();
        let source_ref = state
            .instances
            .get(source)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownInstance {
                store: K::LABEL,
                name: source.to_string(),
            })?;

        let mut components = source_ref
            .try_lock()
            .ok_or_else(|| RegistryError::InstanceBusy(source.to_string()))?
            .components
            .clone();
        extend(&mut components, &[&overrides]);

        let name = state.resolve_name(name)?;
        let instance = Arc::new(Mutex::new(Instance::new(name.clone(), components)));
        if state
            .instances
            .insert(name.clone(), Arc::clone(&instance))
            .is_some()
        {
            debug!(store = K::LABEL, name, source, "clone replaced existing instance");
        } else {
            debug!(store = K::LABEL, name, source, "cloned instance");
        }
        Ok(instance)
    }

    /// Returns the instance registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<InstanceRef> {
        self.state.read().instances.get(name).cloned()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().instances.contains_key(name)
    }

    /// Returns all registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.state.read().instances.keys().cloned().collect()
    }

    /// Returns the instance handles in registration order.
    ///
    /// The snapshot is detached from the registry: instances registered or
    /// removed afterwards do not affect it.
    #[must_use]
    pub fn snapshot(&self) -> Vec<InstanceRef> {
        self.state.read().instances.values().cloned().collect()
    }

    /// Returns a copy of the name → instance map.
    #[must_use]
    pub fn all(&self) -> IndexMap<String, InstanceRef> {
        self.state.read().instances.clone()
    }

    /// Returns the number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().instances.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().instances.is_empty()
    }

    /// Remove every instance. Anonymous-name counters keep counting.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let removed = state.instances.len();
        state.instances.clear();
        info!(store = K::LABEL, removed, "registry reset");
    }
}

impl<K: StoreKind> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<&str, RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::component::{ComponentValue, components_from_json};

    fn comps(value: serde_json::Value) -> Components {
        components_from_json(value).unwrap()
    }

    #[test]
    fn test_create_named_instance() {
        let registry: Registry<Objects> = Registry::new();
        let inst = registry
            .get_or_create(Some("ship"), Some(comps(json!({"hp": 3}))))
            .unwrap();
        assert_eq!(inst.lock().name, "ship");
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("ship"));
    }

    #[test]
    fn test_anonymous_names_are_distinct_and_monotonic() {
        let registry: Registry<Templates> = Registry::new();
        let names: Vec<String> = (0..4)
            .map(|_| registry.get_or_create(None, None).unwrap().lock().name.clone())
            .collect();
        assert_eq!(names, vec!["ent#0", "ent#1", "ent#2", "ent#3"]);
    }

    #[test]
    fn test_anonymous_counters_are_per_store() {
        let templates: Registry<Templates> = Registry::new();
        let objects: Registry<Objects> = Registry::new();
        templates.get_or_create(None, None).unwrap();
        templates.get_or_create(None, None).unwrap();
        let obj = objects.get_or_create(None, None).unwrap();
        assert_eq!(obj.lock().name, "obj#0");
    }

    #[test]
    fn test_anonymous_name_skips_taken_name() {
        let registry: Registry<Objects> = Registry::new();
        registry.get_or_create(Some("obj#0"), None).unwrap();
        let anon = registry.get_or_create(None, None).unwrap();
        assert_eq!(anon.lock().name, "obj#1");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregistering_merges_incoming_wins() {
        let registry: Registry<Objects> = Registry::new();
        let first = registry
            .get_or_create(Some("o"), Some(comps(json!({"a": 1, "keep": true}))))
            .unwrap();
        let second = registry
            .get_or_create(Some("o"), Some(comps(json!({"a": 2}))))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let inst = second.lock();
        assert_eq!(inst.data("a"), Some(&json!(2)));
        assert_eq!(inst.data("keep"), Some(&json!(true)));
    }

    #[test]
    fn test_reregistering_identical_components_is_idempotent() {
        let registry: Registry<Objects> = Registry::new();
        let data = comps(json!({"a": 1}));
        let first = registry
            .get_or_create(Some("o"), Some(data.clone()))
            .unwrap();
        let second = registry.get_or_create(Some("o"), Some(data)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.lock().components.len(), 1);
    }

    #[test]
    fn test_lookup_without_components_returns_existing() {
        let registry: Registry<Objects> = Registry::new();
        let first = registry
            .get_or_create(Some("o"), Some(comps(json!({"a": 1}))))
            .unwrap();
        let again = registry.get_or_create(Some("o"), None).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.lock().data("a"), Some(&json!(1)));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry: Registry<Objects> = Registry::new();
        assert_eq!(
            registry.get_or_create(Some("  "), None).unwrap_err(),
            RegistryError::InvalidName("  ".to_string())
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_merge_into_locked_instance_is_busy() {
        let registry: Registry<Objects> = Registry::new();
        let inst = registry.get_or_create(Some("o"), None).unwrap();
        let _guard = inst.lock();
        let err = registry
            .get_or_create(Some("o"), Some(comps(json!({"a": 1}))))
            .unwrap_err();
        assert_eq!(err, RegistryError::InstanceBusy("o".to_string()));
    }

    #[test]
    fn test_clone_extends_source_wins() {
        let registry: Registry<Objects> = Registry::new();
        registry
            .get_or_create(Some("base"), Some(comps(json!({"a": 1}))))
            .unwrap();
        let copy = registry
            .clone_instance("base", Some("copy"), comps(json!({"a": 2, "b": 3})))
            .unwrap();
        let copy = copy.lock();
        assert_eq!(copy.data("a"), Some(&json!(1)));
        assert_eq!(copy.data("b"), Some(&json!(3)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clone_is_independent_of_source() {
        let registry: Registry<Objects> = Registry::new();
        let base = registry
            .get_or_create(Some("base"), Some(comps(json!({"a": 1}))))
            .unwrap();
        let copy = registry
            .clone_instance("base", None, Components::new())
            .unwrap();
        copy.lock().set("a", ComponentValue::from(9i64));
        assert_eq!(base.lock().data("a"), Some(&json!(1)));
        assert_eq!(copy.lock().name, "obj#0");
    }

    #[test]
    fn test_clone_unknown_source() {
        let registry: Registry<Templates> = Registry::new();
        let err = registry
            .clone_instance("ghost", None, Components::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownInstance { store: "template", .. }
        ));
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let registry: Registry<Objects> = Registry::new();
        for name in ["c", "a", "b"] {
            registry.get_or_create(Some(name), None).unwrap();
        }
        let order: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|inst| inst.lock().name.clone())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(registry.names(), order);
    }

    #[test]
    fn test_reset_clears_but_keeps_counter() {
        let registry: Registry<Objects> = Registry::new();
        registry.get_or_create(None, None).unwrap();
        registry.reset();
        assert!(registry.is_empty());
        assert!(registry.all().is_empty());
        let next = registry.get_or_create(None, None).unwrap();
        assert_eq!(next.lock().name, "obj#1");
    }
}
