//! Behaviours: executable logic bound to a component name.
//!
//! When an object carries a component whose key matches a registered
//! behaviour, the scheduler calls the behaviour instead of looking at the
//! component's own value. The behaviour receives the object itself and the
//! component's current value as `state`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use slaer_component::{ComponentValue, Instance};

/// Per-frame logic keyed by component name.
pub trait Behaviour: Send + Sync {
    /// Update `object` for one frame.
    ///
    /// `state` is the value of the component this behaviour is bound to. It is
    /// written back to the object after the call; while the call runs, the
    /// component's slot in `object` holds `null`.
    fn update(&self, object: &mut Instance, dt: f64, state: &mut ComponentValue);
}

struct FnBehaviour<F>(F);

impl<F> Behaviour for FnBehaviour<F>
where
    F: Fn(&mut Instance, f64, &mut ComponentValue) + Send + Sync,
{
    fn update(&self, object: &mut Instance, dt: f64, state: &mut ComponentValue) {
        (self.0)(object, dt, state);
    }
}

/// A behaviour stamped with the name it was registered under.
pub struct RegisteredBehaviour {
    name: String,
    behaviour: Box<dyn Behaviour>,
}

impl RegisteredBehaviour {
    /// The registration name. Kept for introspection; dispatch goes by the
    /// registry key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the behaviour.
    pub fn update(&self, object: &mut Instance, dt: f64, state: &mut ComponentValue) {
        self.behaviour.update(object, dt, state);
    }
}

impl fmt::Debug for RegisteredBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredBehaviour")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Shared handle to a registered behaviour.
pub type BehaviourRef = Arc<RegisteredBehaviour>;

/// Registry of behaviours keyed by component name.
#[derive(Debug, Default)]
pub struct BehaviourRegistry {
    behaviours: DashMap<String, BehaviourRef>,
}

impl BehaviourRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            behaviours: DashMap::new(),
        }
    }

    /// Register `behaviour` under `name`, replacing any previous one.
    pub fn register<B>(&self, name: impl Into<String>, behaviour: B) -> BehaviourRef
    where
        B: Behaviour + 'static,
    {
        let name = name.into();
        let registered = Arc::new(RegisteredBehaviour {
            name: name.clone(),
            behaviour: Box::new(behaviour),
        });
        if self
            .behaviours
            .insert(name.clone(), Arc::clone(&registered))
            .is_some()
        {
            debug!(behaviour = name, "replaced behaviour");
        } else {
            debug!(behaviour = name, "registered behaviour");
        }
        registered
    }

    /// Register a closure as a behaviour.
    pub fn register_fn<F>(&self, name: impl Into<String>, f: F) -> BehaviourRef
    where
        F: Fn(&mut Instance, f64, &mut ComponentValue) + Send + Sync + 'static,
    {
        self.register(name, FnBehaviour(f))
    }

    /// Returns the behaviour registered under `name`.
    ///
    /// The handle is cloned out so no map guard is held while it runs.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BehaviourRef> {
        self.behaviours.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if a behaviour is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.behaviours.contains_key(name)
    }

    /// Returns every registered behaviour, sorted by name.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, BehaviourRef> {
        self.behaviours
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Returns the number of registered behaviours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviours.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviours.is_empty()
    }

    /// Remove every behaviour.
    pub fn reset(&self) {
        let removed = self.behaviours.len();
        self.behaviours.clear();
        info!(removed, "behaviour registry reset");
    }
}
