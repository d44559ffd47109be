//! Component dispatch: resolves each component of an object to the code that
//! runs for it this frame.
//!
//! Resolution order for a component key:
//!
//! 1. keys starting with `_` are private and skipped;
//! 2. a behaviour registered under the key runs with the **object** as its
//!    receiver and the component value as state;
//! 3. otherwise an inline callable runs with the object's **component map**
//!    as its receiver;
//! 4. otherwise the component is inert data.

use slaer_component::{ComponentValue, InlineFn, Instance, is_private_key};

use crate::behaviour::{BehaviourRef, BehaviourRegistry};

/// What a component resolves to.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// A registered behaviour bound to the component key.
    Behaviour(BehaviourRef),
    /// The component's own inline callable.
    Inline(InlineFn),
    /// Plain data; nothing runs.
    Inert,
}

/// What happened when a component was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A behaviour ran.
    Behaviour,
    /// An inline callable ran.
    Inline,
    /// Plain data, nothing ran.
    Inert,
    /// Private key, or the component no longer exists.
    Skipped,
}

/// Call counts for one object or one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    /// Behaviour invocations.
    pub behaviours: usize,
    /// Inline callable invocations.
    pub inline: usize,
}

impl DispatchCounts {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Behaviour => self.behaviours += 1,
            DispatchOutcome::Inline => self.inline += 1,
            DispatchOutcome::Inert | DispatchOutcome::Skipped => {}
        }
    }

    /// Accumulate another set of counts.
    pub fn add(&mut self, other: DispatchCounts) {
        self.behaviours += other.behaviours;
        self.inline += other.inline;
    }
}

/// Resolve a public component to its dispatch target.
#[must_use]
pub fn resolve(key: &str, value: &ComponentValue, behaviours: &BehaviourRegistry) -> Dispatch {
    if let Some(behaviour) = behaviours.get(key) {
        return Dispatch::Behaviour(behaviour);
    }
    match value {
        ComponentValue::Inline(f) => Dispatch::Inline(f.clone()),
        ComponentValue::Data(_) => Dispatch::Inert,
    }
}

/// Dispatch a single component of `object`.
///
/// For behaviours, the component value is moved out of its slot for the
/// duration of the call and written back afterwards, unless the behaviour
/// removed the key.
pub fn dispatch(
    object: &mut Instance,
    key: &str,
    dt: f64,
    behaviours: &BehaviourRegistry,
) -> DispatchOutcome {
    if is_private_key(key) {
        return DispatchOutcome::Skipped;
    }
    let Some(value) = object.components.get(key) else {
        return DispatchOutcome::Skipped;
    };

    match resolve(key, value, behaviours) {
        Dispatch::Behaviour(behaviour) => {
            let mut state = object
                .components
                .get_mut(key)
                .map(std::mem::take)
                .unwrap_or_default();
            behaviour.update(object, dt, &mut state);
            if let Some(slot) = object.components.get_mut(key) {
                *slot = state;
            }
            DispatchOutcome::Behaviour
        }
        Dispatch::Inline(f) => {
            f.call(&mut object.components, dt);
            DispatchOutcome::Inline
        }
        Dispatch::Inert => DispatchOutcome::Inert,
    }
}

/// Dispatch every component of `object` in insertion order.
///
/// The key list is captured up front: components added during this pass run
/// from the next frame on, and components removed before their turn are
/// skipped.
pub fn dispatch_object(
    object: &mut Instance,
    dt: f64,
    behaviours: &BehaviourRegistry,
) -> DispatchCounts {
    let keys: Vec<String> = object.components.keys().cloned().collect();
    let mut counts = DispatchCounts::default();
    for key in &keys {
        counts.record(dispatch(object, key, dt, behaviours));
    }
    counts
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::json;
    use slaer_component::{Components, components_from_json};

    use super::*;

    fn object(value: serde_json::Value) -> Instance {
        Instance::new("o", components_from_json(value).unwrap())
    }

    #[test]
    fn test_behaviour_receives_object_and_state() {
        let behaviours = BehaviourRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        behaviours.register_fn("x", move |object, dt, state| {
            *sink.lock() = Some((object.name.clone(), dt, state.clone()));
        });

        let mut obj = object(json!({"x": {"v": 1}}));
        assert_eq!(
            dispatch(&mut obj, "x", 0.05, &behaviours),
            DispatchOutcome::Behaviour
        );
        let (name, dt, state) = seen.lock().clone().unwrap();
        assert_eq!(name, "o");
        assert!((dt - 0.05).abs() < f64::EPSILON);
        assert_eq!(state.as_data(), Some(&json!({"v": 1})));
    }

    #[test]
    fn test_behaviour_state_mutation_is_written_back() {
        let behaviours = BehaviourRegistry::new();
        behaviours.register_fn("counter", |_, _, state| {
            if let Some(n) = state.as_data_mut() {
                *n = json!(n.as_i64().unwrap_or(0) + 1);
            }
        });
        let mut obj = object(json!({"counter": 0}));
        dispatch(&mut obj, "counter", 0.016, &behaviours);
        dispatch(&mut obj, "counter", 0.016, &behaviours);
        assert_eq!(obj.data("counter"), Some(&json!(2)));
    }

    #[test]
    fn test_behaviour_can_touch_other_components() {
        let behaviours = BehaviourRegistry::new();
        behaviours.register_fn("velocity", |object, dt, state| {
            let v = state.as_data().and_then(|v| v.as_f64()).unwrap_or(0.0);
            if let Some(x) = object.data_mut("x") {
                *x = json!(x.as_f64().unwrap_or(0.0) + v * dt);
            }
        });
        let mut obj = object(json!({"x": 1.0, "velocity": 2.0}));
        dispatch_object(&mut obj, 0.5, &behaviours);
        assert_eq!(obj.data("x"), Some(&json!(2.0)));
    }

    #[test]
    fn test_behaviour_removing_its_key_drops_state() {
        let behaviours = BehaviourRegistry::new();
        behaviours.register_fn("once", |object, _, _| {
            object.remove("once");
        });
        let mut obj = object(json!({"once": true}));
        dispatch(&mut obj, "once", 0.0, &behaviours);
        assert!(!obj.has("once"));
    }

    #[test]
    fn test_inline_receives_component_map() {
        let behaviours = BehaviourRegistry::new();
        let mut obj = object(json!({"hp": 3}));
        obj.set(
            "y",
            ComponentValue::inline(|components: &mut Components, _dt| {
                let hp = components["hp"].clone();
                components.insert("seen_hp".to_string(), hp);
            }),
        );
        assert_eq!(
            dispatch(&mut obj, "y", 0.016, &behaviours),
            DispatchOutcome::Inline
        );
        assert_eq!(obj.data("seen_hp"), Some(&json!(3)));
    }

    #[test]
    fn test_behaviour_takes_precedence_over_inline() {
        let behaviours = BehaviourRegistry::new();
        let inline_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&inline_calls);
        behaviours.register_fn("y", |_, _, _| {});
        let mut obj = object(json!({}));
        obj.set(
            "y",
            ComponentValue::inline(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(
            dispatch(&mut obj, "y", 0.016, &behaviours),
            DispatchOutcome::Behaviour
        );
        assert_eq!(inline_calls.load(Ordering::SeqCst), 0);
        // The inline value survives as the behaviour's state.
        assert!(obj.get("y").is_some_and(ComponentValue::is_inline));
    }

    #[test]
    fn test_private_key_is_never_dispatched() {
        let behaviours = BehaviourRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        behaviours.register_fn("_internal", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut obj = object(json!({"_internal": {"meta": true}}));
        assert_eq!(
            dispatch(&mut obj, "_internal", 0.016, &behaviours),
            DispatchOutcome::Skipped
        );
        assert_eq!(dispatch_object(&mut obj, 0.016, &behaviours), DispatchCounts::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plain_data_is_inert() {
        let behaviours = BehaviourRegistry::new();
        let mut obj = object(json!({"colour": "red"}));
        assert_eq!(
            dispatch(&mut obj, "colour", 0.016, &behaviours),
            DispatchOutcome::Inert
        );
        assert_eq!(dispatch(&mut obj, "missing", 0.016, &behaviours), DispatchOutcome::Skipped);
    }

    #[test]
    fn test_components_added_mid_pass_wait_for_next_pass() {
        let behaviours = BehaviourRegistry::new();
        let spawned_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&spawned_calls);
        behaviours.register_fn("spawned", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        behaviours.register_fn("spawner", |object, _, _| {
            if !object.has("spawned") {
                object.set("spawned", true);
            }
        });

        let mut obj = object(json!({"spawner": null}));
        let counts = dispatch_object(&mut obj, 0.016, &behaviours);
        assert_eq!(counts.behaviours, 1);
        assert_eq!(spawned_calls.load(Ordering::SeqCst), 0);

        let counts = dispatch_object(&mut obj, 0.016, &behaviours);
        assert_eq!(counts.behaviours, 2);
        assert_eq!(spawned_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counts() {
        let behaviours = BehaviourRegistry::new();
        behaviours.register_fn("b", |_, _, _| {});
        let mut obj = object(json!({"b": 1, "data": 2, "_p": 3}));
        obj.set("i", ComponentValue::inline(|_, _| {}));
        let counts = dispatch_object(&mut obj, 0.016, &behaviours);
        assert_eq!(
            counts,
            DispatchCounts {
                behaviours: 1,
                inline: 1
            }
        );
    }
}
