//! Named instances and anonymous name allocation.
//!
//! An [`Instance`] is a name plus a component map. The same type backs both
//! templates and live objects; which store holds it decides how it is used.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::component::{ComponentValue, Components};

/// A shared handle to an instance held by a registry.
pub type InstanceRef = Arc<Mutex<Instance>>;

/// A named set of components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    /// Unique key within the owning store.
    pub name: String,
    /// Component values in insertion order.
    pub components: Components,
}

impl Instance {
    /// Create an instance from a name and its components.
    #[must_use]
    pub fn new(name: impl Into<String>, components: Components) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }

    /// Returns the component stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ComponentValue> {
        self.components.get(key)
    }

    /// Returns the component stored under `key` mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ComponentValue> {
        self.components.get_mut(key)
    }

    /// Returns the data payload of the component under `key`.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.components.get(key).and_then(ComponentValue::as_data)
    }

    /// Returns the data payload of the component under `key` mutably.
    pub fn data_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.components
            .get_mut(key)
            .and_then(ComponentValue::as_data_mut)
    }

    /// Set a component, returning the previous value. New keys go last.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ComponentValue>,
    ) -> Option<ComponentValue> {
        self.components.insert(key.into(), value.into())
    }

    /// Remove a component, keeping the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<ComponentValue> {
        self.components.shift_remove(key)
    }

    /// Returns `true` if the instance has a component under `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.components.contains_key(key)
    }
}

/// Produces `<prefix><n>` names from a monotonically increasing counter.
///
/// Each store owns one allocator, so counters are independent per store.
/// Counting starts at 0 and never rewinds, including across store resets.
#[derive(Debug)]
pub struct NameAllocator {
    prefix: &'static str,
    next: u64,
}

impl NameAllocator {
    /// Creates an allocator producing names with the given prefix.
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 0 }
    }

    /// Allocates the next name.
    pub fn allocate(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }

    /// Returns the number of names allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        self.prefix
    }
}
