//! Component values attached to templates and objects.
//!
//! A component is either plain data ([`ComponentValue::Data`], stored as a
//! `serde_json::Value` so records and primitives share one representation) or
//! an executable unit ([`ComponentValue::Inline`]) that the scheduler calls
//! once per frame with the owning object's component map.
//!
//! Whether a data component is *behaviour-backed* is not recorded here: the
//! scheduler decides that at dispatch time by looking the component key up in
//! the behaviour registry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ComponentError;

/// Component key prefix reserved for private metadata. Keys starting with it
/// are never dispatched.
pub const PRIVATE_PREFIX: char = '_';

/// An instance's components, keyed by component name, in insertion order.
pub type Components = IndexMap<String, ComponentValue>;

/// Returns `true` if `key` names a private component.
#[must_use]
pub fn is_private_key(key: &str) -> bool {
    key.starts_with(PRIVATE_PREFIX)
}

/// An inline per-frame callable.
///
/// The callable receives the owning object's component map and the frame
/// delta in seconds. Clones share the same underlying closure, and equality is
/// pointer identity.
#[derive(Clone)]
pub struct InlineFn(Arc<dyn Fn(&mut Components, f64) + Send + Sync>);

impl InlineFn {
    /// Wrap a closure as an inline component.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Components, f64) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the callable.
    pub fn call(&self, components: &mut Components, dt: f64) {
        (self.0)(components, dt);
    }

    /// Returns `true` if both handles point at the same closure.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for InlineFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InlineFn({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for InlineFn {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// The value stored under a component key.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    /// Plain data. Inert unless a behaviour is registered under its key.
    Data(Value),
    /// An inline callable invoked every frame.
    Inline(InlineFn),
}

impl ComponentValue {
    /// Build an inline component from a closure.
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&mut Components, f64) + Send + Sync + 'static,
    {
        Self::Inline(InlineFn::new(f))
    }

    /// Serialise any `serde` value into a data component.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Json`] if serialisation fails.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, ComponentError> {
        Ok(Self::Data(serde_json::to_value(value)?))
    }

    /// Deserialise the data payload into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotData`] for inline components and
    /// [`ComponentError::Json`] if the payload does not match `T`.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, ComponentError> {
        match self {
            Self::Data(value) => Ok(T::deserialize(value)?),
            Self::Inline(_) => Err(ComponentError::NotData),
        }
    }

    /// Returns the data payload, if this is a data component.
    #[must_use]
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Inline(_) => None,
        }
    }

    /// Returns the data payload mutably, if this is a data component.
    pub fn as_data_mut(&mut self) -> Option<&mut Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Inline(_) => None,
        }
    }

    /// Returns the callable, if this is an inline component.
    #[must_use]
    pub fn as_inline(&self) -> Option<&InlineFn> {
        match self {
            Self::Inline(f) => Some(f),
            Self::Data(_) => None,
        }
    }

    /// Returns `true` for inline components.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

impl Default for ComponentValue {
    fn default() -> Self {
        Self::Data(Value::Null)
    }
}

impl From<Value> for ComponentValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<InlineFn> for ComponentValue {
    fn from(f: InlineFn) -> Self {
        Self::Inline(f)
    }
}

impl From<bool> for ComponentValue {
    fn from(value: bool) -> Self {
        Self::Data(Value::Bool(value))
    }
}

impl From<f64> for ComponentValue {
    fn from(value: f64) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<i64> for ComponentValue {
    fn from(value: i64) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<&str> for ComponentValue {
    fn from(value: &str) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<String> for ComponentValue {
    fn from(value: String) -> Self {
        Self::Data(Value::String(value))
    }
}

/// Build a component map from a JSON object. Every entry becomes a data
/// component.
///
/// # Errors
///
/// Returns [`ComponentError::NotAnObject`] if `value` is not a JSON object.
pub fn components_from_json(value: Value) -> Result<Components, ComponentError> {
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, ComponentValue::Data(value)))
            .collect()),
        other => Err(ComponentError::NotAnObject(json_kind(&other))),
    }
}

/// Snapshot the data components of a map as a JSON object. Inline components
/// are omitted.
#[must_use]
pub fn components_to_json(components: &Components) -> Value {
    let map = components
        .iter()
        .filter_map(|(key, value)| value.as_data().map(|data| (key.clone(), data.clone())))
        .collect();
    Value::Object(map)
}

fn json_kind(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}
