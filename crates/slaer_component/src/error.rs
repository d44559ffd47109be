//! Component and registry error types.

/// Errors raised by a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The supplied instance name is empty or whitespace-only.
    #[error("invalid instance name: {0:?}")]
    InvalidName(String),

    /// No instance is registered under the name.
    #[error("no {store} named {name:?}")]
    UnknownInstance {
        /// Store label (`"template"` or `"object"`).
        store: &'static str,
        /// The missing name.
        name: String,
    },

    /// The instance is locked by the caller's own frame dispatch.
    #[error("instance {0:?} is being updated and cannot be re-entered")]
    InstanceBusy(String),
}

/// Errors raised when converting component values.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The component holds an inline callable where data was expected.
    #[error("component is an inline callable, not data")]
    NotData,

    /// A component map was built from JSON that is not an object.
    #[error("expected a JSON object of components, found {0}")]
    NotAnObject(String),

    /// JSON (de)serialisation failed.
    #[error("component json error: {0}")]
    Json(#[from] serde_json::Error),
}
