//! Runtime error types.

use slaer_component::RegistryError;

/// Errors that can occur while building or driving a runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A template or object store rejected the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A surface resolution was neither a number, a numeric string, nor a
    /// two-element numeric array.
    #[error("unknown surface resolution format: {0}")]
    UnknownSurfaceResolutionFormat(String),

    /// A required host collaborator was not provided.
    #[error("host collaborator unavailable: {0}")]
    HostUnavailable(&'static str),

    /// Settings could not be applied.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings JSON could not be parsed.
    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}
