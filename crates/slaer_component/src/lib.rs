//! # slaer_component
//!
//! The data side of the slaer runtime: what a component is, how component
//! maps combine, and how named instances are stored.
//!
//! This crate provides:
//!
//! - [`ComponentValue`]: plain data or an inline per-frame callable.
//! - [`extend`], [`merge`], [`merge_extend`]: the two map-combination rules.
//! - [`Instance`]: a named component map, shared as an [`InstanceRef`].
//! - [`Registry`]: a named-instance store, used for templates and objects.

pub mod component;
pub mod error;
pub mod instance;
pub mod merge;
pub mod registry;

pub use component::{
    ComponentValue, Components, InlineFn, PRIVATE_PREFIX, components_from_json,
    components_to_json, is_private_key,
};
pub use error::{ComponentError, RegistryError};
pub use instance::{Instance, InstanceRef, NameAllocator};
pub use merge::{extend, merge, merge_extend};
pub use registry::{Objects, Registry, StoreKind, Templates};
