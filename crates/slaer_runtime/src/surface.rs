//! Drawing surfaces.
//!
//! A surface tracks the backing pixel size of a host drawing area. The size is
//! `viewport * resolution` per axis and is recomputed whenever the host
//! reports a viewport resize. Drawing itself is left to the host.

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use slaer_component::NameAllocator;

use crate::error::RuntimeError;

/// Per-axis multiplier from viewport size to backing pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution(pub [f64; 2]);

impl Resolution {
    /// The same scale on both axes.
    #[must_use]
    pub const fn uniform(scale: f64) -> Self {
        Self([scale, scale])
    }

    /// Parse a resolution from loosely-typed input.
    ///
    /// | input | result |
    /// |---|---|
    /// | omitted, `null`, `false`, `0`, `""` | `[1, 1]` |
    /// | number `n` | `[n, n]` |
    /// | numeric string `"s"` | `[s, s]` |
    /// | `[x, y]` | `[x, y]` |
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownSurfaceResolutionFormat`] for anything else,
    /// including non-finite or negative scales.
    pub fn from_value(value: Option<&Value>) -> Result<Self, RuntimeError> {
        let Some(value) = value else {
            return Ok(Self::default());
        };
        let unknown = || RuntimeError::UnknownSurfaceResolutionFormat(value.to_string());

        match value {
            Value::Null | Value::Bool(false) => Ok(Self::default()),
            Value::Number(n) => match n.as_f64() {
                Some(scale) if scale == 0.0 => Ok(Self::default()),
                Some(scale) => Self::checked([scale, scale]).ok_or_else(unknown),
                None => Err(unknown()),
            },
            Value::String(s) if s.is_empty() => Ok(Self::default()),
            Value::String(s) => s.parse(),
            Value::Array(items) => match items.as_slice() {
                [x, y] => match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => Self::checked([x, y]).ok_or_else(unknown),
                    _ => Err(unknown()),
                },
                _ => Err(unknown()),
            },
            Value::Bool(true) | Value::Object(_) => Err(unknown()),
        }
    }

    fn checked(scale: [f64; 2]) -> Option<Self> {
        scale
            .iter()
            .all(|s| s.is_finite() && *s >= 0.0)
            .then_some(Self(scale))
    }

    /// Backing pixel size for a viewport, truncated to whole pixels.
    #[must_use]
    pub fn apply(&self, viewport: [u32; 2]) -> [u32; 2] {
        [
            (f64::from(viewport[0]) * self.0[0]).floor() as u32,
            (f64::from(viewport[1]) * self.0[1]).floor() as u32,
        ]
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self([1.0, 1.0])
    }
}

impl FromStr for Resolution {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<f64>()
            .ok()
            .and_then(|scale| Self::checked([scale, scale]))
            .ok_or_else(|| RuntimeError::UnknownSurfaceResolutionFormat(s.to_string()))
    }
}

/// Options for creating a surface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceOptions {
    /// Surface name; generated when omitted.
    pub name: Option<String>,
    /// Resolution in any form accepted by [`Resolution::from_value`].
    pub resolution: Option<Value>,
    /// Background colour, passed through to the host.
    pub background: Option<String>,
}

/// A host drawing area sized to the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    name: String,
    resolution: Resolution,
    background: Option<String>,
    size: [u32; 2],
}

impl Surface {
    /// Create a surface and size it for `viewport`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        resolution: Resolution,
        background: Option<String>,
        viewport: [u32; 2],
    ) -> Self {
        Self {
            name: name.into(),
            resolution,
            background,
            size: resolution.apply(viewport),
        }
    }

    /// Recompute the backing size for a new viewport size.
    pub fn resize(&mut self, viewport: [u32; 2]) {
        self.size = self.resolution.apply(viewport);
    }

    /// The surface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolution scale.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// The background colour.
    #[must_use]
    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    /// Backing `[width, height]` in pixels.
    #[must_use]
    pub fn size(&self) -> [u32; 2] {
        self.size
    }
}

/// Shared handle to a registered surface.
pub type SurfaceRef = Arc<Mutex<Surface>>;

/// Every surface created by a runtime, kept so resizes reach all of them.
#[derive(Debug)]
pub struct SurfaceRegistry {
    surfaces: Mutex<Vec<SurfaceRef>>,
    anonymous: Mutex<NameAllocator>,
}

impl SurfaceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            surfaces: Mutex::new(Vec::new()),
            anonymous: Mutex::new(NameAllocator::new("surface#")),
        }
    }

    /// Create and register a surface sized for `viewport`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownSurfaceResolutionFormat`] if the resolution
    /// cannot be parsed. Nothing is registered in that case.
    pub fn create(
        &self,
        options: SurfaceOptions,
        viewport: [u32; 2],
    ) -> Result<SurfaceRef, RuntimeError> {
        let resolution = Resolution::from_value(options.resolution.as_ref())?;
        let name = match options.name {
            Some(name) => name,
            None => self.anonymous.lock().allocate(),
        };
        let surface = Surface::new(name, resolution, options.background, viewport);
        info!(
            surface = surface.name(),
            width = surface.size()[0],
            height = surface.size()[1],
            "surface created"
        );
        let surface = Arc::new(Mutex::new(surface));
        self.surfaces.lock().push(Arc::clone(&surface));
        Ok(surface)
    }

    /// Resize every surface for a new viewport size.
    pub fn resize_all(&self, viewport: [u32; 2]) {
        let surfaces = self.surfaces.lock();
        for surface in surfaces.iter() {
            surface.lock().resize(viewport);
        }
        debug!(
            width = viewport[0],
            height = viewport[1],
            surfaces = surfaces.len(),
            "surfaces resized"
        );
    }

    /// Returns all surfaces in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<SurfaceRef> {
        self.surfaces.lock().clone()
    }

    /// Returns the number of surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.lock().len()
    }

    /// Returns `true` if no surface was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.lock().is_empty()
    }
}

impl Default for SurfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<Resolution, RuntimeError> {
        Resolution::from_value(Some(&value))
    }

    #[test]
    fn test_resolution_scalar() {
        assert_eq!(parse(json!(2)).unwrap(), Resolution([2.0, 2.0]));
    }

    #[test]
    fn test_resolution_numeric_string() {
        assert_eq!(parse(json!("1.5")).unwrap(), Resolution([1.5, 1.5]));
        assert_eq!(" 0.5 ".parse::<Resolution>().unwrap(), Resolution::uniform(0.5));
    }

    #[test]
    fn test_resolution_vector_unchanged() {
        assert_eq!(parse(json!([1, 2])).unwrap(), Resolution([1.0, 2.0]));
    }

    #[test]
    fn test_resolution_omitted_defaults() {
        assert_eq!(Resolution::from_value(None).unwrap(), Resolution([1.0, 1.0]));
        assert_eq!(parse(Value::Null).unwrap(), Resolution::default());
        assert_eq!(parse(json!(0)).unwrap(), Resolution::default());
        assert_eq!(parse(json!("")).unwrap(), Resolution::default());
    }

    #[test]
    fn test_resolution_unknown_formats() {
        for bad in [
            json!("sharp"),
            json!(true),
            json!({"x": 1}),
            json!([1]),
            json!([1, 2, 3]),
            json!(["a", 1]),
            json!(-1),
        ] {
            assert!(
                matches!(parse(bad.clone()), Err(RuntimeError::UnknownSurfaceResolutionFormat(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_apply_scales_and_truncates() {
        assert_eq!(Resolution([0.5, 2.0]).apply([801, 600]), [400, 1200]);
    }

    #[test]
    fn test_surface_resize() {
        let mut surface = Surface::new("main", Resolution::uniform(2.0), None, [100, 50]);
        assert_eq!(surface.size(), [200, 100]);
        surface.resize([300, 10]);
        assert_eq!(surface.size(), [600, 20]);
        assert_eq!(surface.name(), "main");
    }

    #[test]
    fn test_registry_names_and_resizes() {
        let registry = SurfaceRegistry::new();
        let a = registry.create(SurfaceOptions::default(), [10, 10]).unwrap();
        let b = registry
            .create(
                SurfaceOptions {
                    resolution: Some(json!([2, 3])),
                    background: Some("#000".to_string()),
                    ..SurfaceOptions::default()
                },
                [10, 10],
            )
            .unwrap();
        assert_eq!(a.lock().name(), "surface#0");
        assert_eq!(b.lock().name(), "surface#1");
        assert_eq!(b.lock().background(), Some("#000"));

        registry.resize_all([20, 40]);
        assert_eq!(a.lock().size(), [20, 40]);
        assert_eq!(b.lock().size(), [40, 120]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_rejects_bad_resolution() {
        let registry = SurfaceRegistry::new();
        let options: SurfaceOptions =
            serde_json::from_value(json!({"resolution": "blurry"})).unwrap();
        assert!(registry.create(options, [10, 10]).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_options_deserialize() {
        let options: SurfaceOptions =
            serde_json::from_value(json!({"name": "hud", "resolution": 2})).unwrap();
        assert_eq!(options.name.as_deref(), Some("hud"));
        assert_eq!(options.resolution, Some(json!(2)));
        assert!(options.background.is_none());
    }
}
