//! Runtime settings.
//!
//! A small key/value store read by the bootstrapper. The only option the
//! runtime itself interprets is [`AUTORUN`]; everything else is kept for the
//! application to read back.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RuntimeError;

/// Start the scheduler once the host reports it has finished loading.
pub const AUTORUN: &str = "autorun";

/// Key/value settings, defaulting to `{ "autorun": true }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Create settings with default values.
    #[must_use]
    pub fn new() -> Self {
        let mut values = Map::new();
        values.insert(AUTORUN.to_string(), Value::Bool(true));
        Self { values }
    }

    /// Parse settings from a JSON object, layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Json`] for malformed JSON and
    /// [`RuntimeError::InvalidSettings`] if the document is not an object.
    pub fn from_json_str(source: &str) -> Result<Self, RuntimeError> {
        let Value::Object(map) = serde_json::from_str::<Value>(source)? else {
            return Err(RuntimeError::InvalidSettings(
                "settings document must be a JSON object".to_string(),
            ));
        };
        let mut settings = Self::new();
        for (name, value) in map {
            settings.configure(name, value);
        }
        Ok(settings)
    }

    /// Override the autorun flag.
    #[must_use]
    pub fn with_autorun(mut self, autorun: bool) -> Self {
        self.configure(AUTORUN, autorun);
        self
    }

    /// Set an option.
    pub fn configure(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns every option.
    #[must_use]
    pub fn config(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Returns a single option.
    #[must_use]
    pub fn config_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether the scheduler should start on load. Any truthy value counts.
    #[must_use]
    pub fn autorun(&self) -> bool {
        self.values.get(AUTORUN).is_some_and(is_truthy)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_autorun() {
        let settings = Settings::default();
        assert!(settings.autorun());
        assert_eq!(settings.config_value(AUTORUN), Some(&json!(true)));
        assert_eq!(settings.config().len(), 1);
    }

    #[test]
    fn test_configure_and_read_back() {
        let mut settings = Settings::new();
        settings.configure("title", "demo");
        settings.configure(AUTORUN, false);
        assert_eq!(settings.config_value("title"), Some(&json!("demo")));
        assert!(!settings.autorun());
        assert!(settings.config_value("missing").is_none());
    }

    #[test]
    fn test_autorun_truthiness() {
        assert!(!Settings::new().with_autorun(false).autorun());
        let mut settings = Settings::new();
        settings.configure(AUTORUN, 0);
        assert!(!settings.autorun());
        settings.configure(AUTORUN, "yes");
        assert!(settings.autorun());
        settings.configure(AUTORUN, Value::Null);
        assert!(!settings.autorun());
    }

    #[test]
    fn test_from_json_layers_over_defaults() {
        let settings = Settings::from_json_str(r#"{"fps": 30}"#).unwrap();
        assert!(settings.autorun());
        assert_eq!(settings.config_value("fps"), Some(&json!(30)));

        let settings = Settings::from_json_str(r#"{"autorun": false}"#).unwrap();
        assert!(!settings.autorun());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            Settings::from_json_str("[1, 2]"),
            Err(RuntimeError::InvalidSettings(_))
        ));
        assert!(matches!(
            Settings::from_json_str("{"),
            Err(RuntimeError::Json(_))
        ));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let settings = Settings::new();
        assert_eq!(serde_json::to_value(&settings).unwrap(), json!({"autorun": true}));
    }
}
