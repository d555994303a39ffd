//! Configuration layer types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::stage_ids::{self, CALC, CUSTOM_MEDIA, CUSTOM_PROPERTIES, IMPORT, REPORT, VENDOR_PREFIX};
use super::{ConfigError, value_type_name};
use crate::stage::Stage;

/// Hook applied to the assembled stage list before execution.
///
/// The hook receives every stage that will run after import resolution and
/// may inspect, reorder, or replace them. The default hook leaves the list
/// untouched.
#[derive(Clone, Default)]
pub struct DebugHook(Option<Arc<dyn Fn(&mut Vec<Box<dyn Stage>>) + Send + Sync>>);

impl DebugHook {
    pub fn new(hook: impl Fn(&mut Vec<Box<dyn Stage>>) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(hook)))
    }

    pub fn apply(&self, stages: &mut Vec<Box<dyn Stage>>) {
        if let Some(hook) = &self.0 {
            hook(stages);
        }
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for DebugHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            write!(f, "DebugHook(identity)")
        } else {
            write!(f, "DebugHook(<fn>)")
        }
    }
}

/// One configuration layer: a file configuration or call-site options.
///
/// Every field is optional; absent fields inherit from lower layers.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Custom stage order (`use`)
    pub use_stages: Option<Vec<String>>,
    pub lint: Option<bool>,
    pub minify: Option<bool>,
    pub encapsulate: Option<bool>,
    /// Root directory for resolving relative imports
    pub root: Option<PathBuf>,
    /// Per-stage settings keyed by canonical stage id
    pub settings: IndexMap<String, Value>,
    pub debug_hook: Option<DebugHook>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layer from an untyped options value.
    ///
    /// `null` is treated as "no options". Any other non-object value is
    /// rejected. Keys other than the recognised options are stored as
    /// per-stage settings. A nested `config` object (the shape accepted by
    /// the JavaScript API) is flattened first, so top-level keys override it.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(ConfigError::NotAnObject {
                    found: value_type_name(&other),
                });
            }
        };

        let mut config = Self::default();
        let mut map = map;
        if let Some(nested) = map.remove("config") {
            match nested {
                Value::Object(inner) => config.apply_entries(inner)?,
                Value::Null => {}
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "config".to_string(),
                        expected: "an object",
                        found: value_type_name(&other),
                    });
                }
            }
        }
        config.apply_entries(map)?;
        Ok(config)
    }

    /// Parse a JSON configuration file's contents.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a YAML configuration file's contents.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    fn apply_entries(&mut self, map: Map<String, Value>) -> Result<(), ConfigError> {
        for (key, value) in map {
            match key.as_str() {
                "use" => self.use_stages = Some(expect_string_list(&key, &value)?),
                "lint" => self.lint = Some(expect_bool(&key, &value)?),
                "minify" => self.minify = Some(expect_bool(&key, &value)?),
                "encapsulate" => self.encapsulate = Some(expect_bool(&key, &value)?),
                "root" => match value {
                    Value::String(root) => self.root = Some(PathBuf::from(root)),
                    Value::Null => self.root = None,
                    other => {
                        return Err(ConfigError::InvalidValue {
                            key,
                            expected: "a string",
                            found: value_type_name(&other),
                        });
                    }
                },
                _ => {
                    self.settings.insert(stage_ids::canonicalize(&key), value);
                }
            }
        }
        Ok(())
    }

    pub fn with_use<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.use_stages = Some(
            stages
                .into_iter()
                .map(|s| stage_ids::canonicalize(s.as_ref()))
                .collect(),
        );
        self
    }

    pub fn with_lint(mut self, lint: bool) -> Self {
        self.lint = Some(lint);
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = Some(minify);
        self
    }

    pub fn with_encapsulate(mut self, encapsulate: bool) -> Self {
        self.encapsulate = Some(encapsulate);
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_settings(mut self, stage: &str, settings: Value) -> Self {
        self.settings.insert(stage_ids::canonicalize(stage), settings);
        self
    }

    pub fn with_debug_hook(mut self, hook: DebugHook) -> Self {
        self.debug_hook = Some(hook);
        self
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        expected: "a boolean",
        found: value_type_name(value),
    })
}

fn expect_string_list(key: &str, value: &Value) -> Result<Vec<String>, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        expected: "an array of stage names",
        found: value_type_name(value),
    };
    let items = value.as_array().ok_or_else(invalid)?;
    items
        .iter()
        .map(|item| item.as_str().map(stage_ids::canonicalize).ok_or_else(invalid))
        .collect()
}

/// Built-in defaults, the lowest configuration layer.
///
/// Per-stage default settings are not stored here; a stage with no
/// configured settings receives its registry descriptor's defaults.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub use_stages: Vec<String>,
    pub lint: bool,
    pub encapsulate: bool,
    pub minify: bool,
    pub root: Option<PathBuf>,
    pub settings: IndexMap<String, Value>,
}

impl Defaults {
    /// A fresh copy of the built-in defaults.
    pub fn builtin() -> Self {
        Self {
            use_stages: [IMPORT, CUSTOM_PROPERTIES, CALC, CUSTOM_MEDIA, VENDOR_PREFIX, REPORT]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            lint: true,
            encapsulate: false,
            minify: false,
            root: None,
            settings: IndexMap::new(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The merged configuration used for one pipeline run.
#[derive(Debug, Clone)]
pub struct EffectiveConfiguration {
    /// Stage ids in execution order. Starts with `import`; ends with
    /// `vendor-prefix`, `report`, and `minify` when enabled.
    pub stage_order: Vec<String>,
    /// Settings per stage id; a missing entry means "use the stage default"
    pub stage_settings: IndexMap<String, Value>,
    pub lint_enabled: bool,
    pub encapsulate: bool,
    pub minify: bool,
    pub import_root: Option<PathBuf>,
    pub debug_hook: DebugHook,
}

impl EffectiveConfiguration {
    pub fn settings_for(&self, stage: &str) -> Option<&Value> {
        self.stage_settings.get(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_recognised_keys() {
        let config = Configuration::from_value(json!({
            "use": ["postcss-calc", "my-stage"],
            "lint": false,
            "minify": true,
            "encapsulate": true,
            "root": "test/fixtures",
            "autoprefixer": {"add": false},
        }))
        .unwrap();

        assert_eq!(
            config.use_stages,
            Some(vec!["calc".to_string(), "my-stage".to_string()])
        );
        assert_eq!(config.lint, Some(false));
        assert_eq!(config.minify, Some(true));
        assert_eq!(config.encapsulate, Some(true));
        assert_eq!(config.root, Some(PathBuf::from("test/fixtures")));
        assert_eq!(config.settings.get("vendor-prefix"), Some(&json!({"add": false})));
    }

    #[test]
    fn test_from_value_null_is_empty() {
        let config = Configuration::from_value(Value::Null).unwrap();
        assert!(config.use_stages.is_none());
        assert!(config.settings.is_empty());
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = Configuration::from_value(json!(42)).unwrap_err();
        assert_eq!(err, ConfigError::NotAnObject { found: "a number" });

        let err = Configuration::from_value(json!("minify")).unwrap_err();
        assert!(matches!(err, ConfigError::NotAnObject { .. }));
    }

    #[test]
    fn test_from_value_rejects_bad_types() {
        let err = Configuration::from_value(json!({"lint": "yes"})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "lint"));

        let err = Configuration::from_value(json!({"use": ["calc", 3]})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "use"));
    }

    #[test]
    fn test_nested_config_is_flattened() {
        let config = Configuration::from_value(json!({
            "root": "styles",
            "config": {
                "use": ["postcss-custom-properties"],
                "minify": true,
                "root": "ignored",
            },
        }))
        .unwrap();
        assert_eq!(config.use_stages, Some(vec!["custom-properties".to_string()]));
        assert_eq!(config.minify, Some(true));
        assert_eq!(config.root, Some(PathBuf::from("styles")));
    }

    #[test]
    fn test_from_yaml_str() {
        let config = Configuration::from_yaml_str("use:\n  - calc\nminify: true\n").unwrap();
        assert_eq!(config.use_stages, Some(vec!["calc".to_string()]));
        assert_eq!(config.minify, Some(true));
    }

    #[test]
    fn test_from_json_str_parse_error() {
        let err = Configuration::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_defaults_are_fresh_copies() {
        let mut a = Defaults::builtin();
        a.use_stages.clear();
        a.root = Some(PathBuf::from("/tmp"));
        let b = Defaults::builtin();
        assert_eq!(b.use_stages.len(), 6);
        assert!(b.root.is_none());
    }

    #[test]
    fn test_debug_hook_debug_impl() {
        assert_eq!(format!("{:?}", DebugHook::default()), "DebugHook(identity)");
        let hook = DebugHook::new(|stages| stages.clear());
        assert_eq!(format!("{:?}", hook), "DebugHook(<fn>)");
    }
}
