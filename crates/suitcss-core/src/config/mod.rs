//! Configuration for a preprocessing run.
//!
//! A run's configuration is assembled from three layers, lowest priority
//! first:
//!
//! 1. [`Defaults`] - the built-in stage order and flags
//! 2. A file configuration (e.g. `suitcss.json`) loaded by the embedder
//! 3. Call-site options passed to [`crate::process`]
//!
//! [`merge`] folds these into an [`EffectiveConfiguration`]. Scalar options
//! and per-stage settings use "last layer wins" semantics. The `use` list
//! is merged by set difference so that callers can reorder stages without
//! duplicating them, and the pinned stages (`import`, `vendor-prefix`,
//! `report`) always end up in their fixed positions.
//!
//! # Example
//!
//! ```rust,ignore
//! use suitcss_core::config::{Configuration, Defaults, merge};
//!
//! let call = Configuration::from_value(serde_json::json!({
//!     "use": ["calc", "custom-properties"],
//!     "minify": true,
//! }))?;
//! let effective = merge(&Defaults::builtin(), None, Some(&call));
//! assert_eq!(effective.stage_order.first().map(String::as_str), Some("import"));
//! ```

mod merge;
pub mod stage_ids;
mod types;

use thiserror::Error;

pub use merge::{merge, merge_stage_order};
pub use types::{Configuration, DebugHook, Defaults, EffectiveConfiguration};

/// Error raised when a configuration layer is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The options value was present but not an object.
    #[error("suitcss: options must be an object, got {found}")]
    NotAnObject { found: &'static str },

    /// A recognised option had the wrong type.
    #[error("suitcss: option '{key}' must be {expected}, got {found}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Configuration text could not be parsed.
    #[error("suitcss: failed to parse configuration: {0}")]
    Parse(String),
}

/// Name of a JSON value's type, for error messages.
pub(crate) fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
