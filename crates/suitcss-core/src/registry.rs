/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Registry of available pipeline stages.
 */

//! Registry of available pipeline stages.
//!
//! The registry maps stable stage identifiers to [`StageDescriptor`]s: a
//! factory that builds the stage from its settings, plus the settings used
//! when no configuration layer provides any. Stages are linked statically
//! and looked up by name; nothing is loaded at runtime.
//!
//! The built-in registry is created once per process and never mutated.
//! Embedders that need extra stages build their own registry with
//! [`StageRegistry::new`] and [`StageRegistry::register`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::config::stage_ids;
use crate::error::PipelineError;
use crate::stage::Stage;

/// Builds a stage from its resolved settings.
pub type StageFactory =
    Arc<dyn Fn(&Value) -> Result<Box<dyn Stage>, PipelineError> + Send + Sync>;

static BUILTIN: Lazy<Arc<StageRegistry>> = Lazy::new(|| Arc::new(StageRegistry::new()));

/// Static description of one known stage.
#[derive(Clone)]
pub struct StageDescriptor {
    name: String,
    default_settings: Value,
    is_pinned: bool,
    factory: StageFactory,
}

impl StageDescriptor {
    pub fn new<F>(name: impl Into<String>, default_settings: Value, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Box<dyn Stage>, PipelineError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            is_pinned: stage_ids::is_pinned(&name),
            name,
            default_settings,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_settings(&self) -> &Value {
        &self.default_settings
    }

    /// Whether the stage's position is fixed by the pipeline.
    pub fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    /// Build the stage. `None` means "use the default settings"; a
    /// provided value replaces the defaults entirely.
    pub fn instantiate(&self, settings: Option<&Value>) -> Result<Box<dyn Stage>, PipelineError> {
        (self.factory)(settings.unwrap_or(&self.default_settings))
    }
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("name", &self.name)
            .field("default_settings", &self.default_settings)
            .field("is_pinned", &self.is_pinned)
            .finish()
    }
}

/// Registry of available stages, keyed by canonical id.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: IndexMap<String, StageDescriptor>,
}

impl StageRegistry {
    /// Create a new registry holding every built-in stage.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        crate::stages::register_builtins(&mut registry);
        registry
    }

    /// The shared, process-wide built-in registry.
    pub fn builtin() -> Arc<StageRegistry> {
        BUILTIN.clone()
    }

    /// Create an empty registry (for testing).
    pub fn empty() -> Self {
        Self {
            stages: IndexMap::new(),
        }
    }

    /// Register a stage.
    ///
    /// If a stage with the same name already exists, it is replaced.
    pub fn register(&mut self, descriptor: StageDescriptor) {
        self.stages.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&StageDescriptor> {
        self.stages.get(name)
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Resolve `name` and build the stage.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedStage` if nothing is registered under `name`, or
    /// whatever the stage's factory reports for bad settings.
    pub fn instantiate(
        &self,
        name: &str,
        settings: Option<&Value>,
    ) -> Result<Box<dyn Stage>, PipelineError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| PipelineError::UnresolvedStage {
                stage: name.to_string(),
            })?;
        descriptor.instantiate(settings)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
