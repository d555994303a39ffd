/*
 * stages/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Built-in stage implementations.
 */

//! Built-in stages.
//!
//! Each stage is built from a JSON settings value by its descriptor's
//! factory. A `null` value means "all defaults"; malformed settings are
//! reported as `InvalidInput` before the run starts.

pub mod calc;
pub mod custom_media;
pub mod custom_properties;
pub mod encapsulate;
pub mod minify;
pub mod report;
pub mod vendor_prefix;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::stage_ids::{
    CALC, CUSTOM_MEDIA, CUSTOM_PROPERTIES, ENCAPSULATE, IMPORT, MINIFY, REPORT, VENDOR_PREFIX,
};
use crate::error::PipelineError;
use crate::import::ImportStage;
use crate::registry::{StageDescriptor, StageRegistry};
use crate::stage::Stage;

pub use calc::CalcStage;
pub use custom_media::CustomMediaStage;
pub use custom_properties::CustomPropertiesStage;
pub use encapsulate::EncapsulateStage;
pub use minify::MinifyStage;
pub use report::{MemoryReportSink, ReportSink, ReportStage, TracingReportSink};
pub use vendor_prefix::VendorPrefixStage;

/// Register every built-in stage.
pub(crate) fn register_builtins(registry: &mut StageRegistry) {
    registry.register(descriptor(
        IMPORT,
        json!({"skipDuplicates": true}),
        ImportStage::from_settings,
    ));
    registry.register(descriptor(
        CUSTOM_PROPERTIES,
        json!({"preserve": false}),
        CustomPropertiesStage::from_settings,
    ));
    registry.register(descriptor(CALC, json!({"precision": 5}), CalcStage::from_settings));
    registry.register(descriptor(
        CUSTOM_MEDIA,
        json!({"preserve": false}),
        CustomMediaStage::from_settings,
    ));
    registry.register(descriptor(
        ENCAPSULATE,
        json!({"reset": "initial"}),
        EncapsulateStage::from_settings,
    ));
    registry.register(descriptor(
        VENDOR_PREFIX,
        json!({"add": true}),
        VendorPrefixStage::from_settings,
    ));
    registry.register(descriptor(
        REPORT,
        json!({"clearMessages": true}),
        ReportStage::from_settings,
    ));
    registry.register(descriptor(MINIFY, json!({}), |_: &Value| Ok(MinifyStage)));
}

fn descriptor<S, F>(name: &str, default_settings: Value, build: F) -> StageDescriptor
where
    S: Stage + 'static,
    F: Fn(&Value) -> Result<S, PipelineError> + Send + Sync + 'static,
{
    StageDescriptor::new(name, default_settings, move |settings: &Value| {
        Ok(Box::new(build(settings)?) as Box<dyn Stage>)
    })
}

/// Deserialize a stage's settings, treating `null` as the defaults.
pub(crate) fn parse_settings<T>(stage: &str, settings: &Value) -> Result<T, PipelineError>
where
    T: DeserializeOwned + Default,
{
    if settings.is_null() {
        return Ok(T::default());
    }
    T::deserialize(settings)
        .map_err(|e| PipelineError::invalid_input(format!("invalid '{}' settings: {}", stage, e)))
}
