//! Core of the SUIT CSS preprocessor
//!
//! This crate merges configuration layers, assembles the stage pipeline,
//! and runs CSS through it, linting the input and every imported file on
//! the way.
//!
//! # Architecture
//!
//! - [`Configuration`] / [`merge`] - Option layers and the merged
//!   [`EffectiveConfiguration`]
//! - [`StageRegistry`] - Stage names mapped to factories and default settings
//! - [`Linter`] - Style and naming-convention checks producing [`Diagnostic`]s
//! - [`ImportStage`] - `@import` inlining with per-file linting
//! - [`Pipeline`] - Sequential execution of the instantiated stages
//! - [`Preprocessor`] - Entry point tying the above together
//!
//! # Example
//!
//! ```ignore
//! use suitcss_core::{Configuration, process};
//!
//! let options = Configuration::new().with_root("styles").with_minify(true);
//! let css = process("@import \"components/button.css\";", Some(&options), None).await?;
//! ```

pub mod config;
pub mod css;
pub mod diagnostic;
pub mod error;
pub mod import;
pub mod lint;
pub mod preprocessor;
pub mod registry;
pub mod stage;
pub mod stages;

// Re-export commonly used types
pub use config::{ConfigError, Configuration, DebugHook, Defaults, EffectiveConfiguration, merge};
pub use diagnostic::{Diagnostic, Severity, SourceLocation};
pub use error::{ErrorKind, PipelineError, Result};
pub use import::{FsLoader, ImportLoader, ImportResolver, ImportStage, MemoryLoader, WatchHook};
pub use lint::{LintCheck, LintResult, Linter, NamingPreset};
pub use preprocessor::{
    CssInput, PipelineRun, Preprocessor, PreprocessorBuilder, ProcessOutput, process,
};
pub use registry::{StageDescriptor, StageRegistry};
pub use stage::{Pipeline, PipelineObserver, Stage, StageContext, TracingObserver};
pub use stages::{MemoryReportSink, ReportSink, TracingReportSink};
