/*
 * preprocessor.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Public entry points.
 */

//! Public entry points.
//!
//! A [`Preprocessor`] bundles the long-lived collaborators of a run: the
//! stage registry, the defaults and file configuration layers, the import
//! loader, the watch hook, the observer and the report sink. Each call to
//! [`Preprocessor::process`] builds a fresh [`PipelineRun`] from them, so
//! nothing leaks from one call into the next.
//!
//! Preparing a run is synchronous: malformed input, malformed options and
//! unknown stage names are all reported before any stage touches the CSS.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::config::stage_ids::IMPORT;
use crate::config::{Configuration, Defaults, EffectiveConfiguration, merge};
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;
use crate::import::{FsLoader, ImportLoader, WatchHook};
use crate::lint::Linter;
use crate::registry::{StageDescriptor, StageRegistry};
use crate::stage::{NoopObserver, Pipeline, PipelineObserver, Stage, StageContext};
use crate::stages::{ReportSink, TracingReportSink};

/// CSS handed to the preprocessor.
///
/// Embedding APIs that accept arbitrary JSON pass [`CssInput::Other`] for
/// anything that is not a string; such input is rejected with
/// `InvalidInput`.
#[derive(Debug, Clone, PartialEq)]
pub enum CssInput {
    Text(String),
    Other(Value),
}

impl From<String> for CssInput {
    fn from(css: String) -> Self {
        CssInput::Text(css)
    }
}

impl From<&str> for CssInput {
    fn from(css: &str) -> Self {
        CssInput::Text(css.to_string())
    }
}

impl From<Value> for CssInput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(css) => CssInput::Text(css),
            other => CssInput::Other(other),
        }
    }
}

/// Result of a run, with its side channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub css: String,
    /// Every diagnostic collected, reported or not
    pub diagnostics: Vec<Diagnostic>,
    /// Files inlined by the import stage
    pub imported_files: Vec<PathBuf>,
}

/// One prepared invocation: the input, its merged configuration, and the
/// instantiated stages.
pub struct PipelineRun {
    css: String,
    config: EffectiveConfiguration,
    pipeline: Pipeline,
    ctx: StageContext,
}

impl PipelineRun {
    pub fn config(&self) -> &EffectiveConfiguration {
        &self.config
    }

    /// Names of the stages that will run, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.pipeline.stage_names()
    }

    /// Execute the run.
    pub async fn execute(mut self) -> Result<ProcessOutput, PipelineError> {
        let css = self.pipeline.run(self.css, &mut self.ctx).await?;
        Ok(ProcessOutput {
            css,
            diagnostics: self.ctx.diagnostics,
            imported_files: self.ctx.imported_files,
        })
    }
}

impl std::fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("stages", &self.stage_names())
            .field("config", &self.config)
            .finish()
    }
}

/// The CSS preprocessor.
///
/// # Example
///
/// ```ignore
/// use suitcss_core::{Configuration, Preprocessor};
///
/// let preprocessor = Preprocessor::new();
/// let options = Configuration::new().with_minify(true);
/// let css = preprocessor.process(".Button {}", Some(&options), None).await?;
/// ```
#[derive(Clone)]
pub struct Preprocessor {
    registry: Arc<StageRegistry>,
    defaults: Defaults,
    file_config: Option<Configuration>,
    loader: Arc<dyn ImportLoader>,
    watch: WatchHook,
    observer: Arc<dyn PipelineObserver>,
    report_sink: Arc<dyn ReportSink>,
}

impl Preprocessor {
    /// A preprocessor with the built-in stages and defaults.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PreprocessorBuilder {
        PreprocessorBuilder::default()
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Validate the input, merge the configuration layers and instantiate
    /// every stage.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `css` is not text or a stage's settings are
    ///   malformed
    /// - `UnresolvedStage` if the stage order names an unregistered stage
    pub fn prepare(
        &self,
        css: impl Into<CssInput>,
        options: Option<&Configuration>,
        filename: Option<&Path>,
    ) -> Result<PipelineRun, PipelineError> {
        let css = match css.into() {
            CssInput::Text(css) => css,
            CssInput::Other(value) => {
                return Err(PipelineError::invalid_input(format!(
                    "did not receive a String (got {})",
                    crate::config::value_type_name(&value)
                )));
            }
        };

        let config = merge(&self.defaults, self.file_config.as_ref(), options);
        if let Some(missing) = config
            .stage_order
            .iter()
            .find(|id| !self.registry.has_stage(id))
        {
            return Err(PipelineError::UnresolvedStage {
                stage: missing.clone(),
            });
        }

        let linter = Linter::from_config(&config)?;
        let import = self
            .registry
            .instantiate(IMPORT, config.settings_for(IMPORT))?;
        let mut stages: Vec<Box<dyn Stage>> = config
            .stage_order
            .iter()
            .filter(|id| id.as_str() != IMPORT)
            .map(|id| self.registry.instantiate(id, config.settings_for(id)))
            .collect::<Result<_, _>>()?;
        config.debug_hook.apply(&mut stages);

        tracing::debug!(
            stages = ?config.stage_order,
            lint = config.lint_enabled,
            "prepared pipeline"
        );

        let ctx = StageContext::new(Arc::new(linter))
            .with_filename(filename.map(Path::to_path_buf))
            .with_import_root(config.import_root.clone())
            .with_loader(self.loader.clone())
            .with_watch(self.watch.clone())
            .with_report_sink(self.report_sink.clone())
            .with_observer(self.observer.clone());

        Ok(PipelineRun {
            css,
            config,
            pipeline: Pipeline::new(import, stages),
            ctx,
        })
    }

    /// Process `css` and return the resulting stylesheet.
    pub async fn process(
        &self,
        css: impl Into<CssInput>,
        options: Option<&Configuration>,
        filename: Option<&Path>,
    ) -> Result<String, PipelineError> {
        Ok(self.process_with_report(css, options, filename).await?.css)
    }

    /// Process `css`, also returning diagnostics and imported files.
    pub async fn process_with_report(
        &self,
        css: impl Into<CssInput>,
        options: Option<&Configuration>,
        filename: Option<&Path>,
    ) -> Result<ProcessOutput, PipelineError> {
        self.prepare(css, options, filename)?.execute().await
    }

    /// Process untyped input, as received from a JSON-speaking embedder.
    ///
    /// `options` must be an object (or `null`).
    pub async fn process_value(
        &self,
        css: Value,
        options: Option<Value>,
        filename: Option<&Path>,
    ) -> Result<String, PipelineError> {
        let options = options.map(Configuration::from_value).transpose()?;
        self.process(css, options.as_ref(), filename).await
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("stages", &self.registry.names())
            .field("defaults", &self.defaults)
            .field("file_config", &self.file_config)
            .field("watch", &self.watch)
            .finish()
    }
}

/// Builder for [`Preprocessor`].
pub struct PreprocessorBuilder {
    registry: Arc<StageRegistry>,
    defaults: Defaults,
    file_config: Option<Configuration>,
    loader: Arc<dyn ImportLoader>,
    watch: WatchHook,
    observer: Arc<dyn PipelineObserver>,
    report_sink: Arc<dyn ReportSink>,
}

impl Default for PreprocessorBuilder {
    fn default() -> Self {
        Self {
            registry: StageRegistry::builtin(),
            defaults: Defaults::builtin(),
            file_config: None,
            loader: Arc::new(FsLoader),
            watch: WatchHook::default(),
            observer: Arc::new(NoopObserver),
            report_sink: Arc::new(TracingReportSink),
        }
    }
}

impl PreprocessorBuilder {
    /// Replace the whole stage registry.
    pub fn registry(mut self, registry: Arc<StageRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Add (or replace) a stage. The shared built-in registry is never
    /// modified; this builder gets its own copy.
    pub fn register(mut self, descriptor: StageDescriptor) -> Self {
        Arc::make_mut(&mut self.registry).register(descriptor);
        self
    }

    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Configuration layer applied between the defaults and call options.
    pub fn file_config(mut self, config: Configuration) -> Self {
        self.file_config = Some(config);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ImportLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn watch(mut self, watch: WatchHook) -> Self {
        self.watch = watch;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink = sink;
        self
    }

    pub fn build(self) -> Preprocessor {
        Preprocessor {
            registry: self.registry,
            defaults: self.defaults,
            file_config: self.file_config,
            loader: self.loader,
            watch: self.watch,
            observer: self.observer,
            report_sink: self.report_sink,
        }
    }
}

/// Process `css` with the built-in stages and defaults.
pub async fn process(
    css: impl Into<CssInput>,
    options: Option<&Configuration>,
    filename: Option<&Path>,
) -> Result<String, PipelineError> {
    Preprocessor::new().process(css, options, filename).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stage::FnStage;
    use serde_json::json;

    #[test]
    fn test_non_string_input_rejected_before_running() {
        let err = Preprocessor::new().prepare(json!(42), None, None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("did not receive a String (got a number)"));
    }

    #[test]
    fn test_string_value_is_text() {
        assert_eq!(CssInput::from(json!("a{}")), CssInput::Text("a{}".to_string()));
    }

    #[test]
    fn test_unregistered_stage() {
        let options = Configuration::new().with_use(["postcss-unknown"]);
        let err = Preprocessor::new()
            .prepare("body {}", Some(&options), None)
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnresolvedStage { ref stage } if stage == "postcss-unknown"));
    }

    #[test]
    fn test_prepare_stage_names() {
        let options = Configuration::new().with_minify(true);
        let run = Preprocessor::new()
            .prepare("body {}", Some(&options), None)
            .unwrap();
        insta::assert_snapshot!(
            run.stage_names().join(" > "),
            @"import > custom-properties > calc > custom-media > vendor-prefix > report > minify"
        );
    }

    #[test]
    fn test_custom_stage_registration() {
        let preprocessor = Preprocessor::builder()
            .register(StageDescriptor::new("shout", Value::Null, |_: &Value| {
                Ok(Box::new(FnStage::new("shout", |css: String| Ok(css.to_uppercase())))
                    as Box<dyn Stage>)
            }))
            .build();
        assert!(!StageRegistry::builtin().has_stage("shout"));

        let options = Configuration::new().with_use(["shout"]).with_lint(false);
        let out = pollster::block_on(preprocessor.process("a { color: red; }", Some(&options), None))
            .unwrap();
        assert_eq!(out, "A { COLOR: RED; }");
    }

    #[test]
    fn test_debug_hook_can_drop_stages() {
        let options = Configuration::new()
            .with_lint(false)
            .with_debug_hook(crate::config::DebugHook::new(|stages| {
                stages.retain(|s| s.name() != "vendor-prefix")
            }));
        let run = Preprocessor::new()
            .prepare(".a { user-select: none; }", Some(&options), None)
            .unwrap();
        assert!(!run.stage_names().contains(&"vendor-prefix"));

        let output = pollster::block_on(run.execute()).unwrap();
        assert_eq!(output.css, ".a { user-select: none; }");
    }

    #[test]
    fn test_process_value_rejects_non_object_options() {
        let err = pollster::block_on(Preprocessor::new().process_value(
            json!("a{}"),
            Some(json!(["minify"])),
            None,
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
