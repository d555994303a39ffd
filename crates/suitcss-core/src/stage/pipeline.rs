/*
 * stage/pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Pipeline struct for executing stage sequences.
 */

//! Pipeline execution.
//!
//! A [`Pipeline`] is the import stage followed by the remaining stages of
//! a run, already instantiated and ordered. Running it:
//!
//! 1. lints the top-level document,
//! 2. runs the import stage,
//! 3. threads the CSS through every remaining stage in order.
//!
//! Stages run strictly one after another. The first error aborts the run
//! and no partial output is returned.

use super::context::StageContext;
use super::traits::Stage;
use crate::error::PipelineError;

/// An ordered, instantiated stage list.
///
/// # Example
///
/// ```ignore
/// use suitcss_core::stage::{Pipeline, StageContext};
///
/// let pipeline = Pipeline::new(import_stage, vec![calc, vendor_prefix, report]);
/// let css = pipeline.run(input, &mut ctx).await?;
/// ```
pub struct Pipeline {
    import: Box<dyn Stage>,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create a pipeline. `import` always runs before `stages`.
    pub fn new(import: Box<dyn Stage>, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { import, stages }
    }

    /// Number of stages, including the import stage.
    pub fn len(&self) -> usize {
        self.stages.len() + 1
    }

    /// Always false; the import stage is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        std::iter::once(self.import.name())
            .chain(self.stages.iter().map(|s| s.name()))
            .collect()
    }

    /// Run the pipeline over `css`.
    ///
    /// # Observer Notifications
    ///
    /// Notifies the context's observer before and after each stage, and on
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage.
    pub async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError> {
        let total = self.len();
        ctx.observer.on_pipeline_start(total);

        // Top-level lint runs before import expansion.
        let linter = ctx.linter.clone();
        let linted = linter.lint(css, ctx.filename.as_deref()).await;
        ctx.add_diagnostics(linted.diagnostics);

        let mut css = linted.css;
        let chain = std::iter::once(&self.import).chain(self.stages.iter());
        for (idx, stage) in chain.enumerate() {
            ctx.observer.on_stage_start(stage.name(), idx, total);

            match stage.run(css, ctx).await {
                Ok(output) => {
                    ctx.observer.on_stage_complete(stage.name(), idx, total);
                    css = output;
                }
                Err(e) => {
                    ctx.observer.on_stage_error(stage.name(), idx, &e);
                    ctx.observer.on_pipeline_error(&e);
                    return Err(e);
                }
            }
        }

        ctx.observer.on_pipeline_complete();
        Ok(css)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
