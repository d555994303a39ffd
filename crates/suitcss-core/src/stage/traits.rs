/*
 * stage/traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage trait definition.
 */

//! The [`Stage`] trait.
//!
//! Stages are the building blocks of the preprocessing pipeline. Each one
//! takes the current CSS text and produces the next.

use async_trait::async_trait;

use super::context::StageContext;
use crate::error::PipelineError;

/// A single named transformation in the pipeline.
///
/// # Design
///
/// - **Always async**: even instantaneous stages return a future, so the
///   pipeline composes every stage the same way.
/// - **No state between runs**: stages may hold their settings, but all
///   per-run state (diagnostics, imported files) lives in [`StageContext`].
/// - **Non-fatal findings** go to `ctx.diagnostics`; returning `Err`
///   aborts the whole run.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use suitcss_core::stage::{Stage, StageContext};
/// use suitcss_core::PipelineError;
///
/// pub struct Uppercase;
///
/// #[async_trait]
/// impl Stage for Uppercase {
///     fn name(&self) -> &str { "uppercase" }
///
///     async fn run(&self, css: String, _ctx: &mut StageContext) -> Result<String, PipelineError> {
///         Ok(css.to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Transform `css`.
    async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError>;
}

/// Adapter turning a synchronous closure into a [`Stage`].
pub struct FnStage<F> {
    name: String,
    transform: F,
}

impl<F> FnStage<F>
where
    F: Fn(String) -> Result<String, PipelineError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, transform: F) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(String) -> Result<String, PipelineError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, css: String, _ctx: &mut StageContext) -> Result<String, PipelineError> {
        (self.transform)(css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::Linter;
    use std::sync::Arc;

    #[test]
    fn test_fn_stage() {
        let stage = FnStage::new("shout", |css: String| Ok(css.to_uppercase()));
        assert_eq!(stage.name(), "shout");

        let mut ctx = StageContext::new(Arc::new(Linter::disabled()));
        let out = pollster::block_on(stage.run("a{}".to_string(), &mut ctx)).unwrap();
        assert_eq!(out, "A{}");
    }

    #[test]
    fn test_fn_stage_error() {
        let stage = FnStage::new("fail", |_css: String| {
            Err(PipelineError::stage_failure("fail", "Intentional failure"))
        });
        let mut ctx = StageContext::new(Arc::new(Linter::disabled()));
        let err = pollster::block_on(stage.run(String::new(), &mut ctx)).unwrap_err();
        assert!(err.to_string().contains("Intentional failure"));
    }
}
