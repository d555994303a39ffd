/*
 * lint/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Linter facade over the style and naming-convention checks.
 */

//! Linting.
//!
//! The [`Linter`] runs a fixed sequence of [`LintCheck`]s over a CSS
//! fragment: the general style linter first, then the naming-convention
//! linter. Findings are returned as [`Diagnostic`]s in a [`LintResult`];
//! nothing a check does can abort the pipeline. A check that fails
//! outright is itself reported as a warning.
//!
//! Linting never changes the CSS text. The returned `css` is the input.

mod naming;
mod style;

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;

use crate::config::EffectiveConfiguration;
use crate::config::stage_ids::{NAMING_LINT, STYLE_LINT};
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;

pub use naming::{NamingLint, NamingPreset};
pub use style::StyleLint;

/// Outcome of linting one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintResult {
    pub css: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// A single lint collaborator.
#[async_trait]
pub trait LintCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Check `css`, returning findings. An `Err` means the check itself
    /// could not run.
    async fn check(
        &self,
        css: &str,
        filename: Option<&Path>,
    ) -> Result<Vec<Diagnostic>, PipelineError>;
}

/// Runs every configured [`LintCheck`] in order.
pub struct Linter {
    enabled: bool,
    checks: Vec<Box<dyn LintCheck>>,
}

impl Linter {
    /// An enabled linter with the given checks.
    pub fn new(checks: Vec<Box<dyn LintCheck>>) -> Self {
        Self {
            enabled: true,
            checks,
        }
    }

    /// A linter that reports nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            checks: Vec::new(),
        }
    }

    /// Build the standard linter (style, then naming) from a run's
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the `lint-style` or `naming` settings are
    /// malformed.
    pub fn from_config(config: &EffectiveConfiguration) -> Result<Self, PipelineError> {
        if !config.lint_enabled {
            return Ok(Self::disabled());
        }
        let style = StyleLint::from_settings(config.settings_for(STYLE_LINT))?;
        let naming = NamingLint::from_settings(config.settings_for(NAMING_LINT))?;
        Ok(Self::new(vec![Box::new(style), Box::new(naming)]))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Lint an immediate CSS string.
    pub async fn lint(&self, css: String, filename: Option<&Path>) -> LintResult {
        if !self.enabled {
            return LintResult {
                css,
                diagnostics: Vec::new(),
            };
        }

        let source = filename.map(Path::to_path_buf);
        let mut diagnostics = Vec::new();
        for check in &self.checks {
            match check.check(&css, filename).await {
                Ok(found) => diagnostics.extend(found.into_iter().map(|d| {
                    if d.source.is_none() {
                        d.with_source(source.clone())
                    } else {
                        d
                    }
                })),
                Err(err) => {
                    tracing::debug!(check = check.name(), error = %err, "lint check failed");
                    diagnostics.push(
                        Diagnostic::warning(format!("lint check '{}' failed: {}", check.name(), err))
                            .with_rule(check.name())
                            .with_source(source.clone()),
                    );
                }
            }
        }

        LintResult { css, diagnostics }
    }

    /// Lint a CSS string that is still being produced.
    ///
    /// A failure of the deferred value itself is fatal and propagated.
    pub async fn lint_deferred<F>(
        &self,
        css: F,
        filename: Option<&Path>,
    ) -> Result<LintResult, PipelineError>
    where
        F: Future<Output = Result<String, PipelineError>> + Send,
    {
        let css = css.await?;
        Ok(self.lint(css, filename).await)
    }
}

impl std::fmt::Debug for Linter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linter")
            .field("enabled", &self.enabled)
            .field("checks", &self.check_names())
            .finish()
    }
}
