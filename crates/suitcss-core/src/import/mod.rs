/*
 * import/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The import stage.
 */

//! Import resolution.
//!
//! [`ImportStage`] is the pipeline's first stage. It drives an
//! [`ImportResolver`] with two hooks:
//!
//! - every imported file is linted before it is spliced into its parent,
//!   so diagnostics point at the file that caused them;
//! - the flattened list of imported files is forwarded to the run's
//!   [`WatchHook`].
//!
//! A missing import is fatal; lint findings are not.

mod loader;
mod resolver;
mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::stage_ids::IMPORT;
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;
use crate::lint::Linter;
use crate::stage::{EventLevel, Stage, StageContext};
use crate::stages::parse_settings;
use crate::trace_event;

pub use loader::{FsLoader, ImportLoader, MemoryLoader};
pub use resolver::{ImportResolver, ImportTransform, NoTransform, Resolution};
pub use watch::WatchHook;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImportSettings {
    skip_duplicates: bool,
    root: Option<PathBuf>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            root: None,
        }
    }
}

/// Inlines `@import`s, linting each imported file.
#[derive(Debug, Clone)]
pub struct ImportStage {
    skip_duplicates: bool,
    root: Option<PathBuf>,
}

impl ImportStage {
    /// Build from `{ skipDuplicates, root }` settings. Other keys are
    /// ignored. The run's import root, when set, takes precedence over
    /// `root`.
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        let settings: ImportSettings = parse_settings(IMPORT, settings)?;
        Ok(Self {
            skip_duplicates: settings.skip_duplicates,
            root: settings.root,
        })
    }
}

impl Default for ImportStage {
    fn default() -> Self {
        let settings = ImportSettings::default();
        Self {
            skip_duplicates: settings.skip_duplicates,
            root: settings.root,
        }
    }
}

#[async_trait]
impl Stage for ImportStage {
    fn name(&self) -> &str {
        IMPORT
    }

    async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError> {
        let root = ctx.import_root.clone().or_else(|| self.root.clone());
        let resolver = ImportResolver::new(ctx.loader.clone())
            .with_root(root)
            .with_skip_duplicates(self.skip_duplicates);

        let mut transform = LintOnImport {
            linter: ctx.linter.clone(),
            diagnostics: Vec::new(),
        };
        let watch = ctx.watch.clone();
        let resolution = resolver
            .resolve(&css, ctx.filename.as_deref(), &mut transform, |files| {
                watch.notify(files)
            })
            .await?;

        trace_event!(
            ctx,
            EventLevel::Debug,
            "inlined {} imported file(s)",
            resolution.files.len()
        );
        ctx.add_diagnostics(transform.diagnostics);
        ctx.add_diagnostics(resolution.warnings);
        ctx.imported_files = resolution.files;
        Ok(resolution.css)
    }
}

/// Lints each imported file, keeping its diagnostics for the run.
struct LintOnImport {
    linter: Arc<Linter>,
    diagnostics: Vec<Diagnostic>,
}

#[async_trait]
impl ImportTransform for LintOnImport {
    async fn transform(&mut self, css: String, filename: &Path) -> Result<String, PipelineError> {
        let result = self
            .linter
            .lint_deferred(async move { Ok(css) }, Some(filename))
            .await?;
        self.diagnostics.extend(result.diagnostics);
        Ok(result.css)
    }
}
