/*
 * stage/context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage execution context (the "activation frame" pattern).
 */

//! Stage execution context.
//!
//! The [`StageContext`] is the owned context passed to every stage of a
//! run. Shared collaborators are held behind `Arc` and per-run state is
//! owned, so futures borrowing the context carry no extra lifetimes.

use std::path::PathBuf;
use std::sync::Arc;

use super::observer::{NoopObserver, PipelineObserver};
use crate::diagnostic::Diagnostic;
use crate::import::{FsLoader, ImportLoader, WatchHook};
use crate::lint::Linter;
use crate::stages::report::{ReportSink, TracingReportSink};

/// Owned context passed to all stages.
pub struct StageContext {
    // === Run inputs ===
    /// File the input CSS came from, used for diagnostics and as the base
    /// for relative imports
    pub filename: Option<PathBuf>,

    /// Fallback directory for resolving imports
    pub import_root: Option<PathBuf>,

    // === Shared collaborators ===
    pub linter: Arc<Linter>,

    /// Source of imported files
    pub loader: Arc<dyn ImportLoader>,

    /// Notified with the files touched by import resolution
    pub watch: WatchHook,

    /// Destination for diagnostics flushed by the report stage
    pub report_sink: Arc<dyn ReportSink>,

    pub observer: Arc<dyn PipelineObserver>,

    // === Mutable state ===
    /// Diagnostics collected during the run, in discovery order
    pub diagnostics: Vec<Diagnostic>,

    /// Number of leading `diagnostics` already cleared by a report stage
    pub reported: usize,

    /// Files inlined by import resolution, in encounter order
    pub imported_files: Vec<PathBuf>,
}

impl StageContext {
    /// Create a context with default collaborators: the filesystem loader,
    /// no watch hook, the tracing report sink, and the no-op observer.
    pub fn new(linter: Arc<Linter>) -> Self {
        Self {
            filename: None,
            import_root: None,
            linter,
            loader: Arc::new(FsLoader),
            watch: WatchHook::default(),
            report_sink: Arc::new(TracingReportSink),
            observer: Arc::new(NoopObserver),
            diagnostics: Vec::new(),
            reported: 0,
            imported_files: Vec::new(),
        }
    }

    pub fn with_filename(mut self, filename: Option<PathBuf>) -> Self {
        self.filename = filename;
        self
    }

    pub fn with_import_root(mut self, root: Option<PathBuf>) -> Self {
        self.import_root = root;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ImportLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_watch(mut self, watch: WatchHook) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink = sink;
        self
    }

    /// Set a custom observer for tracing and progress.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn add_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Diagnostics not yet cleared by a report stage.
    pub fn pending_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics[self.reported.min(self.diagnostics.len())..]
    }

    /// Mark every diagnostic collected so far as reported.
    pub fn clear_pending(&mut self) {
        self.reported = self.diagnostics.len();
    }
}
