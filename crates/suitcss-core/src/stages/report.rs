/*
 * stages/report.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Diagnostic reporting stage.
 */

//! The `report` stage.
//!
//! Flushes the diagnostics collected so far to the run's [`ReportSink`].
//! The CSS passes through untouched. With `clearMessages` (the default)
//! flushed diagnostics are not flushed again by a later report stage;
//! they always remain available on the run's output.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::parse_settings;
use crate::config::stage_ids::REPORT;
use crate::diagnostic::{Diagnostic, Severity};
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

/// Destination for reported diagnostics.
pub trait ReportSink: Send + Sync {
    fn report(&self, diagnostics: &[Diagnostic]);
}

/// Emits one `tracing` event per diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn report(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            let rule = diagnostic.rule.as_deref().unwrap_or("");
            match diagnostic.severity {
                Severity::Error => tracing::error!(rule, "{}", diagnostic),
                Severity::Warning => tracing::warn!(rule, "{}", diagnostic),
                Severity::Info => tracing::info!(rule, "{}", diagnostic),
            }
        }
    }
}

/// Keeps reported diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    reported: Mutex<Vec<Diagnostic>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far, in order.
    pub fn reported(&self) -> Vec<Diagnostic> {
        self.reported
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for MemoryReportSink {
    fn report(&self, diagnostics: &[Diagnostic]) {
        if let Ok(mut guard) = self.reported.lock() {
            guard.extend_from_slice(diagnostics);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReportSettings {
    clear_messages: bool,
    /// Fail the run when an error-severity diagnostic is reported
    throw_error: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            clear_messages: true,
            throw_error: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportStage {
    settings: ReportSettings,
}

impl ReportStage {
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        Ok(Self {
            settings: parse_settings(REPORT, settings)?,
        })
    }
}

#[async_trait]
impl Stage for ReportStage {
    fn name(&self) -> &str {
        REPORT
    }

    async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError> {
        let pending = ctx.pending_diagnostics();
        if !pending.is_empty() {
            ctx.report_sink.report(pending);
        }
        let errors = pending
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();

        if self.settings.clear_messages {
            ctx.clear_pending();
        }
        if self.settings.throw_error && errors > 0 {
            return Err(PipelineError::stage_failure(
                REPORT,
                format!("{} error(s) reported", errors),
            ));
        }
        Ok(css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::Linter;
    use serde_json::json;
    use std::sync::Arc;

    fn context(sink: &Arc<MemoryReportSink>) -> StageContext {
        StageContext::new(Arc::new(Linter::disabled())).with_report_sink(sink.clone())
    }

    #[tokio::test]
    async fn test_clear_messages_reports_once() {
        let sink = Arc::new(MemoryReportSink::new());
        let mut ctx = context(&sink);
        ctx.add_diagnostic(Diagnostic::warning("first"));

        let stage = ReportStage::from_settings(&Value::Null).unwrap();
        let out = stage.run("a{}".to_string(), &mut ctx).await.unwrap();
        assert_eq!(out, "a{}");
        stage.run(out, &mut ctx).await.unwrap();

        assert_eq!(sink.reported().len(), 1);
        assert_eq!(ctx.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_keep_messages() {
        let sink = Arc::new(MemoryReportSink::new());
        let mut ctx = context(&sink);
        ctx.add_diagnostic(Diagnostic::warning("first"));

        let stage = ReportStage::from_settings(&json!({"clearMessages": false})).unwrap();
        stage.run(String::new(), &mut ctx).await.unwrap();
        stage.run(String::new(), &mut ctx).await.unwrap();
        assert_eq!(sink.reported().len(), 2);
    }

    #[tokio::test]
    async fn test_throw_error() {
        let sink = Arc::new(MemoryReportSink::new());
        let mut ctx = context(&sink);
        ctx.add_diagnostic(Diagnostic::error("bad hex"));
        ctx.add_diagnostic(Diagnostic::warning("meh"));

        let lenient = ReportStage::from_settings(&json!({"clearMessages": false})).unwrap();
        assert!(lenient.run(String::new(), &mut ctx).await.is_ok());

        let strict = ReportStage::from_settings(&json!({"throwError": true})).unwrap();
        let err = strict.run(String::new(), &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("1 error(s) reported"));
    }

    #[test]
    fn test_bad_settings() {
        assert!(ReportStage::from_settings(&json!({"clearMessages": 1})).is_err());
    }
}
