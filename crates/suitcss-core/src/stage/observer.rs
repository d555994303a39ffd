/*
 * stage/observer.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Progress notifications for a preprocessing run.
 */

//! Run observers.
//!
//! [`Pipeline`](super::Pipeline) announces each stage it runs, and stages
//! may emit free-form notes, through a [`PipelineObserver`]. The core never
//! logs on its own; the CLI installs [`TracingObserver`].

use crate::error::PipelineError;

/// Importance of a free-form note. Ordered from least to most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

/// Receives progress for one run. Every method defaults to doing nothing.
///
/// Stage positions are zero-based; `total` counts the import stage.
pub trait PipelineObserver: Send + Sync {
    fn on_pipeline_start(&self, _total_stages: usize) {}

    fn on_stage_start(&self, _name: &str, _index: usize, _total: usize) {}

    fn on_stage_complete(&self, _name: &str, _index: usize, _total: usize) {}

    /// The stage at `index` failed; the run stops after this.
    fn on_stage_error(&self, _name: &str, _index: usize, _error: &PipelineError) {}

    fn on_event(&self, _message: &str, _level: EventLevel) {}

    fn on_pipeline_complete(&self) {}

    fn on_pipeline_error(&self, _error: &PipelineError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Forwards run progress to `tracing`. Stage boundaries are `debug`, run
/// boundaries `info`, failures `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_pipeline_start(&self, total_stages: usize) {
        tracing::info!(stages = total_stages, "preprocessing");
    }

    fn on_stage_start(&self, name: &str, index: usize, total: usize) {
        tracing::debug!(stage = name, "[{}/{}] running", index + 1, total);
    }

    fn on_stage_complete(&self, name: &str, index: usize, total: usize) {
        tracing::debug!(stage = name, "[{}/{}] done", index + 1, total);
    }

    fn on_stage_error(&self, name: &str, index: usize, error: &PipelineError) {
        tracing::error!(stage = name, position = index + 1, "{}", error);
    }

    fn on_event(&self, message: &str, level: EventLevel) {
        match level {
            EventLevel::Trace => tracing::trace!(message),
            EventLevel::Debug => tracing::debug!(message),
            EventLevel::Info => tracing::info!(message),
            EventLevel::Warn => tracing::warn!(message),
        }
    }

    fn on_pipeline_complete(&self) {
        tracing::info!("preprocessing finished");
    }

    fn on_pipeline_error(&self, error: &PipelineError) {
        tracing::debug!(kind = ?error.kind(), "preprocessing aborted");
    }
}

/// Send a formatted note to the observer of a [`StageContext`](super::StageContext).
///
/// ```ignore
/// trace_event!(ctx, EventLevel::Debug, "inlined {} imports", count);
/// ```
#[macro_export]
macro_rules! trace_event {
    ($ctx:expr, $level:expr, $($arg:tt)*) => {{
        $ctx.observer.on_event(&format!($($arg)*), $level);
    }};
}
