/*
 * stage/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage pipeline infrastructure.
 */

//! Stage pipeline infrastructure.
//!
//! A preprocessing run is a linear chain of **stages**, each implementing
//! [`Stage`]. CSS text flows from one stage to the next:
//!
//! ```text
//! lint(top level) → import → user stages → [encapsulate] → vendor-prefix → report → [minify]
//! ```
//!
//! # Key Types
//!
//! - [`Stage`] - Trait for pipeline stages
//! - [`Pipeline`] - Ordered stage list with execution logic
//! - [`StageContext`] - Owned context passed to stages
//! - [`PipelineObserver`] - Trait for tracing and progress events

mod context;
mod observer;
mod pipeline;
mod traits;

pub use context::StageContext;
pub use observer::{EventLevel, NoopObserver, PipelineObserver, TracingObserver};
pub use pipeline::Pipeline;
pub use traits::{FnStage, Stage};
