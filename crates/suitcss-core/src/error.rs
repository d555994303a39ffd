/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for the preprocessing pipeline.
 */

//! Error types for suitcss-core.
//!
//! Every failure surfaced by [`crate::process`] is a [`PipelineError`].
//! Lint findings are never errors; they travel as
//! [`Diagnostic`](crate::Diagnostic) values instead.

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal error raised while preparing or running a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input CSS was not a string, or the options were malformed.
    #[error("suitcss: invalid input: {0}")]
    InvalidInput(String),

    /// A configured stage identifier has no registered implementation.
    #[error("suitcss: no stage registered under '{stage}'")]
    UnresolvedStage {
        /// The identifier that failed to resolve
        stage: String,
    },

    /// An `@import` could not be located.
    #[error("suitcss: import '{path}' not found (imported from {from})")]
    ImportNotFound {
        /// The path as written in the `@import`
        path: String,
        /// The importing file, or `<input>` for the top-level document
        from: String,
    },

    /// A stage's transformation failed.
    #[error("suitcss: stage '{stage}' failed: {message}")]
    StageFailure {
        /// Name of the stage that failed
        stage: String,
        /// Failure description
        message: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("suitcss: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnresolvedStage,
    ImportNotFound,
    StageExecutionFailure,
}

impl PipelineError {
    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a StageFailure error.
    pub fn stage_failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidInput(_) | PipelineError::Config(_) => ErrorKind::InvalidInput,
            PipelineError::UnresolvedStage { .. } => ErrorKind::UnresolvedStage,
            PipelineError::ImportNotFound { .. } => ErrorKind::ImportNotFound,
            PipelineError::StageFailure { .. } | PipelineError::Io(_) => {
                ErrorKind::StageExecutionFailure
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            PipelineError::invalid_input("x").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            PipelineError::UnresolvedStage {
                stage: "nope".into()
            }
            .kind(),
            ErrorKind::UnresolvedStage
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(
            PipelineError::from(io).kind(),
            ErrorKind::StageExecutionFailure
        );
    }

    #[test]
    fn test_import_not_found_message() {
        let err = PipelineError::ImportNotFound {
            path: "missing.css".into(),
            from: "a.css".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing.css"));
        assert!(msg.contains("not found"));
        assert!(msg.contains("a.css"));
    }

    #[test]
    fn test_stage_failure_message() {
        let err = PipelineError::stage_failure("minify", "unexpected token");
        assert_eq!(
            err.to_string(),
            "suitcss: stage 'minify' failed: unexpected token"
        );
    }
}
