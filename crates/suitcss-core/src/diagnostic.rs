/*
 * diagnostic.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Non-fatal lint findings.
 */

//! Diagnostic messages produced by the linters and stages.
//!
//! Diagnostics never abort a pipeline run. They are collected on the
//! [`StageContext`](crate::stage::StageContext) and flushed by the
//! reporting stage.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// One-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// A single lint or stage finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// Rule or stage that produced the finding (e.g. `block-no-empty`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// File the finding refers to; `None` for the top-level input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            rule: None,
            source: None,
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn with_source(mut self, source: Option<PathBuf>) -> Self {
        self.source = source;
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(SourceLocation { line, column });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(path) => write!(f, "{}", path.display())?,
            None => write!(f, "<input>")?,
        }
        if let Some(loc) = self.location {
            write!(f, ":{}:{}", loc.line, loc.column)?;
        }
        write!(f, " {}: {}", self.severity.as_str(), self.message)?;
        if let Some(rule) = &self.rule {
            write!(f, " ({})", rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let d = Diagnostic::warning("Unexpected empty block")
            .with_rule("block-no-empty")
            .with_source(Some(PathBuf::from("button.css")))
            .at(3, 1);
        assert_eq!(
            d.to_string(),
            "button.css:3:1 warning: Unexpected empty block (block-no-empty)"
        );
    }

    #[test]
    fn test_display_without_source() {
        let d = Diagnostic::error("bad");
        assert_eq!(d.to_string(), "<input> error: bad");
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let d = Diagnostic::warning("w");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["severity"], "warning");
        assert!(json.get("rule").is_none());
        assert!(json.get("location").is_none());
    }
}
