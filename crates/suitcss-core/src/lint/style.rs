//! General style linter.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::LintCheck;
use crate::css;
use crate::diagnostic::{Diagnostic, Severity};
use crate::error::PipelineError;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([0-9a-zA-Z]+)\b").expect("valid hex color regex"));

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StyleRules {
    #[serde(rename = "block-no-empty")]
    block_no_empty: bool,
    #[serde(rename = "declaration-no-important")]
    declaration_no_important: bool,
    #[serde(rename = "color-no-invalid-hex")]
    color_no_invalid_hex: bool,
}

impl Default for StyleRules {
    fn default() -> Self {
        Self {
            block_no_empty: true,
            declaration_no_important: true,
            color_no_invalid_hex: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StyleSettings {
    rules: StyleRules,
}

/// Rule-based style checks in the manner of stylelint.
///
/// Settings (`lint-style`): `{"rules": {"block-no-empty": bool,
/// "declaration-no-important": bool, "color-no-invalid-hex": bool}}`; all
/// rules default to enabled.
#[derive(Debug, Clone)]
pub struct StyleLint {
    rules: StyleRules,
}

impl StyleLint {
    pub fn from_settings(settings: Option<&Value>) -> Result<Self, PipelineError> {
        let settings: StyleSettings = match settings {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                PipelineError::invalid_input(format!("invalid lint-style settings: {}", e))
            })?,
            None => StyleSettings::default(),
        };
        Ok(Self {
            rules: settings.rules,
        })
    }

    fn lint_source(&self, source: &str) -> Vec<Diagnostic> {
        let src = css::strip_comments(source);
        let mut found = Vec::new();

        for rule in css::rules(&src) {
            if self.rules.block_no_empty && src[rule.body.clone()].trim().is_empty() {
                let (line, column) = css::line_col(&src, rule.prelude.start);
                found.push(
                    Diagnostic::warning(format!("Unexpected empty block in \"{}\"", rule.selector))
                        .with_rule("block-no-empty")
                        .at(line, column),
                );
            }

            for decl in css::declarations(&src, rule.body.clone()) {
                if self.rules.declaration_no_important && decl.important {
                    let (line, column) = css::line_col(&src, decl.range.start);
                    found.push(
                        Diagnostic::warning(format!(
                            "Unexpected !important on \"{}\"",
                            decl.property
                        ))
                        .with_rule("declaration-no-important")
                        .at(line, column),
                    );
                }

                if self.rules.color_no_invalid_hex {
                    for caps in HEX_COLOR.captures_iter(&decl.value) {
                        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
                            continue;
                        };
                        if is_valid_hex(digits.as_str()) {
                            continue;
                        }
                        let (line, column) =
                            css::line_col(&src, decl.value_range.start + whole.start());
                        found.push(
                            Diagnostic::new(
                                Severity::Error,
                                format!("Unexpected invalid hex color \"{}\"", whole.as_str()),
                            )
                            .with_rule("color-no-invalid-hex")
                            .at(line, column),
                        );
                    }
                }
            }
        }

        found
    }
}

fn is_valid_hex(digits: &str) -> bool {
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl LintCheck for StyleLint {
    fn name(&self) -> &str {
        "lint-style"
    }

    async fn check(
        &self,
        css: &str,
        _filename: Option<&Path>,
    ) -> Result<Vec<Diagnostic>, PipelineError> {
        Ok(self.lint_source(css))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lint(css: &str) -> Vec<Diagnostic> {
        StyleLint::from_settings(None).unwrap().lint_source(css)
    }

    #[test]
    fn test_empty_block() {
        let found = lint("body {}\n.a { color: red; }");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule.as_deref(), Some("block-no-empty"));
        assert_eq!(found[0].location.map(|l| l.line), Some(1));
    }

    #[test]
    fn test_comment_only_block_is_empty() {
        let found = lint(".a { /* todo */ }");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_important() {
        let found = lint(".a {\n  color: red !important;\n}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule.as_deref(), Some("declaration-no-important"));
        assert_eq!(found[0].location.map(|l| (l.line, l.column)), Some((2, 3)));
    }

    #[test]
    fn test_invalid_hex() {
        let found = lint(".a { color: #fff; background: #12345; border-color: #zzz; }");
        let messages: Vec<&str> = found.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Unexpected invalid hex color \"#12345\"",
                "Unexpected invalid hex color \"#zzz\"",
            ]
        );
        assert!(found.iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn test_rules_can_be_disabled() {
        let style = StyleLint::from_settings(Some(&json!({
            "rules": {"block-no-empty": false}
        })))
        .unwrap();
        assert!(style.lint_source("body {}").is_empty());
    }

    #[test]
    fn test_unknown_rule_is_rejected() {
        let err = StyleLint::from_settings(Some(&json!({"rules": {"no-such-rule": true}})))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
