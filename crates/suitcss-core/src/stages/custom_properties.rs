/*
 * stages/custom_properties.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Custom property substitution.
 */

//! The `custom-properties` stage.
//!
//! Custom properties declared on `:root` are substituted into every
//! `var()` reference. A reference to an undefined property without a
//! fallback is left in place and reported as a warning.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::parse_settings;
use crate::config::stage_ids::CUSTOM_PROPERTIES;
use crate::css::{self, Declaration};
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

/// Guards against definitions that reference each other.
const MAX_DEPTH: usize = 16;

/// Upper bound on the work spent expanding one declaration: one unit per
/// `var()` visited plus one per byte produced.
const MAX_EXPANSION: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CustomPropertiesSettings {
    /// Keep the `:root` definitions and the original `var()` declarations
    preserve: bool,
}

#[derive(Debug, Clone)]
pub struct CustomPropertiesStage {
    settings: CustomPropertiesSettings,
}

impl CustomPropertiesStage {
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        Ok(Self {
            settings: parse_settings(CUSTOM_PROPERTIES, settings)?,
        })
    }

    /// Returns the rewritten CSS and warnings as `(message, offset)`.
    fn transform(&self, src: &str) -> (String, Vec<(String, usize)>) {
        let stripped = css::strip_comments(src);
        let rules = css::rules(&stripped);

        let mut definitions: HashMap<String, String> = HashMap::new();
        for rule in rules.iter().filter(|r| r.selector == ":root") {
            for decl in css::declarations(&stripped, rule.body.clone()) {
                if decl.property.starts_with("--") {
                    definitions.insert(decl.property, decl.value);
                }
            }
        }

        let mut edits = Vec::new();
        let mut warnings = Vec::new();
        for rule in &rules {
            let is_root = rule.selector == ":root";
            let decls = css::declarations(&stripped, rule.body.clone());

            if is_root && !self.settings.preserve {
                let custom: Vec<&Declaration> =
                    decls.iter().filter(|d| d.property.starts_with("--")).collect();
                if !custom.is_empty() && custom.len() == decls.len() {
                    // An unterminated block runs to the end of the input.
                    let end = (rule.body.end + 1).min(src.len());
                    edits.push((rule.prelude.start..end, String::new()));
                    continue;
                }
                for decl in custom {
                    edits.push((decl.range.start..statement_end(&stripped, decl.range.end), String::new()));
                }
            }

            for decl in &decls {
                if decl.property.starts_with("--") || !decl.value.contains("var(") {
                    continue;
                }
                let mut expansion = Expansion::new(&definitions);
                let Some(resolved) = expansion.resolve(&decl.value, 0) else {
                    warnings.push((
                        format!(
                            "expansion of '{}' exceeds {} bytes; left unresolved",
                            decl.property, MAX_EXPANSION
                        ),
                        decl.range.start,
                    ));
                    continue;
                };
                warnings.extend(expansion.missing.into_iter().map(|name| {
                    (
                        format!("variable '{}' is undefined and used without a fallback", name),
                        decl.range.start,
                    )
                }));
                if resolved == decl.value {
                    continue;
                }

                if self.settings.preserve {
                    let important = if decl.important { " !important" } else { "" };
                    edits.push((
                        decl.range.start..decl.range.start,
                        format!("{}: {}{}; ", decl.property, resolved, important),
                    ));
                } else {
                    edits.push((decl.value_range.clone(), resolved));
                }
            }
        }

        (css::apply_edits(src, edits), warnings)
    }
}

#[async_trait]
impl Stage for CustomPropertiesStage {
    fn name(&self) -> &str {
        CUSTOM_PROPERTIES
    }

    async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError> {
        let (out, warnings) = self.transform(&css);
        for (message, offset) in warnings {
            let (line, column) = css::line_col(&css, offset);
            ctx.add_diagnostic(
                Diagnostic::warning(message)
                    .with_rule(CUSTOM_PROPERTIES)
                    .with_source(ctx.filename.clone())
                    .at(line, column),
            );
        }
        Ok(out)
    }
}

/// `var()` substitution for one declaration value.
struct Expansion<'d> {
    definitions: &'d HashMap<String, String>,
    /// Names referenced without a definition or fallback
    missing: Vec<String>,
    budget: usize,
}

impl<'d> Expansion<'d> {
    fn new(definitions: &'d HashMap<String, String>) -> Self {
        Self {
            definitions,
            missing: Vec::new(),
            budget: MAX_EXPANSION,
        }
    }

    fn spend(&mut self, cost: usize) -> Option<()> {
        self.budget = self.budget.checked_sub(cost)?;
        Some(())
    }

    /// Substitute every `var()` in `value`. Unresolvable references are
    /// kept verbatim and recorded in `missing`. Returns `None` once the
    /// expansion budget is exhausted.
    fn resolve(&mut self, value: &str, depth: usize) -> Option<String> {
        let definitions = self.definitions;
        let bytes = value.as_bytes();
        let mut out = String::with_capacity(value.len());
        let mut cursor = 0;
        let mut search = 0;

        while let Some(found) = value[search..].find("var(") {
            let start = search + found;
            let preceded_by_ident = value[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_');
            let end = css::skip_parens(bytes, start + 3, bytes.len());
            search = end;
            if preceded_by_ident || end <= start + 4 || bytes[end - 1] != b')' {
                continue;
            }
            self.spend(1)?;

            let inner = &value[start + 4..end - 1];
            let (name, fallback) = match split_top_level_comma(inner) {
                Some(comma) => (inner[..comma].trim(), Some(inner[comma + 1..].trim())),
                None => (inner.trim(), None),
            };

            let replacement = match (definitions.get(name), fallback) {
                _ if depth >= MAX_DEPTH => None,
                (Some(defined), _) => Some(self.resolve(defined, depth + 1)?),
                (None, Some(fallback)) => Some(self.resolve(fallback, depth + 1)?),
                (None, None) => {
                    self.missing.push(name.to_string());
                    None
                }
            };
            if let Some(replacement) = replacement {
                self.spend(replacement.len())?;
                out.push_str(&value[cursor..start]);
                out.push_str(&replacement);
                cursor = end;
            }
        }
        out.push_str(&value[cursor..]);
        Some(out)
    }
}

fn split_top_level_comma(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                i = css::skip_parens(bytes, i, bytes.len());
                continue;
            }
            b',' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// End of a declaration including its `;`, if any.
fn statement_end(src: &str, end: usize) -> usize {
    let rest = &src[end..];
    let trimmed = rest.trim_start();
    if trimmed.starts_with(';') {
        end + (rest.len() - trimmed.len()) + 1
    } else {
        end
    }
}
