/*
 * stages/custom_media.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Custom media query expansion.
 */

//! The `custom-media` stage.
//!
//! `@custom-media --name <query>;` defines an alias that `@media` rules
//! reference as `(--name)`.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::parse_settings;
use crate::config::stage_ids::CUSTOM_MEDIA;
use crate::css;
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@custom-media\s+(--[A-Za-z0-9_-]+)\s+([^;{}]+);\s*")
        .expect("valid custom media regex")
});

static MEDIA_PRELUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@media\s([^{;]+)\{").expect("valid media regex"));

static EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(--[A-Za-z0-9_-]+)\s*\)").expect("valid extension regex")
});

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CustomMediaSettings {
    /// Keep the `@custom-media` definitions in the output
    preserve: bool,
}

#[derive(Debug, Clone)]
pub struct CustomMediaStage {
    settings: CustomMediaSettings,
}

impl CustomMediaStage {
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        Ok(Self {
            settings: parse_settings(CUSTOM_MEDIA, settings)?,
        })
    }
}

#[async_trait]
impl Stage for CustomMediaStage {
    fn name(&self) -> &str {
        CUSTOM_MEDIA
    }

    async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError> {
        let stripped = css::strip_comments(&css);
        let mut edits = Vec::new();

        let mut definitions: HashMap<String, String> = HashMap::new();
        for caps in DEFINITION.captures_iter(&stripped) {
            let (Some(whole), Some(name), Some(query)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            definitions.insert(name.as_str().to_string(), query.as_str().trim().to_string());
            if !self.settings.preserve {
                edits.push((whole.range(), String::new()));
            }
        }

        for caps in MEDIA_PRELUDE.captures_iter(&stripped) {
            let Some(prelude) = caps.get(1) else {
                continue;
            };
            for ext in EXTENSION.captures_iter(prelude.as_str()) {
                let (Some(whole), Some(name)) = (ext.get(0), ext.get(1)) else {
                    continue;
                };
                let range = prelude.start() + whole.start()..prelude.start() + whole.end();
                match expand(name.as_str(), &definitions, 0) {
                    Some(query) => edits.push((range, query)),
                    None => {
                        let (line, column) = css::line_col(&css, range.start);
                        ctx.add_diagnostic(
                            Diagnostic::warning(format!(
                                "missing @custom-media definition for '{}'",
                                name.as_str()
                            ))
                            .with_rule(CUSTOM_MEDIA)
                            .with_source(ctx.filename.clone())
                            .at(line, column),
                        );
                    }
                }
            }
        }

        Ok(css::apply_edits(&css, edits))
    }
}

/// Resolve `name`, expanding aliases used inside other definitions.
fn expand(name: &str, definitions: &HashMap<String, String>, depth: usize) -> Option<String> {
    if depth > 8 {
        return None;
    }
    let query = definitions.get(name)?;
    let mut out = String::with_capacity(query.len());
    let mut cursor = 0;
    for ext in EXTENSION.captures_iter(query) {
        let (whole, inner) = (ext.get(0)?, ext.get(1)?);
        out.push_str(&query[cursor..whole.start()]);
        out.push_str(&expand(inner.as_str(), definitions, depth + 1)?);
        cursor = whole.end();
    }
    out.push_str(&query[cursor..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::Linter;
    use serde_json::json;
    use std::sync::Arc;

    fn run(settings: Value, css: &str) -> (String, StageContext) {
        let stage = CustomMediaStage::from_settings(&settings).unwrap();
        let mut ctx = StageContext::new(Arc::new(Linter::disabled()));
        let out = pollster::block_on(stage.run(css.to_string(), &mut ctx)).unwrap();
        (out, ctx)
    }

    #[test]
    fn test_expands_and_removes_definitions() {
        let css = "@custom-media --sm (min-width: 30em);\n@media (--sm) { .a { margin: 0; } }";
        let (out, ctx) = run(Value::Null, css);
        assert_eq!(out, "@media (min-width: 30em) { .a { margin: 0; } }");
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_nested_definitions_and_combinations() {
        let css = "@custom-media --sm (min-width: 30em);\n@custom-media --sm-screen screen and (--sm);\n@media (--sm-screen) and (orientation: landscape) { .a { margin: 0; } }";
        let (out, _) = run(Value::Null, css);
        assert_eq!(
            out,
            "@media screen and (min-width: 30em) and (orientation: landscape) { .a { margin: 0; } }"
        );
    }

    #[test]
    fn test_preserve() {
        let css = "@custom-media --sm (min-width: 30em);\n@media (--sm) {}";
        let (out, _) = run(json!({"preserve": true}), css);
        assert_eq!(out, "@custom-media --sm (min-width: 30em);\n@media (min-width: 30em) {}");
    }

    #[test]
    fn test_missing_definition_warns() {
        let css = "@media (--nope) { .a { margin: 0; } }";
        let (out, ctx) = run(Value::Null, css);
        assert_eq!(out, css);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(ctx.diagnostics[0].message.contains("--nope"));
    }
}
