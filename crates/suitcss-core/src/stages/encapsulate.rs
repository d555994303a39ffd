/*
 * stages/encapsulate.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Component style encapsulation.
 */

//! The `encapsulate` stage.
//!
//! Resets inherited styles on component roots so a component renders the
//! same wherever it is placed. A rule is a component root when every
//! selector in its list is a bare SUIT component or descendant class
//! (`.Button`, `.Button-icon`, `.ns-Button`), with no modifiers, states,
//! pseudo-classes or combinators.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::parse_settings;
use crate::config::stage_ids::ENCAPSULATE;
use crate::css;
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

static COMPONENT_ROOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.(?:[a-z0-9]+-)?[A-Z][a-zA-Z0-9]*(?:-[a-zA-Z0-9]+)?$")
        .expect("valid component root regex")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct EncapsulateSettings {
    /// Value given to the `all` shorthand
    reset: String,
}

impl Default for EncapsulateSettings {
    fn default() -> Self {
        Self {
            reset: "initial".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncapsulateStage {
    settings: EncapsulateSettings,
}

impl EncapsulateStage {
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        Ok(Self {
            settings: parse_settings(ENCAPSULATE, settings)?,
        })
    }
}

fn is_component_root(selector: &str) -> bool {
    selector
        .split(',')
        .all(|part| COMPONENT_ROOT.is_match(part.trim()))
}

#[async_trait]
impl Stage for EncapsulateStage {
    fn name(&self) -> &str {
        ENCAPSULATE
    }

    async fn run(&self, css: String, _ctx: &mut StageContext) -> Result<String, PipelineError> {
        let stripped = css::strip_comments(&css);
        let reset = format!(" all: {};", self.settings.reset);

        let edits = css::rules(&stripped)
            .into_iter()
            .filter(|rule| is_component_root(&rule.selector))
            .filter(|rule| {
                !css::declarations(&stripped, rule.body.clone())
                    .iter()
                    .any(|d| d.property == "all")
            })
            .map(|rule| (rule.body.start..rule.body.start, reset.clone()))
            .collect();

        Ok(css::apply_edits(&css, edits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::Linter;
    use serde_json::json;
    use std::sync::Arc;

    fn run(settings: Value, css: &str) -> String {
        let stage = EncapsulateStage::from_settings(&settings).unwrap();
        let mut ctx = StageContext::new(Arc::new(Linter::disabled()));
        pollster::block_on(stage.run(css.to_string(), &mut ctx)).unwrap()
    }

    #[test]
    fn test_component_roots() {
        for selector in [".Button", ".Button-icon", ".ns-Button", ".Button, .Card"] {
            assert!(is_component_root(selector), "{}", selector);
        }
        for selector in [
            ".Button--primary",
            ".Button.is-active",
            ".Button:hover",
            ".Card .Button",
            ".u-textCenter",
            "div",
        ] {
            assert!(!is_component_root(selector), "{}", selector);
        }
    }

    #[test]
    fn test_inserts_reset() {
        let css = ".Button { color: red; }\n.Button--primary { color: blue; }";
        assert_eq!(
            run(Value::Null, css),
            ".Button { all: initial; color: red; }\n.Button--primary { color: blue; }"
        );
    }

    #[test]
    fn test_existing_all_is_kept() {
        let css = ".Button { all: unset; }";
        assert_eq!(run(Value::Null, css), css);
    }

    #[test]
    fn test_custom_reset_value() {
        assert_eq!(run(json!({"reset": "revert"}), ".Card{}"), ".Card{ all: revert;}");
        assert!(EncapsulateStage::from_settings(&json!({"rulesMatcher": "bem"})).is_err());
    }
}
