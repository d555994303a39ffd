//! Naming-convention linter.
//!
//! Checks every class selector against a naming preset. `bem` (the
//! default) expects lower-case `block__element--modifier` names; `suit`
//! expects `ComponentName-descendant--modifier` components together with
//! `is-state` and `u-utility` classes.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::LintCheck;
use crate::css;
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;

static BEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*(?:__[a-z0-9]+(?:-[a-z0-9]+)*)?(?:--[a-z0-9]+(?:-[a-z0-9]+)*)?$")
        .expect("valid BEM regex")
});

static SUIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"(?:[a-z][a-zA-Z0-9]*-)?[A-Z][a-zA-Z0-9]*(?:-[a-z][a-zA-Z0-9]*)?(?:--[a-z][a-zA-Z0-9]*)?",
        r"|is-[a-z][a-zA-Z0-9]*",
        r"|u-(?:[a-z0-9]+-)?[a-zA-Z0-9]+",
        r")$"
    ))
    .expect("valid SUIT regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingPreset {
    Bem,
    Suit,
}

impl NamingPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingPreset::Bem => "bem",
            NamingPreset::Suit => "suit",
        }
    }

    pub fn matches(&self, class_name: &str) -> bool {
        match self {
            NamingPreset::Bem => BEM.is_match(class_name),
            NamingPreset::Suit => SUIT.is_match(class_name),
        }
    }
}

impl std::str::FromStr for NamingPreset {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bem" => Ok(NamingPreset::Bem),
            "suit" => Ok(NamingPreset::Suit),
            other => Err(PipelineError::invalid_input(format!(
                "unknown naming preset '{}' (expected 'bem' or 'suit')",
                other
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NamingSettings {
    preset: Option<String>,
    ignore: Vec<String>,
}

/// Class-name convention check in the manner of postcss-bem-linter.
///
/// Settings (`naming`): `{"preset": "bem" | "suit", "ignore": [regex, ...]}`.
#[derive(Debug, Clone)]
pub struct NamingLint {
    preset: NamingPreset,
    ignore: Vec<Regex>,
}

impl NamingLint {
    pub fn new(preset: NamingPreset) -> Self {
        Self {
            preset,
            ignore: Vec::new(),
        }
    }

    pub fn from_settings(settings: Option<&Value>) -> Result<Self, PipelineError> {
        let settings: NamingSettings = match settings {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                PipelineError::invalid_input(format!("invalid naming settings: {}", e))
            })?,
            None => NamingSettings::default(),
        };

        let preset = match settings.preset.as_deref() {
            Some(name) => name.parse()?,
            None => NamingPreset::Bem,
        };
        let ignore = settings
            .ignore
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    PipelineError::invalid_input(format!(
                        "invalid naming ignore pattern '{}': {}",
                        pattern, e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { preset, ignore })
    }

    pub fn preset(&self) -> NamingPreset {
        self.preset
    }

    fn lint_source(&self, source: &str) -> Vec<Diagnostic> {
        let src = css::strip_comments(source);
        let mut found = Vec::new();

        for rule in css::rules(&src) {
            for (class_name, offset) in css::class_names(&rule.selector) {
                if self.preset.matches(&class_name)
                    || self.ignore.iter().any(|re| re.is_match(&class_name))
                {
                    continue;
                }
                let (line, column) = css::line_col(&src, rule.prelude.start + offset);
                found.push(
                    Diagnostic::warning(format!(
                        "Invalid class name \".{}\" in selector \"{}\" for the {} naming convention",
                        class_name,
                        rule.selector,
                        self.preset.as_str()
                    ))
                    .with_rule(format!("naming/{}", self.preset.as_str()))
                    .at(line, column),
                );
            }
        }

        found
    }
}

#[async_trait]
impl LintCheck for NamingLint {
    fn name(&self) -> &str {
        "naming"
    }

    async fn check(
        &self,
        css: &str,
        _filename: Option<&Path>,
    ) -> Result<Vec<Diagnostic>, PipelineError> {
        Ok(self.lint_source(css))
    }
}
