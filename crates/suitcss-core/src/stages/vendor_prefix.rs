/*
 * stages/vendor_prefix.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Vendor prefixing.
 */

//! The `vendor-prefix` stage.
//!
//! Adds vendor-prefixed copies of declarations whose property still needs
//! them, placed just before the unprefixed declaration. The property table
//! can be extended (or entries replaced) with the `properties` setting;
//! `add: false` turns the stage into a pass-through.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use super::parse_settings;
use crate::config::stage_ids::VENDOR_PREFIX;
use crate::css;
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

/// Properties that still need prefixes, with the prefixes they need.
const DEFAULT_PREFIXES: &[(&str, &[&str])] = &[
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("box-decoration-break", &["-webkit-"]),
    ("hyphens", &["-webkit-", "-ms-"]),
    ("mask", &["-webkit-"]),
    ("mask-image", &["-webkit-"]),
    ("tab-size", &["-moz-"]),
    ("text-size-adjust", &["-webkit-", "-moz-", "-ms-"]),
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VendorPrefixSettings {
    add: bool,
    /// Extra or replacement table entries
    properties: IndexMap<String, Vec<String>>,
}

impl Default for VendorPrefixSettings {
    fn default() -> Self {
        Self {
            add: true,
            properties: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VendorPrefixStage {
    add: bool,
    table: IndexMap<String, Vec<String>>,
}

impl VendorPrefixStage {
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        let settings: VendorPrefixSettings = parse_settings(VENDOR_PREFIX, settings)?;
        let mut table: IndexMap<String, Vec<String>> = DEFAULT_PREFIXES
            .iter()
            .map(|(property, prefixes)| {
                (
                    property.to_string(),
                    prefixes.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        table.extend(settings.properties);

        Ok(Self {
            add: settings.add,
            table,
        })
    }
}

#[async_trait]
impl Stage for VendorPrefixStage {
    fn name(&self) -> &str {
        VENDOR_PREFIX
    }

    async fn run(&self, css: String, _ctx: &mut StageContext) -> Result<String, PipelineError> {
        if !self.add {
            return Ok(css);
        }

        let stripped = css::strip_comments(&css);
        let mut edits = Vec::new();
        for rule in css::rules(&stripped) {
            let decls = css::declarations(&stripped, rule.body);
            for decl in &decls {
                let Some(prefixes) = self.table.get(&decl.property.to_ascii_lowercase()) else {
                    continue;
                };
                let separator = separator_before(&stripped, decl.range.start);
                let important = if decl.important { " !important" } else { "" };

                let mut inserted = String::new();
                for prefix in prefixes {
                    let prefixed = format!("{}{}", prefix, decl.property);
                    if decls.iter().any(|d| d.property.eq_ignore_ascii_case(&prefixed)) {
                        continue;
                    }
                    inserted.push_str(&format!("{}: {}{};{}", prefixed, decl.value, important, separator));
                }
                if !inserted.is_empty() {
                    edits.push((decl.range.start..decl.range.start, inserted));
                }
            }
        }

        Ok(css::apply_edits(&css, edits))
    }
}

/// Whitespace to put between inserted declarations: a newline plus the
/// declaration's indentation when it starts its own line, else a space.
fn separator_before(src: &str, offset: usize) -> String {
    let line_start = src[..offset].rfind('\n').map(|p| p + 1);
    match line_start {
        Some(start) if src[start..offset].chars().all(char::is_whitespace) => {
            format!("\n{}", &src[start..offset])
        }
        _ => " ".to_string(),
    }
}
