//! Option merging.

use super::stage_ids::{ENCAPSULATE, IMPORT, MINIFY, REPORT, VENDOR_PREFIX, is_pinned};
use super::types::{Configuration, DebugHook, Defaults, EffectiveConfiguration};

/// Merge the defaults, an optional file configuration, and optional call
/// options into a fresh [`EffectiveConfiguration`].
///
/// Neither `defaults` nor the layers are modified; every call produces an
/// independent value.
pub fn merge(
    defaults: &Defaults,
    file: Option<&Configuration>,
    call: Option<&Configuration>,
) -> EffectiveConfiguration {
    let mut order = defaults.use_stages.clone();
    let mut stage_settings = defaults.settings.clone();
    let mut lint_enabled = defaults.lint;
    let mut encapsulate = defaults.encapsulate;
    let mut minify = defaults.minify;
    let mut import_root = defaults.root.clone();
    let mut debug_hook = DebugHook::default();

    for layer in [file, call].into_iter().flatten() {
        if let Some(custom) = &layer.use_stages {
            order = merge_stage_order(&order, custom);
        }
        // A stage's settings are replaced wholesale, never merged field-wise.
        for (stage, settings) in &layer.settings {
            stage_settings.insert(stage.clone(), settings.clone());
        }
        lint_enabled = layer.lint.unwrap_or(lint_enabled);
        encapsulate = layer.encapsulate.unwrap_or(encapsulate);
        minify = layer.minify.unwrap_or(minify);
        if let Some(root) = &layer.root {
            import_root = Some(root.clone());
        }
        if let Some(hook) = &layer.debug_hook {
            debug_hook = hook.clone();
        }
    }

    EffectiveConfiguration {
        stage_order: pin_stage_order(order, encapsulate, minify),
        stage_settings,
        lint_enabled,
        encapsulate,
        minify,
        import_root,
        debug_hook,
    }
}

/// Merge a caller's `use` list into an existing stage order.
///
/// Names the caller lists are removed from `base` (the caller's position
/// wins), pinned names are dropped from the caller's list, and the caller's
/// remaining names are appended in their given order. Duplicate names in
/// the caller's list keep their first occurrence.
pub fn merge_stage_order(base: &[String], custom: &[String]) -> Vec<String> {
    let mut custom_unique: Vec<&String> = Vec::with_capacity(custom.len());
    for id in custom {
        if !custom_unique.contains(&id) {
            custom_unique.push(id);
        }
    }

    let mut merged: Vec<String> = base
        .iter()
        .filter(|id| !custom_unique.contains(id))
        .cloned()
        .collect();
    merged.extend(
        custom_unique
            .into_iter()
            .filter(|id| !is_pinned(id))
            .cloned(),
    );
    merged
}

/// Place the pinned stages: `import` first, then the free stages, then
/// `vendor-prefix`, `report`, and finally `minify` when enabled.
fn pin_stage_order(order: Vec<String>, encapsulate: bool, minify: bool) -> Vec<String> {
    let mut middle: Vec<String> = Vec::with_capacity(order.len());
    for id in order {
        if is_pinned(&id) || id == MINIFY || middle.contains(&id) {
            continue;
        }
        middle.push(id);
    }
    if encapsulate && !middle.iter().any(|id| id == ENCAPSULATE) {
        middle.push(ENCAPSULATE.to_string());
    }

    let mut pinned = Vec::with_capacity(middle.len() + 4);
    pinned.push(IMPORT.to_string());
    pinned.extend(middle);
    pinned.push(VENDOR_PREFIX.to_string());
    pinned.push(REPORT.to_string());
    if minify {
        pinned.push(MINIFY.to_string());
    }
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_only() {
        let effective = merge(&Defaults::builtin(), None, None);
        insta::assert_snapshot!(
            effective.stage_order.join(" > "),
            @"import > custom-properties > calc > custom-media > vendor-prefix > report"
        );
        assert!(effective.lint_enabled);
        assert!(!effective.minify);
        assert!(!effective.encapsulate);
        assert!(effective.import_root.is_none());
        assert!(effective.debug_hook.is_identity());
    }

    #[test]
    fn test_custom_use_reorders_without_duplicates() {
        let call = Configuration::new().with_use(["calc", "custom-properties"]);
        let effective = merge(&Defaults::builtin(), None, Some(&call));
        insta::assert_snapshot!(
            effective.stage_order.join(" > "),
            @"import > custom-media > calc > custom-properties > vendor-prefix > report"
        );
    }

    #[test]
    fn test_pinned_names_cannot_be_moved() {
        let call = Configuration::new().with_use([
            "report",
            "vendor-prefix",
            "my-stage",
            "import",
            "my-stage",
        ]);
        let effective = merge(&Defaults::builtin(), None, Some(&call));
        assert_eq!(
            effective.stage_order,
            ids(&[
                "import",
                "custom-properties",
                "calc",
                "custom-media",
                "my-stage",
                "vendor-prefix",
                "report",
            ])
        );
    }

    #[test]
    fn test_aliases_merge_with_canonical_names() {
        let call = Configuration::new().with_use(["postcss-import", "postcss-calc"]);
        let effective = merge(&Defaults::builtin(), None, Some(&call));
        assert_eq!(
            effective.stage_order,
            ids(&[
                "import",
                "custom-properties",
                "custom-media",
                "calc",
                "vendor-prefix",
                "report",
            ])
        );
    }

    #[test]
    fn test_minify_runs_after_report() {
        let call = Configuration::new().with_minify(true);
        let effective = merge(&Defaults::builtin(), None, Some(&call));
        let tail: Vec<&str> = effective
            .stage_order
            .iter()
            .rev()
            .take(3)
            .map(String::as_str)
            .collect();
        assert_eq!(tail, vec!["minify", "report", "vendor-prefix"]);
    }

    #[test]
    fn test_minify_in_use_list_requires_flag() {
        let call = Configuration::new().with_use(["minify"]);
        let effective = merge(&Defaults::builtin(), None, Some(&call));
        assert!(!effective.stage_order.iter().any(|id| id == "minify"));
    }

    #[test]
    fn test_encapsulate_inserted_before_vendor_prefix() {
        let call = Configuration::new().with_encapsulate(true);
        let effective = merge(&Defaults::builtin(), None, Some(&call));
        let n = effective.stage_order.len();
        assert_eq!(effective.stage_order[n - 3], "encapsulate");
        assert_eq!(effective.stage_order[n - 2], "vendor-prefix");
    }

    #[test]
    fn test_file_layer_then_call_layer() {
        let file = Configuration::new()
            .with_use(["custom-properties", "calc", "custom-media"])
            .with_lint(false)
            .with_root("from-file")
            .with_settings("report", json!({"clearMessages": false}));
        let call = Configuration::new()
            .with_root("from-call")
            .with_settings("report", json!({}));

        let effective = merge(&Defaults::builtin(), Some(&file), Some(&call));
        assert_eq!(
            effective.stage_order,
            ids(&[
                "import",
                "custom-properties",
                "calc",
                "custom-media",
                "vendor-prefix",
                "report",
            ])
        );
        assert!(!effective.lint_enabled);
        assert_eq!(effective.import_root, Some(PathBuf::from("from-call")));
        // Call settings replace the file's settings for the stage entirely.
        assert_eq!(effective.settings_for("report"), Some(&json!({})));
    }

    #[test]
    fn test_file_root_used_when_call_has_none() {
        let file = Configuration::new().with_root("from-file");
        let call = Configuration::new();
        let effective = merge(&Defaults::builtin(), Some(&file), Some(&call));
        assert_eq!(effective.import_root, Some(PathBuf::from("from-file")));
    }

    #[test]
    fn test_merge_does_not_touch_defaults() {
        let defaults = Defaults::builtin();
        let call = Configuration::new()
            .with_use(["calc"])
            .with_root("/somewhere")
            .with_settings("calc", json!({"precision": 2}));
        let _ = merge(&defaults, None, Some(&call));
        let again = merge(&defaults, None, None);

        assert_eq!(defaults.use_stages, Defaults::builtin().use_stages);
        assert!(defaults.settings.is_empty());
        assert!(again.import_root.is_none());
        assert!(again.settings_for("calc").is_none());
    }

    #[test]
    fn test_merge_stage_order_set_difference() {
        let base = ids(&["a", "b", "c"]);
        let merged = merge_stage_order(&base, &ids(&["c", "x", "a", "x"]));
        assert_eq!(merged, ids(&["b", "c", "x", "a"]));
    }
}
