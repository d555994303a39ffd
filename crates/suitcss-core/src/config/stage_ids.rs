//! Well-known stage identifiers.

/// Import resolution. Always runs first.
pub const IMPORT: &str = "import";
pub const CUSTOM_PROPERTIES: &str = "custom-properties";
pub const CALC: &str = "calc";
pub const CUSTOM_MEDIA: &str = "custom-media";
pub const ENCAPSULATE: &str = "encapsulate";
/// Vendor prefixing. Always second to last.
pub const VENDOR_PREFIX: &str = "vendor-prefix";
/// Diagnostic reporting. Always last (before `minify`).
pub const REPORT: &str = "report";
/// Minification. Only runs when `minify` is enabled, after `report`.
pub const MINIFY: &str = "minify";

/// Settings key for the naming-convention linter.
pub const NAMING_LINT: &str = "naming";
/// Settings key for the general style linter.
pub const STYLE_LINT: &str = "lint-style";

/// Stages whose position is fixed regardless of the caller's `use` list.
pub const PINNED: [&str; 3] = [IMPORT, VENDOR_PREFIX, REPORT];

pub fn is_pinned(id: &str) -> bool {
    PINNED.contains(&id)
}

/// Map the package names used by the JavaScript toolchain onto stage ids.
///
/// Unknown identifiers are returned unchanged so that custom stages keep
/// their names.
pub fn canonicalize(id: &str) -> String {
    let canonical = match id {
        "postcss-import" => IMPORT,
        "postcss-custom-properties" => CUSTOM_PROPERTIES,
        "postcss-calc" => CALC,
        "postcss-custom-media" => CUSTOM_MEDIA,
        "postcss-autoreset" | "postcss-initial" => ENCAPSULATE,
        "autoprefixer" => VENDOR_PREFIX,
        "postcss-reporter" => REPORT,
        "cssnano" | "postcss-csso" => MINIFY,
        "postcss-bem-linter" => NAMING_LINT,
        "stylelint" => STYLE_LINT,
        other => other,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_aliases() {
        assert_eq!(canonicalize("postcss-import"), IMPORT);
        assert_eq!(canonicalize("autoprefixer"), VENDOR_PREFIX);
        assert_eq!(canonicalize("postcss-reporter"), REPORT);
        assert_eq!(canonicalize("my-stage"), "my-stage");
    }

    #[test]
    fn test_pinned() {
        assert!(is_pinned(IMPORT));
        assert!(is_pinned(REPORT));
        assert!(!is_pinned(CALC));
        assert!(!is_pinned(MINIFY));
    }
}
