/*
 * css.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Lightweight CSS scanning shared by the built-in stages and linters.
 */

//! Lightweight CSS scanning.
//!
//! This is not a CSS parser. It locates qualified rules, their selectors
//! and their declarations by byte range so that the built-in stages can
//! make targeted edits without reformatting the surrounding text.
//!
//! All scanning functions expect comment-free input produced by
//! [`strip_comments`], which blanks comments out while preserving every
//! byte offset and line break.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// At-rules whose blocks contain nested qualified rules.
const CONDITIONAL_AT_RULES: &[&str] = &["media", "supports", "document", "-moz-document", "layer", "container"];

static CLASS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(-?[_a-zA-Z][_a-zA-Z0-9-]*)").expect("valid class regex"));

/// A qualified rule (`selector { declarations }`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    /// Byte range of the trimmed selector
    pub prelude: Range<usize>,
    /// Byte range between the braces
    pub body: Range<usize>,
}

/// A `property: value` declaration inside a rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
    /// Byte range of the whole declaration, without the trailing `;`
    pub range: Range<usize>,
    /// Byte range of the value, without any `!important`
    pub value_range: Range<usize>,
}

/// Replace every comment with spaces, keeping newlines and byte offsets.
pub fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((_, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                out.push_str("  ");
                let mut prev = '\0';
                for (_, inner) in chars.by_ref() {
                    blank(&mut out, inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat_n(' ', c.len_utf8()));
    }
}

/// Find every qualified rule, descending into conditional at-rules.
pub fn rules(src: &str) -> Vec<Rule> {
    let mut out = Vec::new();
    scan_block(src, 0, src.len(), &mut out);
    out
}

fn scan_block(src: &str, start: usize, end: usize, out: &mut Vec<Rule>) {
    let bytes = src.as_bytes();
    let mut i = start;
    let mut prelude_start = start;

    while i < end {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i, end),
            b'(' => i = skip_parens(bytes, i, end),
            b';' | b'}' => {
                i += 1;
                prelude_start = i;
            }
            b'{' => {
                let close = matching_brace(bytes, i, end);
                let prelude = trimmed_range(src, prelude_start..i);
                let text = &src[prelude.clone()];
                if let Some(at_rule) = text.strip_prefix('@') {
                    let name = at_rule
                        .split(|c: char| c.is_whitespace() || c == '(')
                        .next()
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    if CONDITIONAL_AT_RULES.contains(&name.as_str()) {
                        scan_block(src, i + 1, close, out);
                    }
                } else if !text.is_empty() {
                    out.push(Rule {
                        selector: text.to_string(),
                        prelude,
                        body: i + 1..close,
                    });
                }
                i = (close + 1).min(end);
                prelude_start = i;
            }
            _ => i += 1,
        }
    }
}

/// Split a rule body into declarations. Nested blocks are skipped.
pub fn declarations(src: &str, body: Range<usize>) -> Vec<Declaration> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = body.start;
    let mut segment_start = body.start;

    while i <= body.end {
        let at_end = i == body.end;
        if !at_end {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = skip_string(bytes, i, body.end);
                    continue;
                }
                b'(' => {
                    i = skip_parens(bytes, i, body.end);
                    continue;
                }
                b'{' => {
                    // Nested block: skip it along with its prelude.
                    i = matching_brace(bytes, i, body.end) + 1;
                    segment_start = i;
                    continue;
                }
                b';' => {}
                _ => {
                    i += 1;
                    continue;
                }
            }
        }
        if let Some(decl) = parse_declaration(src, segment_start..i) {
            out.push(decl);
        }
        i += 1;
        segment_start = i;
    }
    out
}

fn parse_declaration(src: &str, segment: Range<usize>) -> Option<Declaration> {
    let range = trimmed_range(src, segment);
    let text = &src[range.clone()];
    let colon = text.find(':')?;
    let property = text[..colon].trim();
    if property.is_empty() || property.contains(char::is_whitespace) {
        return None;
    }

    let mut value_range = trimmed_range(src, range.start + colon + 1..range.end);
    let mut important = false;
    let value_text = &src[value_range.clone()];
    if let Some(bang) = value_text.rfind('!')
        && value_text[bang + 1..].trim().eq_ignore_ascii_case("important")
    {
        important = true;
        value_range = trimmed_range(src, value_range.start..value_range.start + bang);
    }

    Some(Declaration {
        property: property.to_string(),
        value: src[value_range.clone()].to_string(),
        important,
        range,
        value_range,
    })
}

/// Class names in a selector, with their byte offsets (of the leading `.`)
/// relative to the selector start.
pub fn class_names(selector: &str) -> Vec<(String, usize)> {
    // Blank out attribute selectors so `[href$=".pdf"]` is not a class.
    let mut masked = String::with_capacity(selector.len());
    let mut depth = 0usize;
    for c in selector.chars() {
        match c {
            '[' => {
                depth += 1;
                masked.push(' ');
            }
            ']' if depth > 0 => {
                depth -= 1;
                masked.push(' ');
            }
            _ if depth > 0 => blank(&mut masked, c),
            _ => masked.push(c),
        }
    }

    CLASS_NAME
        .captures_iter(&masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some((name.as_str().to_string(), whole.start()))
        })
        .collect()
}

/// One-based line and column of a byte offset.
pub fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(src.len());
    let before = &src[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|p| p + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Apply non-overlapping replacements. Empty ranges are insertions; a range
/// running past the end of `src` is clipped to it.
pub fn apply_edits(src: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| (range.start, range.end));
    let mut out = String::with_capacity(src.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        let end = range.end.min(src.len());
        if range.start < cursor || range.start > end {
            continue;
        }
        out.push_str(&src[cursor..range.start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&src[cursor..]);
    out
}

/// Index of the `)` matching the `(` at `open`, plus one.
pub fn skip_parens(bytes: &[u8], open: usize, end: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < end {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i, end);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    end
}

pub(crate) fn skip_string(bytes: &[u8], open: usize, end: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < end {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    end
}

pub(crate) fn matching_brace(bytes: &[u8], open: usize, end: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < end {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i, end);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    end
}

fn trimmed_range(src: &str, range: Range<usize>) -> Range<usize> {
    let text = &src[range.clone()];
    let lead = text.len() - text.trim_start().len();
    let len = text.trim().len();
    range.start + lead..range.start + lead + len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_preserves_offsets() {
        let css = "a { /* c\nd */ color: red; }";
        let stripped = strip_comments(css);
        assert_eq!(stripped.len(), css.len());
        assert_eq!(stripped, "a {     \n     color: red; }");
    }

    #[test]
    fn test_strip_comments_ignores_strings() {
        let css = "a { content: \"/* not a comment */\"; }";
        assert_eq!(strip_comments(css), css);
    }

    #[test]
    fn test_rules_descend_into_media() {
        let css = ".a { color: red; }\n@media (min-width: 10em) { .b { margin: 0; } }\n@font-face { font-family: x; }";
        let found = rules(css);
        let selectors: Vec<&str> = found.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec![".a", ".b"]);
        assert_eq!(&css[found[1].body.clone()], " margin: 0; ");
    }

    #[test]
    fn test_rules_skip_statements() {
        let css = "@charset \"utf-8\";\n@import \"x.css\";\n.a{}";
        let found = rules(css);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selector, ".a");
        assert!(found[0].body.is_empty());
    }

    #[test]
    fn test_declarations() {
        let css = ".a { color: red; background: url(\"a;b.png\") ; margin: 0 !important }";
        let rule = &rules(css)[0];
        let decls = declarations(css, rule.body.clone());
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].property, "color");
        assert_eq!(decls[0].value, "red");
        assert_eq!(decls[1].value, "url(\"a;b.png\")");
        assert_eq!(decls[2].property, "margin");
        assert_eq!(decls[2].value, "0");
        assert!(decls[2].important);
        assert_eq!(&css[decls[0].range.clone()], "color: red");
    }

    #[test]
    fn test_class_names() {
        let names = class_names(".Button-icon:hover > a[href$=\".pdf\"].is-active");
        let names: Vec<&str> = names.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Button-icon", "is-active"]);
    }

    #[test]
    fn test_line_col() {
        let src = "a\nbc\nd";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 3), (2, 2));
        assert_eq!(line_col(src, 5), (3, 1));
    }

    #[test]
    fn test_apply_edits() {
        let out = apply_edits(
            "abcdef",
            vec![(4..5, "E".to_string()), (0..0, ">".to_string()), (1..3, String::new())],
        );
        assert_eq!(out, ">adEf");
    }

    #[test]
    fn test_apply_edits_clips_past_end() {
        let out = apply_edits("abc", vec![(1..9, "X".to_string()), (7..8, "Y".to_string())]);
        assert_eq!(out, "aX");
    }
}
