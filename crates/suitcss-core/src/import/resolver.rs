/*
 * import/resolver.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Depth-first @import inlining.
 */

use std::future::Future;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::loader::{ImportLoader, normalize_path};
use crate::config::stage_ids::IMPORT;
use crate::css;
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Hook applied to every imported file before it is spliced in.
#[async_trait]
pub trait ImportTransform: Send {
    async fn transform(&mut self, css: String, filename: &Path) -> Result<String, PipelineError>;
}

/// Leaves imported files unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransform;

#[async_trait]
impl ImportTransform for NoTransform {
    async fn transform(&mut self, css: String, _filename: &Path) -> Result<String, PipelineError> {
        Ok(css)
    }
}

/// Output of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub css: String,
    /// Every file inlined, in encounter order, without repeats
    pub files: Vec<PathBuf>,
    /// `@import` statements that were ignored because they came too late
    pub warnings: Vec<Diagnostic>,
}

/// Inlines local `@import` statements.
///
/// Only the leading imports of a file are processed (after any
/// `@charset`). Remote imports (`http:`, `https:`, `//`) stay as they are.
/// A request is tried relative to the importing file's directory, then
/// relative to the root, each as given, with a `.css` suffix, and as a
/// directory holding `index.css`.
#[derive(Clone)]
pub struct ImportResolver {
    loader: Arc<dyn ImportLoader>,
    root: Option<PathBuf>,
    skip_duplicates: bool,
}

impl ImportResolver {
    pub fn new(loader: Arc<dyn ImportLoader>) -> Self {
        Self {
            loader,
            root: None,
            skip_duplicates: true,
        }
    }

    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    /// When set (the default), a file already inlined during this
    /// resolution is dropped instead of inlined again.
    pub fn with_skip_duplicates(mut self, skip_duplicates: bool) -> Self {
        self.skip_duplicates = skip_duplicates;
        self
    }

    /// Expand every import in `css`, depth-first and one file at a time.
    ///
    /// `transform` sees each imported file's raw contents before its own
    /// imports are expanded. `on_import` receives the flattened file list
    /// once resolution succeeds.
    ///
    /// # Errors
    ///
    /// - `ImportNotFound` when no candidate path exists
    /// - `StageFailure` for a cyclic import when duplicates are allowed
    /// - any error from the loader or `transform`
    pub async fn resolve(
        &self,
        css: &str,
        filename: Option<&Path>,
        transform: &mut dyn ImportTransform,
        on_import: impl FnOnce(&[PathBuf]) + Send,
    ) -> Result<Resolution, PipelineError> {
        let mut walk = Walk {
            resolver: self,
            transform,
            files: Vec::new(),
            stack: filename.map(normalize_path).into_iter().collect(),
            warnings: Vec::new(),
        };
        let css = walk
            .expand(css.to_string(), filename.map(Path::to_path_buf))
            .await?;
        on_import(&walk.files);

        Ok(Resolution {
            css,
            files: walk.files,
            warnings: walk.warnings,
        })
    }

    async fn locate(&self, request: &str, from: Option<&Path>) -> Result<PathBuf, PipelineError> {
        for candidate in self.candidates(request, from) {
            if self.loader.is_file(&candidate).await {
                return Ok(candidate);
            }
        }
        Err(PipelineError::ImportNotFound {
            path: request.to_string(),
            from: from
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<input>".to_string()),
        })
    }

    fn candidates(&self, request: &str, from: Option<&Path>) -> Vec<PathBuf> {
        let request = Path::new(request);
        let mut bases = Vec::new();
        if !request.is_absolute() {
            if let Some(dir) = from.and_then(Path::parent) {
                bases.push(dir.to_path_buf());
            }
            if let Some(root) = &self.root {
                bases.push(root.clone());
            }
        }
        if bases.is_empty() {
            bases.push(PathBuf::new());
        }

        let mut out: Vec<PathBuf> = Vec::new();
        for base in bases {
            let joined = base.join(request);
            let mut with_suffix = joined.clone().into_os_string();
            with_suffix.push(".css");
            let with_suffix = PathBuf::from(with_suffix);
            let index = joined.join("index.css");

            let has_css_extension = joined.extension().is_some_and(|ext| ext == "css");
            for candidate in [Some(joined), (!has_css_extension).then_some(with_suffix), Some(index)]
                .into_iter()
                .flatten()
            {
                let candidate = normalize_path(&candidate);
                if !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
        out
    }
}

impl std::fmt::Debug for ImportResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportResolver")
            .field("root", &self.root)
            .field("skip_duplicates", &self.skip_duplicates)
            .finish()
    }
}

/// State of one resolution.
struct Walk<'r, 't> {
    resolver: &'r ImportResolver,
    transform: &'t mut dyn ImportTransform,
    files: Vec<PathBuf>,
    /// Files currently being expanded, outermost first
    stack: Vec<PathBuf>,
    warnings: Vec<Diagnostic>,
}

impl Walk<'_, '_> {
    fn expand(
        &mut self,
        css: String,
        from: Option<PathBuf>,
    ) -> BoxFuture<'_, Result<String, PipelineError>> {
        Box::pin(async move {
            let scan = scan_imports(&css);
            for offset in scan.late {
                let (line, column) = css::line_col(&css, offset);
                self.warnings.push(
                    Diagnostic::warning("@import must precede all other statements (besides @charset)")
                        .with_rule(IMPORT)
                        .with_source(from.clone())
                        .at(line, column),
                );
            }

            let mut edits = Vec::new();
            for statement in scan.imports {
                if is_remote(&statement.path) {
                    continue;
                }

                let path = self.resolver.locate(&statement.path, from.as_deref()).await?;
                let seen = self.files.contains(&path);
                if self.stack.contains(&path) && !self.resolver.skip_duplicates {
                    return Err(PipelineError::stage_failure(
                        IMPORT,
                        format!("cyclic import of {}", path.display()),
                    ));
                }
                if self.resolver.skip_duplicates && (seen || self.stack.contains(&path)) {
                    tracing::trace!(path = %path.display(), "skipping duplicate import");
                    edits.push((statement.range, String::new()));
                    continue;
                }
                if !seen {
                    self.files.push(path.clone());
                }

                let raw = self.resolver.loader.read(&path).await?;
                let raw = self.transform.transform(raw, &path).await?;

                self.stack.push(path.clone());
                let expanded = self.expand(raw, Some(path)).await?;
                self.stack.pop();

                edits.push((statement.range, wrap_media(expanded.trim_end(), &statement.media)));
            }

            Ok(css::apply_edits(&css, edits))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportStatement {
    range: Range<usize>,
    path: String,
    media: String,
}

#[derive(Debug, Default)]
struct Scan {
    imports: Vec<ImportStatement>,
    /// Offsets of `@import`s that follow other statements
    late: Vec<usize>,
}

/// Walk the top-level statements of `src`, collecting the leading imports.
fn scan_imports(src: &str) -> Scan {
    let stripped = css::strip_comments(src);
    let bytes = stripped.as_bytes();
    let end = bytes.len();
    let mut scan = Scan::default();
    let mut preamble = true;
    let mut i = 0;

    while i < end {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let mut stmt_end = end;
        let mut is_block = false;
        let mut j = i;
        while j < end {
            match bytes[j] {
                b'"' | b'\'' => j = css::skip_string(bytes, j, end),
                b'(' => j = css::skip_parens(bytes, j, end),
                b';' => {
                    stmt_end = j + 1;
                    break;
                }
                b'{' => {
                    stmt_end = (css::matching_brace(bytes, j, end) + 1).min(end);
                    is_block = true;
                    break;
                }
                _ => j += 1,
            }
        }

        let text = &stripped[start..stmt_end];
        match at_keyword(text).as_deref() {
            Some("charset") => {}
            Some("import") if !is_block => {
                if !preamble {
                    scan.late.push(start);
                } else if let Some(statement) = parse_import(text, start..stmt_end) {
                    scan.imports.push(statement);
                }
            }
            _ => preamble = false,
        }
        i = stmt_end;
    }
    scan
}

fn at_keyword(text: &str) -> Option<String> {
    let rest = text.strip_prefix('@')?;
    rest.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .next()
        .map(str::to_ascii_lowercase)
}

fn parse_import(text: &str, range: Range<usize>) -> Option<ImportStatement> {
    let params = text.get("@import".len()..)?.trim().trim_end_matches(';').trim();

    let (path, rest) = if let Some(inner) = params.strip_prefix("url(") {
        let close = inner.find(')')?;
        let path = inner[..close].trim().trim_matches(|c| c == '"' || c == '\'');
        (path, &inner[close + 1..])
    } else {
        let quote = params.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let body = &params[1..];
        let close = body.find(quote)?;
        (&body[..close], &body[close + 1..])
    };

    if path.is_empty() {
        return None;
    }
    Some(ImportStatement {
        range,
        path: path.to_string(),
        media: rest.trim().to_string(),
    })
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http:") || path.starts_with("https:") || path.starts_with("//")
}

fn wrap_media(css: &str, media: &str) -> String {
    if media.is_empty() {
        css.to_string()
    } else {
        format!("@media {} {{\n{}\n}}", media, css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::MemoryLoader;
    use std::sync::Mutex;

    /// Records every file passed to the transform.
    #[derive(Default)]
    struct Recorder(Vec<PathBuf>);

    #[async_trait]
    impl ImportTransform for Recorder {
        async fn transform(&mut self, css: String, filename: &Path) -> Result<String, PipelineError> {
            self.0.push(filename.to_path_buf());
            Ok(css)
        }
    }

    fn resolver(loader: MemoryLoader) -> ImportResolver {
        ImportResolver::new(Arc::new(loader))
    }

    fn resolve(resolver: &ImportResolver, css: &str, filename: Option<&str>) -> Result<Resolution, PipelineError> {
        pollster::block_on(resolver.resolve(css, filename.map(Path::new), &mut NoTransform, |_| {}))
    }

    #[test]
    fn test_nested_imports_depth_first() {
        let loader = MemoryLoader::new()
            .with_file("a.css", "@import \"b.css\";\n.a{}")
            .with_file("b.css", ".b{}\n");
        let resolver = resolver(loader);
        let mut recorder = Recorder::default();
        let notified = Mutex::new(Vec::new());

        let resolution = pollster::block_on(resolver.resolve(
            "@import \"a.css\";\n.top{}",
            None,
            &mut recorder,
            |files| notified.lock().unwrap().extend_from_slice(files),
        ))
        .unwrap();

        assert_eq!(resolution.css, ".b{}\n.a{}\n.top{}");
        let expected = vec![PathBuf::from("a.css"), PathBuf::from("b.css")];
        assert_eq!(resolution.files, expected);
        assert_eq!(recorder.0, expected);
        assert_eq!(*notified.lock().unwrap(), expected);
    }

    #[test]
    fn test_import_forms_and_media() {
        let loader = MemoryLoader::new()
            .with_file("a.css", ".a{}")
            .with_file("b.css", ".b{}")
            .with_file("c.css", ".c{}");
        let css = "@charset \"utf-8\";\n@import 'a';\n@import url(b.css) screen and (min-width: 10em);\n@import url(\"c.css\");";
        let resolution = resolve(&resolver(loader), css, None).unwrap();
        assert_eq!(
            resolution.css,
            "@charset \"utf-8\";\n.a{}\n@media screen and (min-width: 10em) {\n.b{}\n}\n.c{}"
        );
    }

    #[test]
    fn test_remote_imports_untouched() {
        let css = "@import url(https://fonts.example.com/x.css);\n@import \"//cdn.example.com/y.css\";";
        let resolution = resolve(&resolver(MemoryLoader::new()), css, None).unwrap();
        assert_eq!(resolution.css, css);
        assert!(resolution.files.is_empty());
    }

    #[test]
    fn test_missing_import_is_fatal() {
        let err = resolve(&resolver(MemoryLoader::new()), "@import \"missing.css\";", None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ImportNotFound { ref path, ref from } if path == "missing.css" && from == "<input>"
        ));

        let loader = MemoryLoader::new().with_file("lib/a.css", "@import \"gone\";");
        let err = resolve(&resolver(loader), "@import \"lib/a.css\";", None).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(matches!(err, PipelineError::ImportNotFound { ref from, .. } if from == "lib/a.css"));
    }

    #[test]
    fn test_relative_to_importing_file_then_root() {
        let loader = MemoryLoader::new()
            .with_file("src/components/button.css", "@import \"../base\";")
            .with_file("src/base.css", "@import \"theme\";\n.base{}")
            .with_file("vendor/theme/index.css", ".theme{}");
        let resolver = resolver(loader).with_root(Some(PathBuf::from("vendor")));

        let resolution = resolve(&resolver, "@import \"components/button.css\";", Some("src/main.css")).unwrap();
        assert_eq!(resolution.css, ".theme{}\n.base{}");
        assert_eq!(
            resolution.files,
            vec![
                PathBuf::from("src/components/button.css"),
                PathBuf::from("src/base.css"),
                PathBuf::from("vendor/theme/index.css"),
            ]
        );
    }

    #[test]
    fn test_duplicates_skipped_by_default() {
        let loader = MemoryLoader::new()
            .with_file("a.css", "@import \"shared.css\";\n.a{}")
            .with_file("shared.css", ".shared{}");
        let css = "@import \"a.css\";\n@import \"shared.css\";";
        let resolution = resolve(&resolver(loader), css, None).unwrap();
        assert_eq!(resolution.css, ".shared{}\n.a{}\n");
        assert_eq!(resolution.files.len(), 2);
    }

    #[test]
    fn test_duplicates_allowed() {
        let loader = MemoryLoader::new().with_file("shared.css", ".shared{}");
        let resolver = resolver(loader).with_skip_duplicates(false);
        let resolution = resolve(&resolver, "@import \"shared.css\";\n@import \"shared.css\";", None).unwrap();
        assert_eq!(resolution.css, ".shared{}\n.shared{}");
        assert_eq!(resolution.files, vec![PathBuf::from("shared.css")]);
    }

    #[test]
    fn test_cycles() {
        let loader = MemoryLoader::new()
            .with_file("a.css", "@import \"b.css\";\n.a{}")
            .with_file("b.css", "@import \"a.css\";\n.b{}");

        let resolution = resolve(&resolver(loader.clone()), "@import \"a.css\";", None).unwrap();
        assert_eq!(resolution.css, "\n.b{}\n.a{}");

        let resolver = resolver(loader).with_skip_duplicates(false);
        let err = resolve(&resolver, "@import \"a.css\";", None).unwrap_err();
        assert!(err.to_string().contains("cyclic import of a.css"));
    }

    #[test]
    fn test_late_import_is_warned_and_kept() {
        let css = ".a{}\n@import \"b.css\";";
        let resolution = resolve(&resolver(MemoryLoader::new()), css, Some("main.css")).unwrap();
        assert_eq!(resolution.css, css);
        assert_eq!(resolution.warnings.len(), 1);
        assert_eq!(resolution.warnings[0].location.map(|l| l.line), Some(2));
        assert_eq!(resolution.warnings[0].source, Some(PathBuf::from("main.css")));
    }

    #[test]
    fn test_comments_before_imports() {
        let loader = MemoryLoader::new().with_file("a.css", ".a{}");
        let css = "/* header */\n@import \"a.css\"; /* trailing */";
        let resolution = resolve(&resolver(loader), css, None).unwrap();
        assert_eq!(resolution.css, "/* header */\n.a{} /* trailing */");
    }
}
