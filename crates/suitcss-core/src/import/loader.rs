/*
 * import/loader.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * File access for import resolution.
 */

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::PipelineError;

/// Source of imported stylesheets.
#[async_trait]
pub trait ImportLoader: Send + Sync {
    /// Whether `path` names a readable file.
    async fn is_file(&self, path: &Path) -> bool;

    async fn read(&self, path: &Path) -> Result<String, PipelineError>;
}

/// Loads imports from the local filesystem.
///
/// Requires a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

#[async_trait]
impl ImportLoader for FsLoader {
    async fn is_file(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<String, PipelineError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// In-memory stylesheets keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files
            .insert(normalize_path(path.as_ref()), contents.into());
    }
}

#[async_trait]
impl ImportLoader for MemoryLoader {
    async fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    async fn read(&self, path: &Path) -> Result<String, PipelineError> {
        self.files.get(&normalize_path(path)).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
            .into()
        })
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("./a/b/../c.css")), PathBuf::from("a/c.css"));
        assert_eq!(normalize_path(Path::new("../x.css")), PathBuf::from("../x.css"));
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with_file("styles/a.css", ".a {}");
        assert!(pollster::block_on(loader.is_file(Path::new("styles/./a.css"))));
        assert!(!pollster::block_on(loader.is_file(Path::new("styles/b.css"))));
        assert_eq!(
            pollster::block_on(loader.read(Path::new("styles/x/../a.css"))).unwrap(),
            ".a {}"
        );
        assert!(pollster::block_on(loader.read(Path::new("missing.css"))).is_err());
    }

    #[tokio::test]
    async fn test_fs_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.css");
        std::fs::write(&path, ".a { color: red; }").unwrap();

        assert!(FsLoader.is_file(&path).await);
        assert!(!FsLoader.is_file(dir.path()).await);
        assert_eq!(FsLoader.read(&path).await.unwrap(), ".a { color: red; }");
        assert!(FsLoader.read(&dir.path().join("b.css")).await.is_err());
    }
}
