/*
 * import/watch.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Watched-file notification hook.
 */

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Receives the files touched by each import resolution.
///
/// The hook is shared by every run of a preprocessor, possibly
/// concurrently, so it must be `Send + Sync`. Its return value is ignored.
#[derive(Clone, Default)]
pub struct WatchHook(Option<Arc<dyn Fn(&[PathBuf]) + Send + Sync>>);

impl WatchHook {
    pub fn new(hook: impl Fn(&[PathBuf]) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(hook)))
    }

    /// Forward `files` to the hook, if one is set.
    pub fn notify(&self, files: &[PathBuf]) {
        if let Some(hook) = &self.0 {
            hook(files);
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for WatchHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WatchHook").field(&self.is_set()).finish()
    }
}
