//! The host build system, as seen from the transform cache.
//!
//! A [`SiteContext`] supplies the source root, the base URL references are
//! built against, and a [`FileRegistry`] that is told about every artifact
//! the cache creates so the host can copy it into the published output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Sink for newly generated files.
///
/// Called exactly once per artifact actually written; cache hits are not
/// reported.
pub trait FileRegistry: Send + Sync {
    fn register_generated_file(&self, root: &Path, relative_dir: &Path, filename: &str);
}

/// One registration, as recorded by [`StaticFileRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub root: PathBuf,
    pub relative_dir: PathBuf,
    pub filename: String,
}

impl GeneratedFile {
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.relative_dir).join(&self.filename)
    }
}

/// In-memory registry; the CLI uses it to report what a run produced.
#[derive(Debug, Default)]
pub struct StaticFileRegistry {
    files: Mutex<Vec<GeneratedFile>>,
}

impl StaticFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<GeneratedFile> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileRegistry for StaticFileRegistry {
    fn register_generated_file(&self, root: &Path, relative_dir: &Path, filename: &str) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(GeneratedFile {
                root: root.to_path_buf(),
                relative_dir: relative_dir.to_path_buf(),
                filename: filename.to_string(),
            });
    }
}

/// Source root, base URL and registry for one build.
#[derive(Clone)]
pub struct SiteContext {
    pub source_root: PathBuf,
    pub base_url: String,
    pub registry: Arc<dyn FileRegistry>,
}

impl SiteContext {
    pub fn new(
        source_root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        registry: Arc<dyn FileRegistry>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            base_url: base_url.into(),
            registry,
        }
    }
}

impl fmt::Debug for SiteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteContext")
            .field("source_root", &self.source_root)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Join the base URL and a site-relative path with exactly one `/`.
///
/// ```
/// # use imgpipe::site::reference_url;
/// assert_eq!(reference_url("https://x.org/blog/", "cache/resize/a.webp"), "https://x.org/blog/cache/resize/a.webp");
/// assert_eq!(reference_url("", "cache/resize/a.webp"), "/cache/resize/a.webp");
/// ```
pub fn reference_url(base_url: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
