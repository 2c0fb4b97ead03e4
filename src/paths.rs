//! Source and destination path derivation for the transform cache.
//!
//! Every artifact lives flat in one cache directory under the site root.
//! Its filename is a pure function of the source's file stem, the request's
//! cache key and the output extension, so the same request always lands on
//! the same file and distinct requests never share one.
//!
//! ## Naming policies
//!
//! | Policy | Filename | Notes |
//! |---|---|---|
//! | [`NamingPolicy::Hash`] | `<sha256("{stem}_{key}{ext}")[..n]>{ext}` | default, collision resistant |
//! | [`NamingPolicy::Slug`] | `{stem}_{slug(key)}{ext}` | readable, e.g. `photo_resize-r-geometry-eq-400x400-gt-.webp` |
//!
//! The slug keeps ASCII letters and digits and spells every other character
//! as a `-name-` token (`>` is `-gt-`, `%` is `-pct-`, anything unnamed is
//! `-u<hex>-`). `-` never appears outside a token, so distinct keys always
//! give distinct slugs.
//!
//! ## Chained transforms
//!
//! A source path that already points into the cache directory is a request
//! to transform a cached artifact. It is redirected to
//! `<site root>/<cache dir>/<file name>`, ignoring the rest of the path, so
//! the reference URL returned by one transform can be fed to the next.

use crate::config::CacheConfig;
use crate::transform::TransformError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// How destination filenames are derived from the cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicy {
    #[default]
    Hash,
    Slug,
}

/// Cache directory and naming, injected wherever paths are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    /// Relative to the site root.
    pub dir: PathBuf,
    pub hash_length: usize,
    pub naming: NamingPolicy,
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Every path a request needs, computed before any pixel work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub src_path: PathBuf,
    pub dest_dir: PathBuf,
    pub dest_filename: String,
    pub dest_path: PathBuf,
    /// `/`-separated, relative to the site root. Used for the reference URL.
    pub dest_path_relative: String,
}

impl CacheLayout {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            hash_length: config.hash_length,
            naming: config.naming,
        }
    }

    /// Resolve source and destination paths for one request.
    ///
    /// `format_ext` overrides the source extension when present. Fails with
    /// [`TransformError::UnreadableSource`] unless the (possibly redirected)
    /// source is a readable regular file.
    pub fn resolve(
        &self,
        repo_base: &Path,
        img_path: &str,
        cache_key: &str,
        format_ext: Option<&str>,
    ) -> Result<ResolvedPaths, TransformError> {
        let relative = Path::new(img_path.trim_start_matches('/'));
        let dest_dir = repo_base.join(&self.dir);

        let src_path = match relative.file_name() {
            Some(name) if self.is_inside_cache(relative) => dest_dir.join(name),
            _ => repo_base.join(relative),
        };
        ensure_readable(&src_path)?;

        let stem = src_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = match format_ext.map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) => format!(".{}", e.trim_start_matches('.')),
            None => src_path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        };

        let dest_filename = self.dest_filename(&stem, cache_key, &ext);
        let dest_path = dest_dir.join(&dest_filename);
        let dest_path_relative = self
            .dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .chain(std::iter::once(dest_filename.clone()))
            .collect::<Vec<_>>()
            .join("/");

        Ok(ResolvedPaths {
            src_path,
            dest_dir,
            dest_filename,
            dest_path,
            dest_path_relative,
        })
    }

    /// Filename for a source stem, cache key and extension (with leading dot,
    /// or empty).
    pub fn dest_filename(&self, stem: &str, cache_key: &str, ext: &str) -> String {
        match self.naming {
            NamingPolicy::Hash => {
                let digest = Sha256::digest(format!("{stem}_{cache_key}{ext}").as_bytes());
                let hex = format!("{:x}", digest);
                let len = self.hash_length.min(hex.len());
                format!("{}{ext}", &hex[..len])
            }
            NamingPolicy::Slug => format!("{stem}_{}{ext}", slugify(cache_key)),
        }
    }

    /// True when the cache dir's components appear consecutively in `path`.
    fn is_inside_cache(&self, path: &Path) -> bool {
        let cache: Vec<Component> = self.dir.components().collect();
        let parts: Vec<Component> = path.components().collect();
        !cache.is_empty() && parts.windows(cache.len()).any(|w| w == cache.as_slice())
    }
}

/// Filename-safe spelling of a cache key that keeps it distinguishable.
fn slugify(key: &str) -> String {
    let mut slug = String::with_capacity(key.len() * 2);
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            continue;
        }
        slug.push('-');
        match punctuation_name(c) {
            Some(name) => slug.push_str(name),
            None => slug.push_str(&format!("u{:x}", c as u32)),
        }
        slug.push('-');
    }
    slug
}

// Names must not start with `u`, which is reserved for code points.
fn punctuation_name(c: char) -> Option<&'static str> {
    let name = match c {
        '>' => "gt",
        '<' => "lt",
        '!' => "ex",
        '^' => "fill",
        '%' => "pct",
        '@' => "at",
        ':' => "r",
        '+' => "p",
        '-' => "m",
        '=' => "eq",
        ',' => "c",
        '.' => "d",
        ' ' => "s",
        '_' => "us",
        _ => return None,
    };
    Some(name)
}

fn ensure_readable(path: &Path) -> Result<(), TransformError> {
    let unreadable = || TransformError::UnreadableSource(path.to_path_buf());
    let metadata = std::fs::metadata(path).map_err(|_| unreadable())?;
    if !metadata.is_file() {
        return Err(unreadable());
    }
    std::fs::File::open(path).map_err(|_| unreadable())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_jpeg;
    use tempfile::TempDir;

    fn site_with(names: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in names {
            let path = tmp.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            create_test_jpeg(&path, 8, 8);
        }
        tmp
    }

    // =========================================================================
    // Filenames
    // =========================================================================

    #[test]
    fn hash_filename_is_deterministic() {
        let site = site_with(&["photo.jpg"]);
        let layout = CacheLayout::default();
        let a = layout.resolve(site.path(), "photo.jpg", "resize=200x200", None).unwrap();
        let b = layout.resolve(site.path(), "photo.jpg", "resize=200x200", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hash_filename_shape() {
        let layout = CacheLayout::default();
        let name = layout.dest_filename("photo", "resize=200x200", ".jpg");
        assert_eq!(name.len(), 32 + ".jpg".len());
        assert!(name.ends_with(".jpg"));
        assert!(name[..32].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_length_is_configurable() {
        let layout = CacheLayout {
            hash_length: 12,
            ..CacheLayout::default()
        };
        assert_eq!(layout.dest_filename("a", "k", ".png").len(), 12 + 4);
    }

    #[test]
    fn distinct_keys_give_distinct_filenames() {
        let layout = CacheLayout::default();
        assert_ne!(
            layout.dest_filename("photo", "resize=200x200", ".jpg"),
            layout.dest_filename("photo", "resize=400x400", ".jpg")
        );
    }

    #[test]
    fn distinct_extensions_give_distinct_filenames() {
        let layout = CacheLayout::default();
        let webp = layout.dest_filename("photo", "format=webp", ".webp");
        let png = layout.dest_filename("photo", "format=webp", ".png");
        assert_ne!(webp[..32], png[..32]);
    }

    #[test]
    fn slug_filename_is_readable() {
        let layout = CacheLayout {
            naming: NamingPolicy::Slug,
            ..CacheLayout::default()
        };
        assert_eq!(
            layout.dest_filename("photo", "resize:geometry=400x400>", ".webp"),
            "photo_resize-r-geometry-eq-400x400-gt-.webp"
        );
    }

    #[test]
    fn slug_keeps_punctuation_distinct() {
        let keys = [
            "resize:geometry=200x200>",
            "resize:geometry=200x200<",
            "resize:geometry=200x200!",
            "resize:geometry=200x200^",
            "resize:geometry=200x200",
            "resize:geometry=50%x50%",
            "resize:geometry=50x50",
            "crop:crop=10x10+5-5",
            "crop:crop=10x10-5+5",
            "crop:crop=10x10+55",
            "magick:args=-gt-",
            "magick:args=>",
            "magick:args=a/b",
        ];
        let slugs: std::collections::HashSet<String> = keys.iter().map(|k| slugify(k)).collect();
        assert_eq!(slugs.len(), keys.len());
    }

    #[test]
    fn slug_escapes_unnamed_characters() {
        assert_eq!(slugify("a/b"), "a-u2f-b");
        assert_eq!(slugify("é"), "-ue9-");
        assert!(!slugify("../x").contains('/'));
    }

    // =========================================================================
    // resolve()
    // =========================================================================

    #[test]
    fn resolve_paths_under_cache_dir() {
        let site = site_with(&["img/cat.jpg"]);
        let resolved = CacheLayout::default()
            .resolve(site.path(), "/img/cat.jpg", "key", None)
            .unwrap();

        assert_eq!(resolved.src_path, site.path().join("img/cat.jpg"));
        assert_eq!(resolved.dest_dir, site.path().join("cache/resize"));
        assert_eq!(resolved.dest_path, resolved.dest_dir.join(&resolved.dest_filename));
        assert_eq!(
            resolved.dest_path_relative,
            format!("cache/resize/{}", resolved.dest_filename)
        );
        assert!(resolved.dest_filename.ends_with(".jpg"));
    }

    #[test]
    fn format_override_replaces_extension() {
        let site = site_with(&["cat.jpg"]);
        let layout = CacheLayout::default();
        let resolved = layout.resolve(site.path(), "cat.jpg", "key", Some("webp")).unwrap();
        assert!(resolved.dest_filename.ends_with(".webp"));

        let blank = layout.resolve(site.path(), "cat.jpg", "key", Some(" ")).unwrap();
        assert!(blank.dest_filename.ends_with(".jpg"));
    }

    #[test]
    fn cached_source_is_redirected_to_cache_dir() {
        let site = site_with(&["cache/resize/abc.webp"]);
        let resolved = CacheLayout::default()
            .resolve(site.path(), "/blog/cache/resize/abc.webp", "key", None)
            .unwrap();
        assert_eq!(resolved.src_path, site.path().join("cache/resize/abc.webp"));
    }

    #[test]
    fn partial_cache_dir_match_is_not_redirected() {
        let site = site_with(&["cache/other/abc.jpg"]);
        let resolved = CacheLayout::default()
            .resolve(site.path(), "cache/other/abc.jpg", "key", None)
            .unwrap();
        assert_eq!(resolved.src_path, site.path().join("cache/other/abc.jpg"));
    }

    #[test]
    fn missing_source_is_unreadable() {
        let site = site_with(&[]);
        let result = CacheLayout::default().resolve(site.path(), "nope.jpg", "key", None);
        assert!(matches!(result, Err(TransformError::UnreadableSource(p)) if p.ends_with("nope.jpg")));
    }

    #[test]
    fn directory_source_is_unreadable() {
        let site = site_with(&[]);
        std::fs::create_dir(site.path().join("dir.jpg")).unwrap();
        let result = CacheLayout::default().resolve(site.path(), "dir.jpg", "key", None);
        assert!(matches!(result, Err(TransformError::UnreadableSource(_))));
    }
}
