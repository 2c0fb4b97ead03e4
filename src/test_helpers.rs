//! Shared test utilities for the imgpipe test suite.
//!
//! Creates synthetic source images and isolated site roots, and moves file
//! modification times around so staleness tests don't depend on filesystem
//! timestamp precision.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = site_with_jpeg("cat.jpg", 800, 600);
//! backdate(&site.path().join("cat.jpg"), 60);
//! ```

use image::{ImageBuffer, Rgb, RgbImage};
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// A horizontal gradient, so resized and cropped outputs aren't uniform.
fn gradient(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Write a JPEG of the given dimensions to `path`.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

/// Write a PNG of the given dimensions to `path`.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

// =========================================================================
// Site roots
// =========================================================================

/// A fresh site root containing one JPEG source at `name`.
pub fn site_with_jpeg(name: &str, width: u32, height: u32) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    create_test_jpeg(&path, width, height);
    tmp
}

// =========================================================================
// Timestamps
// =========================================================================

/// Set the modification time of `path` to `secs_ago` seconds before now.
pub fn backdate(path: &Path, secs_ago: u64) {
    set_mtime(path, SystemTime::now() - Duration::from_secs(secs_ago));
}

/// Set the modification time of `path` to an absolute instant.
pub fn set_mtime(path: &Path, when: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

/// Modification time of `path`.
pub fn mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}
