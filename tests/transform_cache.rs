//! End-to-end runs of the transform facade on the pure-Rust backend.
//!
//! Synthetic sources are generated per test in an isolated site root; no
//! fixtures, no external tools.

use image::{GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage};
use imgpipe::config::PipelineConfig;
use imgpipe::process::{BatchRequest, run_batch};
use imgpipe::{Operation, SiteContext, StaticFileRegistry, TransformError, Transformer};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

struct Site {
    root: TempDir,
    registry: Arc<StaticFileRegistry>,
    transformer: Transformer,
}

impl Site {
    fn new(base_url: &str) -> Self {
        let root = TempDir::new().unwrap();
        let registry = Arc::new(StaticFileRegistry::new());
        let context = SiteContext::new(root.path(), base_url, registry.clone());
        let transformer = Transformer::new(context, &PipelineConfig::default());
        Self {
            root,
            registry,
            transformer,
        }
    }

    /// Write a JPEG source, with its mtime pushed into the past.
    fn jpeg(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.root.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(60));
        path
    }

    fn artifact(&self, url: &str, base_url: &str) -> PathBuf {
        self.root.path().join(url.strip_prefix(base_url).unwrap().trim_start_matches('/'))
    }
}

fn set_mtime(path: &Path, when: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

fn mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

fn detected_format(path: &Path) -> Option<ImageFormat> {
    ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format()
}

// =========================================================================
// Full scenario
// =========================================================================

#[test]
fn resize_to_webp_end_to_end() {
    let site = Site::new("https://example.org/blog");
    let source = site.jpeg("cat.jpg", 800, 600);
    let source_mtime = mtime(&source);

    let url = site.transformer.resize("cat.jpg", "400x400>,webp,80").unwrap();

    assert!(url.starts_with("https://example.org/blog/cache/resize/"), "{url}");
    assert!(url.ends_with(".webp"), "{url}");

    let artifact = site.artifact(&url, "https://example.org/blog");
    let decoded = image::open(&artifact).unwrap();
    assert_eq!(decoded.dimensions(), (400, 300));
    assert_eq!(detected_format(&artifact), Some(ImageFormat::WebP));
    assert!(mtime(&artifact) > source_mtime);

    let files = site.registry.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path(), artifact);
}

#[test]
fn repeated_request_reuses_artifact() {
    let site = Site::new("");
    site.jpeg("photo.jpg", 300, 200);

    let first = site.transformer.run(Operation::Resize, "photo.jpg", "100x100").unwrap();
    let written = mtime(&first.dest_path);
    let second = site.transformer.run(Operation::Resize, "photo.jpg", "100x100").unwrap();

    assert!(first.generated);
    assert!(!second.generated);
    assert_eq!(first.url, second.url);
    assert_eq!(mtime(&second.dest_path), written);
    assert_eq!(site.registry.len(), 1);
}

#[test]
fn touched_source_is_regenerated() {
    let site = Site::new("");
    let source = site.jpeg("photo.jpg", 300, 200);
    let first = site.transformer.run(Operation::Resize, "photo.jpg", "100x100").unwrap();

    let now = SystemTime::now();
    set_mtime(&first.dest_path, now - Duration::from_secs(30));
    set_mtime(&source, now - Duration::from_secs(10));

    let second = site.transformer.run(Operation::Resize, "photo.jpg", "100x100").unwrap();
    assert!(second.generated);
    assert!(mtime(&second.dest_path) > now - Duration::from_secs(10));
    assert_eq!(site.registry.len(), 2);
}

// =========================================================================
// Individual operations
// =========================================================================

#[test]
fn ratio_crop_normalizes_against_source() {
    let site = Site::new("");
    site.jpeg("wide.jpg", 1000, 500);

    let outcome = site.transformer.run(Operation::Crop, "wide.jpg", "1:1+0+0").unwrap();
    assert_eq!(image::image_dimensions(&outcome.dest_path).unwrap(), (500, 500));
}

#[test]
fn gravity_crop_keeps_requested_size() {
    let site = Site::new("");
    site.jpeg("wide.jpg", 1000, 500);

    let outcome = site
        .transformer
        .run(Operation::Crop, "wide.jpg", "200x100+0+0,southeast")
        .unwrap();
    assert_eq!(image::image_dimensions(&outcome.dest_path).unwrap(), (200, 100));
}

#[test]
fn format_conversion_changes_encoding_and_extension() {
    let site = Site::new("");
    site.jpeg("photo.jpg", 64, 64);

    let outcome = site.transformer.run(Operation::Format, "photo.jpg", "png").unwrap();
    assert!(outcome.url.ends_with(".png"));
    assert_eq!(detected_format(&outcome.dest_path), Some(ImageFormat::Png));
}

#[test]
fn lower_quality_gives_smaller_jpeg() {
    let site = Site::new("");
    site.jpeg("photo.jpg", 400, 300);

    let low = site.transformer.run(Operation::Quality, "photo.jpg", "10").unwrap();
    let high = site.transformer.run(Operation::Quality, "photo.jpg", "95").unwrap();
    let size = |p: &Path| std::fs::metadata(p).unwrap().len();
    assert!(size(&low.dest_path) < size(&high.dest_path));
}

#[test]
fn invalid_quality_still_produces_image() {
    let site = Site::new("");
    site.jpeg("photo.jpg", 40, 30);

    let outcome = site.transformer.run(Operation::Quality, "photo.jpg", "150").unwrap();
    assert_eq!(image::image_dimensions(&outcome.dest_path).unwrap(), (40, 30));
}

#[test]
fn cached_output_feeds_the_next_transform() {
    let site = Site::new("/blog");
    site.jpeg("img/photo.jpg", 800, 600);

    let webp = site.transformer.format("img/photo.jpg", "webp").unwrap();
    set_mtime(&site.artifact(&webp, "/blog"), SystemTime::now() - Duration::from_secs(30));
    let thumb = site.transformer.resize(&webp, "100x100").unwrap();

    assert!(thumb.ends_with(".webp"));
    let dims = image::image_dimensions(site.artifact(&thumb, "/blog")).unwrap();
    assert_eq!(dims, (100, 75));
}

// =========================================================================
// Failures
// =========================================================================

#[test]
fn malformed_crop_is_reported_with_context() {
    let site = Site::new("");
    site.jpeg("photo.jpg", 40, 30);

    let err = site.transformer.crop("photo.jpg", "300x300").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("photo.jpg"), "{message}");
    assert!(message.contains("300x300"), "{message}");
    assert!(site.registry.is_empty());
}

#[test]
fn corrupt_source_fails_without_artifact() {
    let site = Site::new("");
    std::fs::write(site.root.path().join("broken.jpg"), b"not an image").unwrap();

    let err = site.transformer.resize("broken.jpg", "100x100").unwrap_err();
    assert!(matches!(err.kind, TransformError::Backend(_)), "{err}");
    let cache = site.root.path().join("cache/resize");
    assert_eq!(std::fs::read_dir(cache).unwrap().count(), 0);
}

// =========================================================================
// Batch
// =========================================================================

#[test]
fn batch_runs_mixed_requests() {
    let site = Site::new("");
    site.jpeg("a.jpg", 200, 100);
    site.jpeg("b.jpg", 100, 200);
    let requests = vec![
        BatchRequest {
            operation: Operation::Resize,
            source: "a.jpg".into(),
            options: "50%".into(),
        },
        BatchRequest {
            operation: Operation::Crop,
            source: "b.jpg".into(),
            options: "1:1+0+0,center".into(),
        },
        BatchRequest {
            operation: Operation::Resize,
            source: "a.jpg".into(),
            options: "50%".into(),
        },
    ];

    let result = run_batch(&site.transformer, &requests, None).unwrap();

    assert_eq!(result.cache_stats.total(), 3);
    assert_eq!(result.cache_stats.misses, 2);
    assert_eq!(result.items[0].url, result.items[2].url);
    assert_eq!(site.registry.len(), 2);
}
