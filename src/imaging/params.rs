//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`transform`](crate::transform) facade (which decides
//! whether an artifact must be produced) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing cache logic.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100). Out-of-range values are rejected, not clamped.
//! - [`OutputFormat`] — Target encoding, matched by file extension name.
//! - [`PixelOps`] — The optional stages of one transform (crop, resize, format, quality).
//! - [`TransformParams`] — Full specification for a pipeline run: source, output, ops.
//! - [`ToolParams`] — Full specification for an external tool run: program, source, output, args.

use super::geometry::{CropSpec, Gravity, ResizeGeometry};
use image::ImageFormat;
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Returns `None` outside `1..=100`; such values are ignored, never clamped.
    pub fn new(value: u32) -> Option<Self> {
        (1..=100).contains(&value).then_some(Self(value as u8))
    }

    /// Parse a textual quality. Non-numeric input yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<u32>().ok().and_then(Self::new)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target encoding for the format-conversion stage.
///
/// The `extension` is what the user asked for, lowercased (`"jpeg"` stays
/// `"jpeg"`), and becomes the extension of the cached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    pub format: ImageFormat,
    pub extension: String,
}

impl OutputFormat {
    /// Match a format name such as `webp` or `JPG`. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let extension = name.trim().trim_start_matches('.').to_ascii_lowercase();
        if extension.is_empty() {
            return None;
        }
        let format = ImageFormat::from_extension(&extension)?;
        format.writing_enabled().then_some(Self { format, extension })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension)
    }
}

/// The optional pixel stages of a single transform.
///
/// Every field left `None` turns the matching stage into a no-op. Orientation
/// and metadata stripping are not listed: they always run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelOps {
    pub crop: Option<CropSpec>,
    pub gravity: Option<Gravity>,
    pub resize: Option<ResizeGeometry>,
    pub format: Option<OutputFormat>,
    pub quality: Option<Quality>,
}

/// Parameters for one run of the typed pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub ops: PixelOps,
}

/// Parameters for one invocation of the external pixel tool.
///
/// The tool is called as `program <source> <args...> <output>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParams {
    pub program: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub args: Vec<String>,
}
