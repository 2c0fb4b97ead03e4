//! Production backend: pure Rust pixel work, plus the external tool for raw
//! requests.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate (pure Rust decoders) |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG / AVIF | `image` encoders with quality |
//! | Encode → lossy WebP | `webp` crate |
//! | Atomic write | `tempfile::NamedTempFile::persist` |
//! | Raw tool | `std::process::Command` (`convert` by default) |

use super::backend::{BackendError, ImageBackend};
use super::params::{ToolParams, TransformParams};
use super::pipeline;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a temp file next to `output`, let `produce` fill it, then rename it
/// over `output`. Readers see either the old artifact or the complete new one.
fn write_atomically<F>(output: &Path, mut temp: NamedTempFile, produce: F) -> Result<u64, BackendError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), BackendError>,
{
    produce(&mut temp)?;
    temp.persist(output).map_err(|e| BackendError::Io(e.error))?;
    Ok(std::fs::metadata(output)?.len())
}

fn cache_dir_of(output: &Path) -> &Path {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

impl ImageBackend for RustBackend {
    fn transform(&self, params: &TransformParams) -> Result<u64, BackendError> {
        let ops = &params.ops;

        let frame = pipeline::decode(&params.source)?;
        let frame = pipeline::auto_orient(frame);
        let frame = pipeline::crop(frame, ops.crop.as_ref(), ops.gravity)?;
        let frame = pipeline::resize(frame, ops.resize.as_ref());
        let frame = pipeline::convert_format(frame, ops.format.as_ref());
        let frame = pipeline::set_quality(frame, ops.quality);
        let frame = pipeline::strip_metadata(frame);

        let temp = NamedTempFile::new_in(cache_dir_of(&params.output))?;
        write_atomically(&params.output, temp, |temp| {
            let mut writer = BufWriter::new(temp.as_file_mut());
            pipeline::encode(&frame, &mut writer).map_err(|message| BackendError::Encode {
                path: params.output.clone(),
                message,
            })?;
            writer.flush()?;
            Ok(())
        })
    }

    fn invoke_tool(&self, params: &ToolParams) -> Result<u64, BackendError> {
        // The tool picks its output encoding from the extension, so keep it
        let suffix = params
            .output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(".imgpipe-")
            .suffix(&suffix)
            .tempfile_in(cache_dir_of(&params.output))?;

        write_atomically(&params.output, temp, |temp| {
            let tool_error = |message: String| BackendError::ToolInvocation {
                program: params.program.clone(),
                message,
            };
            let output = Command::new(&params.program)
                .arg(&params.source)
                .args(&params.args)
                .arg(temp.path())
                .output()
                .map_err(|e| tool_error(e.to_string()))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(tool_error(format!("{} ({})", stderr.trim(), output.status)));
            }
            Ok(())
        })
    }
}
