//! The fixed sequence of pixel stages.
//!
//! ```text
//! decode → auto_orient → crop → resize → convert_format → set_quality → strip_metadata → encode
//! ```
//!
//! Each stage takes a [`Frame`] and returns a [`Frame`]. A stage whose
//! parameter is `None` returns its input unchanged, so every stage is total
//! and can be tested on its own. Orientation and stripping always run.

use super::backend::BackendError;
use super::calculations::{place_crop, resize_dimensions};
use super::geometry::{CropSpec, GeometryError, Gravity, ResizeGeometry};
use super::params::{OutputFormat, Quality};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader};
use std::io::{Seek, Write};
use std::path::Path;

/// JPEG quality when none is requested (the `image` crate default).
const DEFAULT_JPEG_QUALITY: u8 = 75;
const DEFAULT_AVIF_QUALITY: u8 = 80;
/// rav1e speed preset: 6 trades a little size for reasonable throughput.
const AVIF_SPEED: u8 = 6;

/// An image in flight through the pipeline, with what is known about how it
/// will be written.
pub struct Frame {
    pub image: DynamicImage,
    /// Orientation recorded in the source metadata, not yet applied.
    pub orientation: Orientation,
    pub icc_profile: Option<Vec<u8>>,
    /// Encoding for the output; starts as the source format.
    pub format: ImageFormat,
    pub quality: Option<Quality>,
}

impl Frame {
    pub fn new(image: DynamicImage, format: ImageFormat) -> Self {
        Self {
            image,
            orientation: Orientation::NoTransforms,
            icc_profile: None,
            format,
            quality: None,
        }
    }
}

/// Load and decode an image from disk, keeping its orientation and ICC profile.
pub fn decode(path: &Path) -> Result<Frame, BackendError> {
    let decode_error = |e: image::ImageError| BackendError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let unreadable = |e: std::io::Error| BackendError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let reader = ImageReader::open(path)
        .map_err(unreadable)?
        .with_guessed_format()
        .map_err(unreadable)?;
    let format = reader.format().ok_or_else(|| BackendError::Decode {
        path: path.to_path_buf(),
        message: "unrecognized image format".to_string(),
    })?;
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let icc_profile = decoder.icc_profile().ok().flatten();
    let image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;

    Ok(Frame {
        image,
        orientation,
        icc_profile,
        format,
        quality: None,
    })
}

/// Bake the recorded orientation into the pixels.
pub fn auto_orient(mut frame: Frame) -> Frame {
    frame.image.apply_orientation(frame.orientation);
    frame.orientation = Orientation::NoTransforms;
    frame
}

/// Cut the crop rectangle out of the frame.
///
/// Ratio crops are normalized against the frame's current dimensions first;
/// gravity then anchors the normalized rectangle.
pub fn crop(
    mut frame: Frame,
    spec: Option<&CropSpec>,
    gravity: Option<Gravity>,
) -> Result<Frame, GeometryError> {
    let Some(spec) = spec else {
        return Ok(frame);
    };
    let dims = frame.image.dimensions();
    let geometry = spec.resolve(dims)?;
    let rect = place_crop(
        (geometry.width, geometry.height),
        (geometry.x, geometry.y),
        gravity,
        dims,
    )
    .ok_or_else(|| GeometryError::DegenerateCrop {
        spec: geometry.to_string(),
        width: dims.0,
        height: dims.1,
    })?;

    log::debug!("Cropping {}x{} to {:?}", dims.0, dims.1, rect);
    frame.image = frame.image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    Ok(frame)
}

/// Resample with Lanczos3 to the size the geometry asks for.
pub fn resize(mut frame: Frame, geometry: Option<&ResizeGeometry>) -> Frame {
    let Some(geometry) = geometry else {
        return frame;
    };
    let dims = frame.image.dimensions();
    match resize_dimensions(geometry, dims) {
        Some((width, height)) => {
            log::debug!("Resizing {}x{} to {}x{} ({})", dims.0, dims.1, width, height, geometry);
            frame.image = frame.image.resize_exact(width, height, FilterType::Lanczos3);
        }
        None => log::debug!("Resize '{}' leaves {}x{} unchanged", geometry, dims.0, dims.1),
    }
    frame
}

pub fn convert_format(mut frame: Frame, format: Option<&OutputFormat>) -> Frame {
    if let Some(format) = format {
        frame.format = format.format;
    }
    frame
}

pub fn set_quality(mut frame: Frame, quality: Option<Quality>) -> Frame {
    if quality.is_some() {
        frame.quality = quality;
    }
    frame
}

/// Drop everything but pixels. Encoders only ever see `frame.image`, so
/// nothing cleared here can reach the output.
pub fn strip_metadata(mut frame: Frame) -> Frame {
    frame.orientation = Orientation::NoTransforms;
    frame.icc_profile = None;
    frame
}

/// Encode the frame in its target format.
///
/// Quality is honored by JPEG, lossy WebP and AVIF. WebP without a quality is
/// written lossless.
pub fn encode<W: Write + Seek>(frame: &Frame, writer: &mut W) -> Result<(), String> {
    let quality = frame.quality.map(Quality::value);
    match (frame.format, quality) {
        (ImageFormat::Jpeg, quality) => {
            let encoder =
                JpegEncoder::new_with_quality(writer, quality.unwrap_or(DEFAULT_JPEG_QUALITY));
            DynamicImage::ImageRgb8(frame.image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())
        }
        (ImageFormat::WebP, Some(quality)) => {
            let image = to_8bit(&frame.image);
            let encoder = webp::Encoder::from_image(&image).map_err(|e| e.to_string())?;
            let encoded = encoder.encode(f32::from(quality));
            writer.write_all(&encoded).map_err(|e| e.to_string())
        }
        (ImageFormat::Avif, quality) => {
            let encoder = AvifEncoder::new_with_speed_quality(
                writer,
                AVIF_SPEED,
                quality.unwrap_or(DEFAULT_AVIF_QUALITY),
            );
            to_8bit(&frame.image)
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())
        }
        (ImageFormat::Png | ImageFormat::Tiff, _) => frame
            .image
            .write_to(writer, frame.format)
            .map_err(|e| e.to_string()),
        (format, _) => to_8bit(&frame.image)
            .write_to(writer, format)
            .map_err(|e| e.to_string()),
    }
}

/// RGB8 or RGBA8, the layouts every encoder accepts.
fn to_8bit(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}
