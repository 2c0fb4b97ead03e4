//! Image processing — pure Rust, except the opt-in raw tool.
//!
//! | Stage | Crate / function |
//! |---|---|
//! | **Decode + orientation** | `image::ImageReader` + `ImageDecoder::orientation` |
//! | **Crop** | [`CropSpec`] → [`calculations::place_crop`] → `crop_imm` |
//! | **Resize** | [`ResizeGeometry`] → Lanczos3 |
//! | **Encode** | `image` encoders, `webp` for lossy WebP |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Geometry**: Parsing of crop, gravity and resize strings
//! - **Parameters**: Data structures describing image operations
//! - **Pipeline**: The ordered stage functions over a [`pipeline::Frame`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
pub mod geometry;
mod params;
pub mod pipeline;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use geometry::{CropSpec, GeometryError, Gravity, ResizeGeometry, normalize_crop};
pub use params::{OutputFormat, PixelOps, Quality, ToolParams, TransformParams};
pub use rust_backend::RustBackend;
