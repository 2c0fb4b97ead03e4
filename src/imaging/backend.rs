//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: run the typed transform pipeline, and hand a request to the
//! external pixel tool.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): decoding, pixel stages
//! and encoding are pure Rust; only the raw tool operation shells out.

use super::geometry::GeometryError;
use super::params::{ToolParams, TransformParams};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("Failed to encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("`{program}` failed: {message}")]
    ToolInvocation { program: String, message: String },
}

/// Trait for image processing backends.
///
/// Both operations write their output atomically and return the number of
/// bytes written. Implementations must be `Sync`: batch runs share one
/// backend across rayon workers.
pub trait ImageBackend: Sync {
    /// Decode, orient, crop, resize, convert, set quality, strip, write.
    fn transform(&self, params: &TransformParams) -> Result<u64, BackendError>;

    /// Run `program <source> <args...> <output>`.
    fn invoke_tool(&self, params: &ToolParams) -> Result<u64, BackendError>;
}
