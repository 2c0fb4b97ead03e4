//! The transform facade: five entry points, one code path.
//!
//! Each request runs the same sequence:
//!
//! ```text
//! (source, options)
//!   → TransformSpec::parse      typed fields, malformed crops rejected
//!   → CacheLayout::resolve      source, destination, filename
//!   → lock destination
//!   → must_create?              no  → cache hit, nothing else happens
//!                               yes → backend.transform / invoke_tool
//!   → registry.register_generated_file   only when something was written
//!   → reference_url(base_url, dest_path_relative)
//! ```
//!
//! Nothing is recovered here. Every failure comes back as a [`RequestError`]
//! naming the operation, source and options, and the caller is expected to
//! stop the build.

use crate::cache::{DestinationLocks, must_create};
use crate::config::PipelineConfig;
use crate::imaging::{
    BackendError, GeometryError, ImageBackend, RustBackend, ToolParams, TransformParams,
};
use crate::paths::{CacheLayout, ResolvedPaths};
use crate::request::{Operation, TransformSpec};
use crate::site::{SiteContext, reference_url};
use log::{debug, info};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("cannot read source image {}", .0.display())]
    UnreadableSource(PathBuf),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failed request, with enough context to find the offending template call.
#[derive(Error, Debug)]
#[error("{operation} '{source_path}' with '{options}': {kind}")]
pub struct RequestError {
    pub operation: Operation,
    pub source_path: String,
    pub options: String,
    #[source]
    pub kind: TransformError,
}

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    /// Base URL joined with the cache-relative destination.
    pub url: String,
    pub dest_path: PathBuf,
    /// False on a cache hit.
    pub generated: bool,
}

/// Runs transform requests against one site.
///
/// Generic over the backend so tests can count pixel work with a mock;
/// production code uses [`RustBackend`]. Shareable across threads.
pub struct Transformer<B: ImageBackend = RustBackend> {
    site: SiteContext,
    layout: CacheLayout,
    tool_program: String,
    backend: B,
    locks: DestinationLocks,
}

impl Transformer<RustBackend> {
    pub fn new(site: SiteContext, config: &PipelineConfig) -> Self {
        Self::with_backend(site, config, RustBackend::new())
    }
}

impl<B: ImageBackend> Transformer<B> {
    pub fn with_backend(site: SiteContext, config: &PipelineConfig, backend: B) -> Self {
        Self {
            site,
            layout: CacheLayout::from_config(&config.cache),
            tool_program: config.tool.program.clone(),
            backend,
            locks: DestinationLocks::new(),
        }
    }

    pub fn site(&self) -> &SiteContext {
        &self.site
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `options`: `geometry[,format[,quality[,crop[,gravity]]]]`
    pub fn resize(&self, source: &str, options: &str) -> Result<String, RequestError> {
        self.run(Operation::Resize, source, options).map(|o| o.url)
    }

    /// `options`: target format name, e.g. `webp`.
    pub fn format(&self, source: &str, options: &str) -> Result<String, RequestError> {
        self.run(Operation::Format, source, options).map(|o| o.url)
    }

    /// `options`: `crop[,gravity]`, where crop is `WxH+X+Y` or `W:H+X+Y`.
    pub fn crop(&self, source: &str, options: &str) -> Result<String, RequestError> {
        self.run(Operation::Crop, source, options).map(|o| o.url)
    }

    /// `options`: quality 1-100; anything else re-encodes at the default.
    pub fn quality(&self, source: &str, options: &str) -> Result<String, RequestError> {
        self.run(Operation::Quality, source, options).map(|o| o.url)
    }

    /// `options`: arguments for the external tool, split on whitespace.
    pub fn raw_tool(&self, source: &str, options: &str) -> Result<String, RequestError> {
        self.run(Operation::RawTool, source, options).map(|o| o.url)
    }

    /// Run one request of any kind.
    pub fn run(
        &self,
        operation: Operation,
        source: &str,
        options: &str,
    ) -> Result<TransformOutcome, RequestError> {
        self.execute(operation, source, options)
            .map_err(|kind| RequestError {
                operation,
                source_path: source.to_string(),
                options: options.to_string(),
                kind,
            })
    }

    fn execute(
        &self,
        operation: Operation,
        source: &str,
        options: &str,
    ) -> Result<TransformOutcome, TransformError> {
        debug!("{operation} '{source}' [{options}]");
        let source = source.trim();
        if source.is_empty() {
            return Err(TransformError::InvalidInput("source must not be empty".into()));
        }
        let spec = TransformSpec::parse(operation, options)?;

        let paths = self.layout.resolve(
            &self.site.source_root,
            source,
            &spec.cache_key(),
            spec.output_format().map(|f| f.extension.as_str()),
        )?;
        std::fs::create_dir_all(&paths.dest_dir)?;

        let generated = self
            .locks
            .with_lock(&paths.dest_path, || self.produce_if_stale(&spec, &paths))?;
        if generated {
            self.site.registry.register_generated_file(
                &self.site.source_root,
                &self.layout.dir,
                &paths.dest_filename,
            );
        }

        Ok(TransformOutcome {
            url: reference_url(&self.site.base_url, &paths.dest_path_relative),
            dest_path: paths.dest_path,
            generated,
        })
    }

    /// Produce the artifact if it is missing or stale. Must run under the
    /// destination lock.
    fn produce_if_stale(
        &self,
        spec: &TransformSpec,
        paths: &ResolvedPaths,
    ) -> Result<bool, TransformError> {
        if !must_create(&paths.src_path, &paths.dest_path)? {
            debug!("cache hit: {}", paths.dest_path_relative);
            return Ok(false);
        }

        info!(
            "generating {} from {}",
            paths.dest_path_relative,
            paths.src_path.display()
        );
        let bytes = match spec.pixel_ops() {
            Some(ops) => self.backend.transform(&TransformParams {
                source: paths.src_path.clone(),
                output: paths.dest_path.clone(),
                ops,
            })?,
            None => self.backend.invoke_tool(&ToolParams {
                program: self.tool_program.clone(),
                source: paths.src_path.clone(),
                output: paths.dest_path.clone(),
                args: spec.tool_args().unwrap_or_default().to_vec(),
            })?,
        };
        info!("wrote {} ({bytes} bytes)", paths.dest_path_relative);
        Ok(true)
    }
}
