//! Batch processing of transform requests.
//!
//! A build usually knows its image references up front. Instead of one CLI
//! call per reference, it writes them to a JSON file:
//!
//! ```json
//! [
//!   { "operation": "resize", "source": "img/cat.jpg", "options": "400x400>,webp,80" },
//!   { "operation": "crop",   "source": "img/dog.jpg", "options": "1:1+0+0,center" },
//!   { "operation": "magick", "source": "img/cat.jpg", "options": "-colorspace Gray" }
//! ]
//! ```
//!
//! and runs them in one go. Results come back in request order.
//!
//! ## Parallel Processing
//!
//! Requests run in parallel using [rayon](https://docs.rs/rayon). Requests
//! that share a cache key are serialized by the transformer's destination
//! locks, so duplicates in one batch are produced once.
//!
//! The first failing request aborts the batch: rayon stops handing out new
//! work and the error is returned. Artifacts finished before that stay in the
//! cache and are hits on the next run.

use crate::cache::CacheStats;
use crate::imaging::ImageBackend;
use crate::request::Operation;
use crate::transform::{RequestError, Transformer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRequest {
    pub operation: Operation,
    pub source: String,
    pub options: String,
}

/// Outcome of one request, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub operation: Operation,
    pub source: String,
    pub url: String,
    pub generated: bool,
}

/// Progress event emitted as each request completes.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Completed { index: usize, item: BatchItem },
}

#[derive(Debug)]
pub struct BatchResult {
    pub items: Vec<BatchItem>,
    pub cache_stats: CacheStats,
}

/// Read a JSON array of requests.
pub fn load_requests(path: &Path) -> Result<Vec<BatchRequest>, ProcessError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Run every request, in parallel, stopping at the first failure.
///
/// When `events` is given, a [`BatchEvent`] is sent as each request
/// finishes (in completion order, not request order).
pub fn run_batch<B: ImageBackend>(
    transformer: &Transformer<B>,
    requests: &[BatchRequest],
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchResult, ProcessError> {
    let items = requests
        .par_iter()
        .enumerate()
        .map(|(index, request)| {
            let outcome = transformer.run(request.operation, &request.source, &request.options)?;
            let item = BatchItem {
                operation: request.operation,
                source: request.source.clone(),
                url: outcome.url,
                generated: outcome.generated,
            };
            if let Some(tx) = &events {
                tx.send(BatchEvent::Completed {
                    index,
                    item: item.clone(),
                })
                .ok();
            }
            Ok::<_, RequestError>(item)
        })
        .collect::<Result<Vec<_>, RequestError>>()?;

    let mut cache_stats = CacheStats::default();
    for item in &items {
        if item.generated {
            cache_stats.miss();
        } else {
            cache_stats.hit();
        }
    }
    Ok(BatchResult { items, cache_stats })
}
