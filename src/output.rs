//! CLI output formatting.
//!
//! Output is **reference-first**: a single request prints only its reference
//! URL, so the CLI can be used from shell substitutions. Batch runs print one
//! line per request as it completes, then a cache summary.
//!
//! # Output Format
//!
//! ## Single request
//!
//! ```text
//! /blog/cache/resize/3f0c9a…e1.webp
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 resize img/cat.jpg → /cache/resize/3f0c9a…e1.webp (generated)
//! 002 crop img/dog.jpg → /cache/resize/91b2d7…04.jpg (cached)
//! Cache: 1 cached, 1 generated (2 total)
//! ```
//!
//! Line numbers are 1-based request positions; lines themselves arrive in
//! completion order.

use crate::cache::CacheStats;
use crate::process::{BatchEvent, BatchItem};
use crate::site::GeneratedFile;

fn format_index(pos: usize) -> String {
    format!("{:03}", pos)
}

fn status(item: &BatchItem) -> &'static str {
    if item.generated { "generated" } else { "cached" }
}

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Completed { index, item } => vec![format!(
            "{} {} {} → {} ({})",
            format_index(index + 1),
            item.operation,
            item.source,
            item.url,
            status(item)
        )],
    }
}

pub fn format_cache_summary(stats: &CacheStats) -> String {
    format!("Cache: {}", stats)
}

/// List of files handed to the registry, one per line, for `--verbose` runs.
pub fn format_generated_files(files: &[GeneratedFile]) -> Vec<String> {
    files
        .iter()
        .map(|f| format!("    {}", f.relative_dir.join(&f.filename).display()))
        .collect()
}
