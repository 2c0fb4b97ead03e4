//! # imgpipe
//!
//! A build-time image transform cache for static sites. Given a source image
//! and a compact option string (`"400x400>,webp,80"`), it writes the
//! transformed image to a deterministic location under the site root, skips
//! the work when a fresh artifact already exists, and returns the URL to
//! embed in the generated page.
//!
//! # Architecture: One Request, Five Steps
//!
//! ```text
//! 1. Parse      options string →  TransformSpec         (typed, validated once)
//! 2. Resolve    source + spec  →  cache/resize/<name>   (pure function of the request)
//! 3. Check      mtimes         →  fresh? stop here
//! 4. Produce    backend        →  decode → orient → crop → resize → format → quality → strip → write
//! 5. Report     registry       →  notified once per written file; URL returned
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`transform`] | The facade: `resize`, `format`, `crop`, `quality`, `raw_tool` |
//! | [`request`] | Option-string parsing into a kind-tagged [`request::TransformSpec`] and its cache key |
//! | [`paths`] | Source/destination path resolution and filename policies |
//! | [`cache`] | Staleness check, per-destination locks, hit/miss statistics |
//! | [`imaging`] | Geometry parsing and math, the pixel pipeline, the backend trait |
//! | [`site`] | The host build's side: source root, base URL, file registry |
//! | [`process`] | Parallel batch runs from a JSON request list |
//! | [`config`] | `imgpipe.toml` loading, validation and defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Timestamps, Not Content Hashes
//!
//! A cached file is fresh when it is strictly newer than its source. Nothing
//! is read to decide that; two `stat` calls per request keep a template with
//! hundreds of image references cheap to re-render. Equal mtimes are stale.
//!
//! ## Filenames From the Typed Request
//!
//! Filenames hash the canonical rendering of the parsed request, not the raw
//! option string. `"400x400>, webp"` and `"400x400>,webp"` are the same
//! artifact; a resize and a format conversion to the same extension never
//! are. See [`paths`] for the two naming policies.
//!
//! ## Pure-Rust Pixels, Opt-In Tool
//!
//! The typed operations run entirely on the `image` crate (plus `webp` for
//! lossy WebP), so builds need no system packages. Only the raw operation
//! shells out to an external tool (`convert` by default), for operations the
//! typed pipeline doesn't cover.
//!
//! ## Atomic Writes
//!
//! Every artifact is written to a temporary file next to its destination and
//! renamed into place. A reader, or a concurrent build, sees the old file or
//! the complete new one.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod output;
pub mod paths;
pub mod process;
pub mod request;
pub mod site;
pub mod transform;

pub use request::{Operation, TransformSpec};
pub use site::{FileRegistry, SiteContext, StaticFileRegistry};
pub use transform::{RequestError, TransformError, TransformOutcome, Transformer};

#[cfg(test)]
pub(crate) mod test_helpers;
