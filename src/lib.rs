//! # Image Printer
//!
//! A request-triggered image resizing cache. Pages link to derived images
//! whose URL spells out how to render them:
//!
//! ```text
//! /ip/large/image__width-200,height-100,quality-80,crop-true.jpg
//! ```
//!
//! The first request for such a path decodes it back into the source
//! (`large/image.jpg`) and the options, renders the variant, and writes it
//! to the same relative path under the cache directory. Later requests are
//! served straight from disk until the source changes.
//!
//! # Request Flow
//!
//! ```text
//! path → decode → validate source → check cache ─┬─ valid ─────────────────→ serve
//!                                               └─ missing/stale/empty → materialize → serve
//! ```
//!
//! Link generation runs the encoding half of the same codec, so a link and
//! the cache file it ends up at always agree.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`options`] | Option sets and their `key-value,key-value` path encoding |
//! | [`cache_key`] | `(source, options)` → cache path |
//! | [`request`] | Request path → `(source, options, cache path)` |
//! | [`staleness`] | Is a cache file present, fresh and non-empty |
//! | [`source`] | Source directory or resolver, plus source validation |
//! | [`imaging`] | Deferred pipelines, named operations, the `image`-crate backend |
//! | [`materialize`] | Render a variant and publish it atomically |
//! | [`responder`] | Response values and the static file responder |
//! | [`handler`] | [`ImagePrinter`](handler::ImagePrinter): the request boundary and status mapping |
//! | [`link`] | URL generation for templates |
//! | [`audit`] | Classify and prune cache entries |
//! | [`warm`] | Pre-render variants in parallel |
//! | [`config`] | `imageprinter.toml` loading, merging, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Path Is the Cache Key
//!
//! There is no index or database. The encoded options live in the file name,
//! so the URL and the on-disk path are the same string and a cache hit is a
//! single `stat`. Deleting the cache directory is always safe.
//!
//! ## Deferred Operations
//!
//! Operations never touch pixels. They record resize and crop steps on a
//! [`Pipeline`](imaging::Pipeline), and the backend decodes, replays and
//! encodes in one go. Operations stay pure and testable against a mock
//! backend, and a request for an unregistered operation fails before
//! anything is created on disk.
//!
//! ## Write, Then Rename
//!
//! Variants are written to a temp file beside the cache path and renamed
//! into place. Readers never see a half-written file. Two requests racing
//! on the same missing variant both render it; output is deterministic, so
//! whichever rename lands last leaves identical bytes. `single_flight`
//! serializes them instead when rendering is expensive.

pub mod audit;
pub mod cache_key;
pub mod config;
pub mod handler;
pub mod imaging;
pub mod link;
pub mod materialize;
pub mod options;
pub mod output;
pub mod request;
pub mod responder;
pub mod source;
pub mod staleness;
pub mod warm;

#[cfg(test)]
pub(crate) mod test_helpers;
