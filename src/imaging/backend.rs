//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the one capability the materializer needs
//! from an image library: decode a source, replay a [`Pipeline`], encode the
//! result in the requested format. Encoded bytes are returned rather than
//! written so the caller decides how the cache file is published.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::Pipeline;
use crate::source::SourceImage;
use image::ImageFormat;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Output formats the backends can encode.
const OUTPUT_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

/// Pick the output format from the cache file's extension.
pub fn output_format(path: &Path) -> Result<ImageFormat, BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    ImageFormat::from_extension(ext)
        .filter(|format| OUTPUT_FORMATS.contains(format))
        .ok_or_else(|| BackendError::UnsupportedFormat(ext.to_string()))
}

/// Trait for image processing backends.
pub trait ImageBackend: Send + Sync {
    /// Decode `source`, apply `pipeline`, and encode as `format`.
    fn render(
        &self,
        source: &SourceImage,
        pipeline: &Pipeline,
        format: ImageFormat,
    ) -> Result<Vec<u8>, BackendError>;
}

impl<B: ImageBackend + ?Sized> ImageBackend for std::sync::Arc<B> {
    fn render(
        &self,
        source: &SourceImage,
        pipeline: &Pipeline,
        format: ImageFormat,
    ) -> Result<Vec<u8>, BackendError> {
        (**self).render(source, pipeline, format)
    }
}
