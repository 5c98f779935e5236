//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate decoders, format sniffed from content |
//! | Resize | `DynamicImage::resize_exact` with the configured filter |
//! | Center crop | `DynamicImage::crop_imm` |
//! | Extent (pad to exact size) | `image::imageops::overlay` onto a white canvas |
//! | Encode JPEG | `JpegEncoder::new_with_quality` |
//! | Encode PNG / TIFF / WebP | `DynamicImage::write_to` (quality does not apply) |
//!
//! Two resampling profiles exist: the default Lanczos3 and an alternate
//! triangle (bilinear) filter selected by `use_alternate_processor`.
//!
//! No step may grow the image past `max_dimension` on either side; such a
//! pipeline fails before any pixel buffer is allocated. Decoding runs under
//! the `image` crate's default [`Limits`](image::Limits).

use super::backend::{BackendError, ImageBackend};
use super::calculations::{center_crop_rect, extent_offset, resize_dimensions};
use super::params::{MAX_DIMENSION, Pipeline, Quality, Step};
use crate::source::SourceImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy)]
pub struct RustBackend {
    filter: FilterType,
    max_dimension: u32,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            max_dimension: MAX_DIMENSION,
        }
    }

    /// The alternate processor: faster, softer triangle filtering.
    pub fn alternate() -> Self {
        Self {
            filter: FilterType::Triangle,
            ..Self::new()
        }
    }

    /// Cap the width and height any step may produce.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Backend selected by the `use_alternate_processor` setting.
    pub fn select(use_alternate: bool) -> Self {
        if use_alternate {
            Self::alternate()
        } else {
            Self::new()
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode a source image.
fn load_image(source: &SourceImage) -> Result<DynamicImage, BackendError> {
    match source {
        SourceImage::File(path) => ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            }),
        SourceImage::Bytes(bytes) => image::load_from_memory(bytes).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode source bytes: {}", e))
        }),
    }
}

fn check_extent(size: (u32, u32), max: u32) -> Result<(), BackendError> {
    if size.0 > max || size.1 > max {
        return Err(BackendError::ProcessingFailed(format!(
            "{}x{} exceeds the {max}px limit",
            size.0, size.1
        )));
    }
    Ok(())
}

fn apply_step(
    img: DynamicImage,
    step: &Step,
    filter: FilterType,
    max: u32,
) -> Result<DynamicImage, BackendError> {
    match *step {
        Step::Resize { width, height } => {
            let (w, h) = resize_dimensions((img.width(), img.height()), width, height);
            if (w, h) == (img.width(), img.height()) {
                return Ok(img);
            }
            check_extent((w, h), max)?;
            Ok(img.resize_exact(w, h, filter))
        }
        Step::CenterCrop { width, height } => {
            let (x, y, w, h) = center_crop_rect((img.width(), img.height()), (width, height));
            if (w, h) == (width, height) {
                return Ok(img.crop_imm(x, y, w, h));
            }
            check_extent((width, height), max)?;
            let cropped = img.crop_imm(x, y, w, h);
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
            let (ox, oy) = extent_offset((w, h), (width, height));
            image::imageops::overlay(&mut canvas, &cropped.to_rgba8(), ox.into(), oy.into());
            Ok(DynamicImage::ImageRgba8(canvas))
        }
    }
}

/// Encode to `format`. JPEG has no alpha channel, so it goes through RGB8.
fn encode_image(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value());
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        other => DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, other),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{format:?} encode failed: {e}")))?;
    Ok(buf.into_inner())
}

impl ImageBackend for RustBackend {
    fn render(
        &self,
        source: &SourceImage,
        pipeline: &Pipeline,
        format: ImageFormat,
    ) -> Result<Vec<u8>, BackendError> {
        let img = pipeline
            .steps()
            .iter()
            .try_fold(load_image(source)?, |img, step| {
                apply_step(img, step, self.filter, self.max_dimension)
            })?;
        encode_image(
            &img,
            format,
            pipeline.encode_quality().unwrap_or_default(),
        )
    }
}
