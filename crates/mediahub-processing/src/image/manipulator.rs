//! Optimization of originals and rendering of conversions
//!
//! Everything here is CPU-bound and synchronous; callers run it on the blocking pool.

use super::resize::{ImageResize, ResizeDimensions};
use crate::compression::{ImageCompressor, OutputFormat, QualityPreset};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use mediahub_core::{AppError, Conversion, Fit};

/// Encoded image plus the mime type it was written as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub bytes: Bytes,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageManipulator {
    quality: QualityPreset,
}

impl ImageManipulator {
    pub fn new(quality: QualityPreset) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, AppError> {
        image::load_from_memory(bytes)
            .map_err(|e| AppError::CorruptMedia(format!("Failed to decode image: {}", e)))
    }

    /// Re-encode the original in its own format, shrinking it to `max_dimensions` when set.
    ///
    /// Without a resize the smaller of the re-encoded and the input bytes is kept, so an
    /// already well-compressed file is never made larger. Types with no encoder pass
    /// through untouched.
    pub fn optimize_original(
        &self,
        bytes: Bytes,
        mime_type: &str,
        max_dimensions: Option<u32>,
    ) -> Result<Rendition, AppError> {
        let Some(format) = OutputFormat::from_mime(mime_type) else {
            return Ok(Rendition {
                bytes,
                mime_type: mime_type.to_string(),
            });
        };

        let img = Self::decode(&bytes)?;
        let (width, height) = img.dimensions();

        let (img, resized) = match max_dimensions.filter(|max| *max > 0) {
            Some(max) if width > max || height > max => (
                ImageResize::apply_fit(&img, Fit::Max, ResizeDimensions::square(max)),
                true,
            ),
            _ => (img, false),
        };

        let encoded = ImageCompressor::compress(&img, format, self.quality)?;

        if !resized && encoded.len() >= bytes.len() {
            tracing::debug!(
                original_bytes = bytes.len(),
                encoded_bytes = encoded.len(),
                "Re-encoding did not shrink the original, keeping it"
            );
            return Ok(Rendition {
                bytes,
                mime_type: mime_type.to_string(),
            });
        }

        Ok(Rendition {
            bytes: encoded,
            mime_type: format.to_mime_type().to_string(),
        })
    }

    /// Render a conversion from the (optimized) original.
    ///
    /// The target format is the conversion's `format` when set and known, otherwise
    /// the source format, otherwise PNG.
    pub fn render_conversion(
        &self,
        bytes: &[u8],
        mime_type: &str,
        conversion: &Conversion,
    ) -> Result<Rendition, AppError> {
        let format = Self::target_format(conversion, mime_type);
        let img = Self::decode(bytes)?;
        let rendered = ImageResize::apply_fit(&img, conversion.fit, conversion.into());
        let encoded = ImageCompressor::compress(&rendered, format, self.quality)?;

        Ok(Rendition {
            bytes: encoded,
            mime_type: format.to_mime_type().to_string(),
        })
    }

    fn target_format(conversion: &Conversion, mime_type: &str) -> OutputFormat {
        if let Some(requested) = conversion.format.as_deref() {
            match OutputFormat::parse(requested) {
                Ok(format) => return format,
                Err(_) => tracing::warn!(
                    conversion = %conversion.name,
                    format = %requested,
                    "Unknown conversion format, keeping the source format"
                ),
            }
        }
        OutputFormat::from_mime(mime_type).unwrap_or(OutputFormat::Png)
    }
}
