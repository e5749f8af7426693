//! Pixel-dimension validation of fetched image bytes.
//!
//! Bytes are fully decoded (not just header-sniffed) so truncated or corrupt
//! payloads surface as [`DecodeError`] instead of being stored.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use thiserror::Error;
use tracing::trace;

/// Default minimum width and height in pixels.
pub const DEFAULT_MIN_DIMENSION: u32 = 512;

/// Bytes could not be decoded as a supported raster image.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No known image signature at the start of the payload.
    #[error("unrecognized image format ({len} bytes)")]
    UnknownFormat {
        /// Payload length.
        len: usize,
    },

    /// Signature recognized but decoding failed (truncated, corrupt, or unsupported).
    #[error("failed to decode {format:?} image: {source}")]
    Corrupt {
        /// Detected container format.
        format: ImageFormat,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },
}

/// Classification of a successfully decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Both dimensions met the threshold.
    pub accepted: bool,
    /// Decoded width in pixels.
    pub width: u32,
    /// Decoded height in pixels.
    pub height: u32,
    /// Detected raster format.
    pub format: ImageFormat,
}

impl ValidationOutcome {
    /// Preferred file extension for the detected format, without the dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Minimum-dimension gate applied to every fetched image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageValidator {
    min_width: u32,
    min_height: u32,
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DIMENSION, DEFAULT_MIN_DIMENSION)
    }
}

impl ImageValidator {
    /// Creates a validator with explicit thresholds.
    #[must_use]
    pub fn new(min_width: u32, min_height: u32) -> Self {
        Self {
            min_width,
            min_height,
        }
    }

    #[must_use]
    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    #[must_use]
    pub fn min_height(&self) -> u32 {
        self.min_height
    }

    /// Returns `false` when a known size is below either threshold.
    ///
    /// Used for cheap pre-fetch checks against size hints.
    #[must_use]
    pub fn meets_threshold(&self, width: u32, height: u32) -> bool {
        width >= self.min_width && height >= self.min_height
    }

    /// Decodes `bytes` and classifies the image by its real dimensions.
    ///
    /// CPU-bound: async callers should run it on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the payload is not a decodable raster image.
    pub fn validate(&self, bytes: &[u8]) -> Result<ValidationOutcome, DecodeError> {
        let format =
            image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat { len: bytes.len() })?;

        let mut reader = ImageReader::new(Cursor::new(bytes));
        reader.set_format(format);
        let decoded = reader
            .decode()
            .map_err(|source| DecodeError::Corrupt { format, source })?;

        let (width, height) = (decoded.width(), decoded.height());
        let accepted = self.meets_threshold(width, height);
        trace!(?format, width, height, accepted, "image decoded");

        Ok(ValidationOutcome {
            accepted,
            width,
            height,
            format,
        })
    }
}
