// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, crop to ratio, downsize and encode. Operates on
// in-memory images using the `image` crate.

use forem_core::error::BridgeError;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, instrument};

/// Image pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new processor, enabling
/// method chaining.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&picked)?
///     .crop_to_ratio(1.5)
///     .downsize(1000)
///     .to_jpeg_bytes(90)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

/// Size an image of `width` x `height` must be scaled to so that neither side
/// exceeds `side_limit`, preserving aspect ratio and rounding down.
///
/// Images already within the limit are returned unchanged (no upscaling).
/// 3000x1500 with a limit of 1000 becomes 1000x500.
pub fn limited_size(width: u32, height: u32, side_limit: u32) -> (u32, u32) {
    // Integer arithmetic keeps the long side exactly at the limit.
    let scale = |side: u32, long: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(side_limit) / u64::from(long);
        (scaled as u32).max(1)
    };

    if width > height && width > side_limit {
        (side_limit, scale(height, width))
    } else if height > side_limit {
        (scale(width, height), side_limit)
    } else {
        (width, height)
    }
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, BridgeError> {
        let img = image::load_from_memory(data)
            .map_err(|err| BridgeError::ImageError(format!("failed to decode image: {err}")))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Scale down so neither side exceeds `side_limit` (see [`limited_size`]).
    #[instrument(skip(self))]
    pub fn downsize(self, side_limit: u32) -> Self {
        let (from_w, from_h) = self.dimensions();
        let (to_w, to_h) = limited_size(from_w, from_h, side_limit);
        if (to_w, to_h) == (from_w, from_h) {
            debug!(from_w, from_h, "Image within limit, not resized");
            return self;
        }

        info!(from_w, from_h, to_w, to_h, "Downsizing image");
        let resized = self
            .image
            .resize_exact(to_w, to_h, image::imageops::FilterType::Triangle);
        Self { image: resized }
    }

    /// Centre-crop to `ratio` (width / height). Non-positive or non-finite
    /// ratios, and images already at the ratio, are left untouched.
    #[instrument(skip(self))]
    pub fn crop_to_ratio(self, ratio: f64) -> Self {
        if !ratio.is_finite() || ratio <= 0.0 {
            return self;
        }
        let (w, h) = self.dimensions();
        if w == 0 || h == 0 {
            return self;
        }

        let current = f64::from(w) / f64::from(h);
        let (crop_w, crop_h) = if current > ratio {
            (((f64::from(h) * ratio).floor() as u32).clamp(1, w), h)
        } else {
            (w, ((f64::from(w) / ratio).floor() as u32).clamp(1, h))
        };
        if (crop_w, crop_h) == (w, h) {
            return self;
        }

        let x = (w - crop_w) / 2;
        let y = (h - crop_h) / 2;
        info!(x, y, crop_w, crop_h, "Cropping image to ratio");
        Self {
            image: self.image.crop_imm(x, y, crop_w, crop_h),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, BridgeError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, BridgeError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| BridgeError::ImageError(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, BridgeError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| BridgeError::ImageError(format!("image encoding failed: {err}")))?;
    Ok(buffer)
}
