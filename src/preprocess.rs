// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Image decoding, validation and tensor conversion for the measurement models.

use crate::error::{PreprocessError, MAX_IMAGE_SIZE};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, RgbImage};
use ndarray::Array4;

/// Smallest usable face image edge. Anything below this cannot carry enough
/// texture detail for the measurement models.
pub const MIN_IMAGE_EDGE: u32 = 64;

/// How an image is fitted to a model's input shape. Documented per model in
/// its `ModelSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Stretch to the exact target shape (classification-style models).
    Stretch,
    /// Preserve aspect ratio, pad the remainder with black (detector-style
    /// models that are sensitive to geometry).
    AspectPad,
}

/// Image metadata extracted during decoding.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size_bytes: usize,
}

/// Decode and validate raw image bytes.
///
/// The only caller-fatal failure in the pipeline: an unreadable image aborts
/// the whole request, while downstream failures degrade gracefully.
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, ImageInfo), PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::EmptyData);
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(PreprocessError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    let format = detect_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PreprocessError::DecodeFailed(e.to_string()))?;

    let (width, height) = img.dimensions();
    if width < MIN_IMAGE_EDGE || height < MIN_IMAGE_EDGE {
        return Err(PreprocessError::TooSmall {
            width,
            height,
            min: MIN_IMAGE_EDGE,
        });
    }

    let info = ImageInfo {
        width,
        height,
        format,
        size_bytes: bytes.len(),
    };
    Ok((img, info))
}

/// Detect image format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, PreprocessError> {
    if bytes.len() < 4 {
        return Err(PreprocessError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        _ => Err(PreprocessError::UnsupportedFormat),
    }
}

/// MIME subtype for the provider data URLs.
pub fn format_to_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        _ => "octet-stream",
    }
}

/// Convert a decoded image into a model-ready tensor.
///
/// Output layout is channel-first `[1, 3, height, width]` with values
/// normalized to [0,1], matching the measurement models' training pipeline.
pub fn to_tensor(
    image: &DynamicImage,
    width: u32,
    height: u32,
    policy: ResizePolicy,
) -> Result<Array4<f32>, PreprocessError> {
    if width == 0 || height == 0 {
        return Err(PreprocessError::DecodeFailed(
            "target shape has a zero dimension".to_string(),
        ));
    }

    let rgb: RgbImage = match policy {
        ResizePolicy::Stretch => image
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8(),
        ResizePolicy::AspectPad => {
            let fitted = image.resize(width, height, FilterType::Triangle).to_rgb8();
            let mut canvas = RgbImage::new(width, height);
            let x_off = (width - fitted.width()) / 2;
            let y_off = (height - fitted.height()) / 2;
            image::imageops::overlay(&mut canvas, &fitted, x_off as i64, y_off as i64);
            canvas
        }
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }

    Ok(tensor)
}
