// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
use derma_analysis_node::preprocess::{decode_image, to_tensor, ResizePolicy};
use derma_analysis_node::PreprocessError;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

#[test]
fn test_decode_reports_dimensions_and_format() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 80, image::Rgb([10, 20, 30])));
    let bytes = encode(&source, ImageFormat::Png);

    let (decoded, info) = decode_image(&bytes).unwrap();
    assert_eq!(info.width, 100);
    assert_eq!(info.height, 80);
    assert_eq!(info.format, ImageFormat::Png);
    assert_eq!(decoded.width(), 100);
}

#[test]
fn test_empty_and_garbage_inputs_rejected() {
    assert!(matches!(
        decode_image(&[]),
        Err(PreprocessError::EmptyData)
    ));
    assert!(matches!(
        decode_image(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]),
        Err(PreprocessError::UnsupportedFormat)
    ));
}

#[test]
fn test_truncated_png_rejected() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, image::Rgb([5, 5, 5])));
    let mut bytes = encode(&source, ImageFormat::Png);
    bytes.truncate(bytes.len() / 2);
    assert!(matches!(
        decode_image(&bytes),
        Err(PreprocessError::DecodeFailed(_))
    ));
}

#[test]
fn test_tiny_image_rejected() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([5, 5, 5])));
    let bytes = encode(&source, ImageFormat::Png);
    assert!(matches!(
        decode_image(&bytes),
        Err(PreprocessError::TooSmall { .. })
    ));
}

#[test]
fn test_jpeg_also_accepted() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(96, 96, image::Rgb([90, 90, 90])));
    let bytes = encode(&source, ImageFormat::Jpeg);
    let (_, info) = decode_image(&bytes).unwrap();
    assert_eq!(info.format, ImageFormat::Jpeg);
}

#[test]
fn test_tensor_layout_and_range() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(96, 64, image::Rgb([255, 0, 128])));
    let tensor = to_tensor(&source, 224, 224, ResizePolicy::Stretch).unwrap();

    assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    // Channel planes carry the pixel's normalized channel values.
    assert!((tensor[[0, 0, 100, 100]] - 1.0).abs() < 1e-3);
    assert!(tensor[[0, 1, 100, 100]].abs() < 1e-3);
    assert!((tensor[[0, 2, 100, 100]] - 128.0 / 255.0).abs() < 1e-2);
}

#[test]
fn test_aspect_pad_keeps_content_centered() {
    // A wide white image letterboxed into a square: the vertical middle is
    // bright, the top and bottom bands are padding.
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 50, image::Rgb([255, 255, 255])));
    let tensor = to_tensor(&source, 224, 224, ResizePolicy::AspectPad).unwrap();

    assert!(tensor[[0, 0, 112, 112]] > 0.9);
    assert!(tensor[[0, 0, 5, 112]] < 0.1);
    assert!(tensor[[0, 0, 218, 112]] < 0.1);
}
