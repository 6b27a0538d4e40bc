//! Test fixtures: generated JPEG/PNG images and non-image blobs.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Noisy RGB image; noise keeps the encoded size roughly proportional to the area.
fn noisy(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    RgbImage::from_fn(width, height, |_, _| {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    })
}

/// JPEG of about 50KB (a 160x160 noise image at quality 90).
pub fn create_test_jpeg(seed: u32) -> Vec<u8> {
    create_jpeg(160, 160, seed)
}

pub fn create_jpeg(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let img = noisy(width, height, seed);
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, 90);
    encoder.encode_image(&img).unwrap();
    buffer
}

pub fn create_png(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(noisy(width, height, seed));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// Minimal valid PDF.
pub fn create_test_pdf() -> Vec<u8> {
    b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
trailer
<< /Root 1 0 R >>
%%EOF"
        .to_vec()
}

/// Bytes with a JPEG signature that no decoder accepts.
pub fn create_corrupt_jpeg() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    data.extend(std::iter::repeat(0x42).take(512));
    data
}
