use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Encoder quality levels for one preset
#[derive(Debug, Clone, Copy, PartialEq)]
struct QualityLevels {
    jpeg: u8,
    webp: f32,
    avif: u8,
}

/// Optimization strength, from `best` (largest files) to `lightest` (smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    #[default]
    Normal,
    Better,
    Best,
    Lighter,
    Lightest,
}

impl QualityPreset {
    pub fn parse(s: &str) -> Result<Self> {
        let preset = match s.trim().to_lowercase().as_str() {
            "normal" => QualityPreset::Normal,
            "better" => QualityPreset::Better,
            "best" => QualityPreset::Best,
            "lighter" => QualityPreset::Lighter,
            "lightest" => QualityPreset::Lightest,
            other => return Err(anyhow!("Invalid quality preset: {}", other)),
        };
        Ok(preset)
    }

    fn levels(self) -> QualityLevels {
        let (jpeg, webp, avif) = match self {
            QualityPreset::Best => (95, 98.0, 90),
            QualityPreset::Better => (85, 90.0, 80),
            QualityPreset::Normal => (75, 80.0, 70),
            QualityPreset::Lighter => (65, 70.0, 60),
            QualityPreset::Lightest => (50, 55.0, 45),
        };
        QualityLevels { jpeg, webp, avif }
    }

    /// JPEG quality (0-100)
    pub fn jpeg_quality(self) -> u8 {
        self.levels().jpeg
    }

    /// WebP quality (0-100)
    pub fn webp_quality(self) -> f32 {
        self.levels().webp
    }

    /// AVIF quality (0-100)
    pub fn avif_quality(self) -> u8 {
        self.levels().avif
    }
}

/// Encodings a rendition or optimized original can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            "gif" => Ok(OutputFormat::Gif),
            _ => Err(anyhow!("Invalid format: {}", s)),
        }
    }

    /// Format matching a stored mime type, `None` for types we cannot re-encode.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(OutputFormat::Jpeg),
            "image/png" => Some(OutputFormat::Png),
            "image/webp" => Some(OutputFormat::WebP),
            "image/avif" => Some(OutputFormat::Avif),
            "image/gif" => Some(OutputFormat::Gif),
            _ => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Gif => "image/gif",
        }
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Avif => ImageFormat::Avif,
            OutputFormat::Gif => ImageFormat::Gif,
        }
    }
}

/// Encoder front for every [`OutputFormat`]
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode the image in `format` at the preset's quality.
    pub fn compress(
        img: &DynamicImage,
        format: OutputFormat,
        quality: QualityPreset,
    ) -> Result<Bytes> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("Cannot encode an empty image"));
        }

        match format {
            OutputFormat::Jpeg => Self::compress_jpeg(img, quality),
            OutputFormat::Png => Self::encode_with(img, ImageFormat::Png),
            OutputFormat::WebP => Self::compress_webp(img, quality),
            OutputFormat::Avif => Self::compress_avif(img, quality),
            OutputFormat::Gif => Self::encode_with(img, ImageFormat::Gif),
        }
    }

    fn compress_jpeg(img: &DynamicImage, quality: QualityPreset) -> Result<Bytes> {
        let rgb = img.to_rgb8();

        let mut settings = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        settings.set_size(rgb.width() as usize, rgb.height() as usize);
        settings.set_quality(f32::from(quality.jpeg_quality()));
        settings.set_progressive_mode();
        settings.set_optimize_coding(true);

        let mut started = settings.start_compress(Vec::new())?;
        started.write_scanlines(rgb.as_raw())?;
        Ok(Bytes::from(started.finish()?))
    }

    fn encode_with(img: &DynamicImage, format: ImageFormat) -> Result<Bytes> {
        let mut out = Cursor::new(Vec::new());
        match format {
            // GIF has no 16-bit or float variants
            ImageFormat::Gif => {
                DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut out, format)?
            }
            _ => img.write_to(&mut out, format)?,
        }
        Ok(Bytes::from(out.into_inner()))
    }

    fn compress_webp(img: &DynamicImage, quality: QualityPreset) -> Result<Bytes> {
        let rgba = img.to_rgba8();
        let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode(quality.webp_quality());
        Ok(Bytes::copy_from_slice(&encoded))
    }

    fn compress_avif(img: &DynamicImage, quality: QualityPreset) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let pixels: Vec<rgb::RGB8> = rgb_img
            .pixels()
            .map(|p| rgb::RGB8::new(p[0], p[1], p[2]))
            .collect();

        let encoded = ravif::Encoder::new()
            .with_quality(f32::from(quality.avif_quality()))
            .with_speed(6)
            .encode_rgb(ravif::Img::new(
                pixels.as_slice(),
                rgb_img.width() as usize,
                rgb_img.height() as usize,
            ))?;

        Ok(Bytes::from(encoded.avif_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn test_quality_preset_parse() {
        assert_eq!(QualityPreset::parse("normal").unwrap(), QualityPreset::Normal);
        assert_eq!(QualityPreset::parse("BEST").unwrap(), QualityPreset::Best);
        assert_eq!(QualityPreset::parse(" lighter ").unwrap(), QualityPreset::Lighter);
        assert!(QualityPreset::parse("invalid").is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("jpg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("JPEG").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("webp").unwrap(), OutputFormat::WebP);
        assert_eq!(OutputFormat::parse("gif").unwrap(), OutputFormat::Gif);
        assert!(OutputFormat::parse("auto").is_err());
    }

    #[test]
    fn test_output_format_from_mime() {
        assert_eq!(OutputFormat::from_mime("image/jpeg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_mime("image/avif"), Some(OutputFormat::Avif));
        assert_eq!(OutputFormat::from_mime("image/svg+xml"), None);
        assert_eq!(OutputFormat::from_mime("application/pdf"), None);
    }

    #[test]
    fn test_quality_values() {
        assert_eq!(QualityPreset::Normal.jpeg_quality(), 75);
        assert_eq!(QualityPreset::Lightest.jpeg_quality(), 50);
        assert_eq!(QualityPreset::Best.webp_quality(), 98.0);
        assert_eq!(QualityPreset::Better.avif_quality(), 80);
    }

    #[test]
    fn test_compress_produces_decodable_output() {
        let img = red_square();

        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Gif] {
            let data = ImageCompressor::compress(&img, format, QualityPreset::Normal).unwrap();
            assert!(!data.is_empty());
            assert_eq!(
                image::guess_format(&data).unwrap(),
                format.to_image_format(),
                "{format:?}"
            );
        }
    }

    #[test]
    fn test_compress_webp() {
        let data =
            ImageCompressor::compress(&red_square(), OutputFormat::WebP, QualityPreset::Lighter)
                .unwrap();
        assert_eq!(infer::get(&data).map(|k| k.mime_type()), Some("image/webp"));
    }
}
