use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use mediahub_core::{Conversion, Fit};

/// Target box of a resize; a missing side follows the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeDimensions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ResizeDimensions {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width: width.filter(|w| *w > 0),
            height: height.filter(|h| *h > 0),
        }
    }

    /// Square bounding box, as used for the original's maximum dimension.
    pub fn square(size: u32) -> Self {
        Self::new(Some(size), Some(size))
    }
}

impl From<&Conversion> for ResizeDimensions {
    fn from(conversion: &Conversion) -> Self {
        Self::new(conversion.width, conversion.height)
    }
}

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Resolve the target box for an image of `orig_width` x `orig_height`.
    pub fn calculate_dimensions(
        orig_width: u32,
        orig_height: u32,
        dimensions: ResizeDimensions,
    ) -> (u32, u32) {
        match (dimensions.width, dimensions.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => {
                let aspect_ratio = orig_height as f32 / orig_width as f32;
                let h = (w as f32 * aspect_ratio).round() as u32;
                (w, h.max(1))
            }
            (None, Some(h)) => {
                let aspect_ratio = orig_width as f32 / orig_height as f32;
                let w = (h as f32 * aspect_ratio).round() as u32;
                (w.max(1), h)
            }
            (None, None) => (orig_width, orig_height),
        }
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width.max(1) as f32;
        let height_ratio = orig_height as f32 / new_height.max(1) as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            imageops::FilterType::CatmullRom
        } else {
            imageops::FilterType::Lanczos3
        }
    }

    /// Resize image to exact dimensions
    pub fn resize_image(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        if (orig_width, orig_height) == (width, height) {
            return img.clone();
        }
        let filter = Self::select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    }

    /// Size of the image scaled to fit inside the box, aspect ratio kept.
    fn fit_inside(
        orig_width: u32,
        orig_height: u32,
        target_width: u32,
        target_height: u32,
        allow_upscale: bool,
    ) -> (u32, u32) {
        let scale_width = target_width as f32 / orig_width as f32;
        let scale_height = target_height as f32 / orig_height as f32;
        let mut scale = scale_width.min(scale_height);
        if !allow_upscale {
            scale = scale.min(1.0);
        }

        let width = ((orig_width as f32 * scale).round() as u32).clamp(1, target_width.max(1));
        let height = ((orig_height as f32 * scale).round() as u32).clamp(1, target_height.max(1));
        (width, height)
    }

    /// Fit the image in the box and center it on a white canvas of the box size.
    pub fn resize_with_fill(
        img: &DynamicImage,
        target_width: u32,
        target_height: u32,
        allow_upscale: bool,
    ) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let (scaled_width, scaled_height) = Self::fit_inside(
            orig_width,
            orig_height,
            target_width,
            target_height,
            allow_upscale,
        );

        let bg_color = Rgba([255u8, 255u8, 255u8, 255u8]);
        let canvas_img = RgbaImage::from_pixel(target_width, target_height, bg_color);
        let mut canvas = DynamicImage::ImageRgba8(canvas_img);

        let x_offset = target_width.saturating_sub(scaled_width) / 2;
        let y_offset = target_height.saturating_sub(scaled_height) / 2;

        let resized = Self::resize_image(img, scaled_width, scaled_height);
        imageops::overlay(&mut canvas, &resized, x_offset as i64, y_offset as i64);

        canvas
    }

    /// Apply a conversion fit mode.
    pub fn apply_fit(img: &DynamicImage, fit: Fit, dimensions: ResizeDimensions) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return img.clone();
        }
        let (target_width, target_height) =
            Self::calculate_dimensions(orig_width, orig_height, dimensions);

        match fit {
            Fit::Contain | Fit::Max => {
                let (w, h) = Self::fit_inside(
                    orig_width,
                    orig_height,
                    target_width,
                    target_height,
                    fit == Fit::Contain,
                );
                Self::resize_image(img, w, h)
            }
            Fit::Fill => Self::resize_with_fill(img, target_width, target_height, true),
            Fit::FillMax => Self::resize_with_fill(img, target_width, target_height, false),
            Fit::Stretch => Self::resize_image(img, target_width, target_height),
            Fit::Crop => {
                let filter =
                    Self::select_filter(orig_width, orig_height, target_width, target_height);
                img.resize_to_fill(target_width, target_height, filter)
            }
        }
    }
}
