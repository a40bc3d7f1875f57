use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{RgbaImage, imageops};
use tracing::warn;

use crate::processing::layout::{Size, scaled_to_height, scaled_to_width};

/// Resamples `source` to `target` with a Catmull-Rom convolution.
pub fn resize_rgba(source: &RgbaImage, target: Size) -> Result<RgbaImage> {
    if target.is_empty() {
        anyhow::bail!("resize dimensions must be positive");
    }
    if source.width() == target.width && source.height() == target.height {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resize")?;
    let mut dst_image = fir::images::Image::new(target.width, target.height, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("resize failed")?;
    RgbaImage::from_raw(target.width, target.height, dst_image.into_vec())
        .context("failed to construct resized RGBA image")
}

/// Like [`resize_rgba`], but falls back to `image`'s triangle filter instead
/// of failing. Rendering never aborts over a resample.
pub fn scale_rgba(source: &RgbaImage, target: Size) -> RgbaImage {
    let target = Size::new(target.width.max(1), target.height.max(1));
    match resize_rgba(source, target) {
        Ok(image) => image,
        Err(err) => {
            warn!(error = ?err, width = target.width, height = target.height, "fast resize failed; using fallback filter");
            imageops::resize(source, target.width, target.height, imageops::FilterType::Triangle)
        }
    }
}

/// Scales to `width`, never letting the height fall below `min_height`.
pub fn scale_to_width(source: &RgbaImage, width: u32, min_height: u32) -> RgbaImage {
    let natural = Size::new(source.width(), source.height());
    let size = scaled_to_width(natural, width);
    scale_rgba(source, Size::new(size.width, size.height.max(min_height)))
}

/// Scales to `height`, never letting the width fall below `min_width`.
pub fn scale_to_height(source: &RgbaImage, height: u32, min_width: u32) -> RgbaImage {
    let natural = Size::new(source.width(), source.height());
    let size = scaled_to_height(natural, height);
    scale_rgba(source, Size::new(size.width.max(min_width), size.height))
}
