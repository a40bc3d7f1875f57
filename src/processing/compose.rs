use image::{Rgba, RgbaImage, imageops};

use crate::config::ImageDisplayOptions;
use crate::processing::blur::apply_blur;
use crate::processing::layout::{Size, center_crop_origin, center_offset};
use crate::processing::resize::{scale_to_height, scale_to_width};
use crate::processing::resolve::Resolved;

/// Builds the full-window frame: a blurred cover-scaled background, darkened
/// by `255 - opacity`, with the foreground centered on top.
pub fn composite(
    resolved: &Resolved,
    window: Size,
    options: &ImageDisplayOptions,
    blur_radius: u32,
    opacity: u8,
) -> RgbaImage {
    if window.is_empty() {
        return RgbaImage::new(0, 0);
    }
    let mut frame = if options.fit_aspect_axis_to_window {
        center_crop(&resolved.foreground, window)
    } else {
        blurred_background(resolved, window, blur_radius)
    };
    darken(&mut frame, opacity);

    let fg = &resolved.foreground;
    let (ox, oy) = center_offset(Size::new(fg.width(), fg.height()), window);
    imageops::overlay(&mut frame, fg, i64::from(ox), i64::from(oy));
    frame
}

fn blurred_background(resolved: &Resolved, window: Size, blur_radius: u32) -> RgbaImage {
    let rotated = &resolved.rotated;
    if rotated.width() == 0 || rotated.height() == 0 {
        return RgbaImage::from_pixel(window.width, window.height, Rgba([0, 0, 0, 255]));
    }
    let cover = if resolved.foreground.width() < window.width {
        scale_to_width(rotated, window.width, window.height)
    } else {
        scale_to_height(rotated, window.height, window.width)
    };
    // reach is capped at the window's longer side
    let radius = blur_radius.min(window.width.max(window.height));
    // blur a slightly larger region so the window edges are not darkened by
    // the clamped border
    let margin = radius.saturating_mul(2);
    let padded = Size::new(
        window.width.saturating_add(margin).min(cover.width()),
        window.height.saturating_add(margin).min(cover.height()),
    );
    let region = center_crop(&cover, padded);
    let blurred = apply_blur(&region, radius);
    center_crop(&blurred, window)
}

/// A `target`-sized crop from the middle of `source`. If `source` is smaller
/// on an axis, the remainder is black.
pub fn center_crop(source: &RgbaImage, target: Size) -> RgbaImage {
    let src = Size::new(source.width(), source.height());
    if src == target {
        return source.clone();
    }
    let (x, y) = center_crop_origin(src, target);
    let w = target.width.min(src.width);
    let h = target.height.min(src.height);
    let cropped = imageops::crop_imm(source, x, y, w, h).to_image();
    if w == target.width && h == target.height {
        return cropped;
    }
    let mut canvas = RgbaImage::from_pixel(target.width, target.height, Rgba([0, 0, 0, 255]));
    let (ox, oy) = center_offset(Size::new(w, h), target);
    imageops::overlay(&mut canvas, &cropped, i64::from(ox), i64::from(oy));
    canvas
}

/// Paints black at alpha `255 - opacity` over an opaque copy of `frame`.
pub fn darken(frame: &mut RgbaImage, opacity: u8) {
    let keep = u32::from(opacity);
    for pixel in frame.pixels_mut() {
        for c in 0..3 {
            pixel.0[c] = ((u32::from(pixel.0[c]) * keep + 127) / 255) as u8;
        }
        pixel.0[3] = 255;
    }
}
