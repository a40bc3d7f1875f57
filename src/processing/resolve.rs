use image::{RgbaImage, imageops};
use tracing::debug;

use crate::config::ImageDisplayOptions;
use crate::processing::layout::{Size, StretchAxis, choose_stretch_axis, fit_within, stretched_size};
use crate::processing::resize::scale_rgba;
use crate::processing::rotate::rotate;

/// Output of the geometry stage.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The source after rotation, at natural resolution. The background is
    /// derived from it.
    pub rotated: RgbaImage,
    /// The foreground bitmap, already scaled (and in stretch mode cropped)
    /// for the window.
    pub foreground: RgbaImage,
}

/// Rotates `original` and fits it to `window` per `options`.
///
/// Without stretch the foreground is letterboxed: it fits inside the window
/// and one axis matches exactly. With stretch the chosen axis is scaled to the
/// window and the other axis is cropped, keeping the top-left region.
pub fn resolve(
    original: &RgbaImage,
    rotation: i32,
    window: Size,
    options: &ImageDisplayOptions,
) -> Resolved {
    let rotated = rotate(original, rotation);
    let natural = Size::new(rotated.width(), rotated.height());
    if natural.is_empty() || window.is_empty() {
        return Resolved {
            foreground: rotated.clone(),
            rotated,
        };
    }

    let foreground = if options.fit_aspect_axis_to_window {
        let axis = choose_stretch_axis(natural, window);
        let target = stretched_size(natural, window, axis);
        debug!(
            axis = match axis {
                StretchAxis::Width => "width",
                StretchAxis::Height => "height",
            },
            width = target.width,
            height = target.height,
            "stretching foreground"
        );
        let scaled = scale_rgba(&rotated, target);
        // anchored top-left, unlike the centered background crop
        imageops::crop_imm(&scaled, 0, 0, window.width, window.height).to_image()
    } else {
        scale_rgba(&rotated, fit_within(natural, window))
    };

    Resolved { rotated, foreground }
}
