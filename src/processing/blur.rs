use image::{RgbaImage, imageops};

/// Gaussian blur where `radius` is the visible reach in pixels. The
/// underlying sigma is a third of it so the kernel ends near `radius`.
pub fn apply_blur(image: &RgbaImage, radius: u32) -> RgbaImage {
    if radius == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageops::blur(image, sigma_for_radius(radius))
}

fn sigma_for_radius(radius: u32) -> f32 {
    radius as f32 / 3.0
}
