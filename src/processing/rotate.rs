use image::{Rgba, RgbaImage, imageops};

/// Rotates `image` clockwise by `degrees`. Quarter turns are exact pixel
/// permutations; other angles are resampled bilinearly into the enclosing
/// bounding box, with transparent corners.
pub fn rotate(image: &RgbaImage, degrees: i32) -> RgbaImage {
    match degrees.rem_euclid(360) {
        0 => image.clone(),
        90 => imageops::rotate90(image),
        180 => imageops::rotate180(image),
        270 => imageops::rotate270(image),
        other => rotate_free(image, other as f64),
    }
}

pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let w = f64::from(width);
    let h = f64::from(height);
    // shave float noise so e.g. 90.0000001 does not add a pixel column
    let bw = (w * cos.abs() + h * sin.abs() - 1e-6).ceil().max(1.0);
    let bh = (w * sin.abs() + h * cos.abs() - 1e-6).ceil().max(1.0);
    (bw as u32, bh as u32)
}

fn rotate_free(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = rotated_bounds(src_w, src_h, degrees);
    let mut out = RgbaImage::new(dst_w, dst_h);
    if src_w == 0 || src_h == 0 {
        return out;
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let src_cx = f64::from(src_w) / 2.0;
    let src_cy = f64::from(src_h) / 2.0;
    let dst_cx = f64::from(dst_w) / 2.0;
    let dst_cy = f64::from(dst_h) / 2.0;

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - dst_cx;
        let dy = f64::from(y) + 0.5 - dst_cy;
        // inverse of the clockwise rotation (y axis points down)
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        if let Some(sample) = sample_bilinear(image, sx, sy) {
            *pixel = sample;
        }
    }
    out
}

fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (w, h) = image.dimensions();
    if x < -0.5 || y < -0.5 || x > f64::from(w) - 0.5 || y > f64::from(h) - 0.5 {
        return None;
    }
    let max_x = i64::from(w) - 1;
    let max_y = i64::from(h) - 1;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;
    let fetch = |px: i64, py: i64| {
        let px = px.clamp(0, max_x) as u32;
        let py = py.clamp(0, max_y) as u32;
        image.get_pixel(px, py).0
    };
    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1, y0);
    let bl = fetch(x0, y0 + 1);
    let br = fetch(x0 + 1, y0 + 1);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(tl[c]) * (1.0 - fx) + f64::from(tr[c]) * fx;
        let bottom = f64::from(bl[c]) * (1.0 - fx) + f64::from(br[c]) * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}
