use std::fs;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use fontdb::{Database, Family, Query, Source, Weight};
use image::RgbaImage;

use crate::config::OverlayColor;

/// Loads a bold sans-serif system font, falling back to any face the system
/// has.
pub fn load_font() -> Result<FontArc> {
    let mut db = Database::new();
    db.load_system_fonts();

    let preferred_families = [
        Family::Name("DejaVu Sans"),
        Family::Name("Noto Sans"),
        Family::Name("Liberation Sans"),
        Family::SansSerif,
    ];

    for weight in [Weight::BOLD, Weight::NORMAL] {
        for family in preferred_families {
            if let Some(id) = db.query(&Query {
                families: &[family],
                weight,
                ..Default::default()
            }) && let Some(font) = load_face(&db, id)?
            {
                return Ok(font);
            }
        }
    }

    for face in db.faces() {
        if let Some(font) = load_face(&db, face.id)? {
            return Ok(font);
        }
    }

    Err(anyhow!("no usable system font found"))
}

fn load_face(db: &Database, id: fontdb::ID) -> Result<Option<FontArc>> {
    let face = db.face(id).context("missing font face in database")?;
    let bytes = match &face.source {
        Source::Binary(data) => data.as_ref().as_ref().to_vec(),
        Source::File(path) => {
            fs::read(path).with_context(|| format!("failed to read font at {}", path.display()))?
        }
        Source::SharedFile(_, data) => data.as_ref().as_ref().to_vec(),
    };
    // collections hold several faces; only the first is decoded here
    Ok(FontArc::try_from_vec(bytes).ok())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    pub fn line_height(&self) -> f32 {
        self.ascent + self.descent + self.line_gap
    }
}

pub fn line_metrics(font: &FontArc, scale: PxScale) -> LineMetrics {
    let scaled = font.as_scaled(scale);
    LineMetrics {
        ascent: scaled.ascent(),
        descent: scaled.descent().abs(),
        line_gap: scaled.line_gap(),
    }
}

pub fn measure_text(text: &str, font: &FontArc, scale: PxScale) -> f32 {
    let scaled_font = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let glyph_id = scaled_font.glyph_id(ch);
        if let Some(prev) = previous {
            width += scaled_font.kern(prev, glyph_id);
        }
        width += scaled_font.h_advance(glyph_id);
        previous = Some(glyph_id);
    }
    width.max(0.0)
}

/// Draws one line of `text` with its baseline at `baseline`, alpha-blending
/// glyph coverage over `frame`.
pub fn draw_text(
    frame: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    color: OverlayColor,
    left: f32,
    baseline: f32,
    scale: PxScale,
) {
    let scaled = font.as_scaled(scale);
    let mut cursor_x = left;
    let mut previous = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let glyph = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            cursor_x += scaled.kern(prev, glyph);
        }
        let advance = scaled.h_advance(glyph);
        let mut positioned = scaled.scaled_glyph(ch);
        positioned.position = point(cursor_x, baseline);
        if let Some(outline) = font.outline_glyph(positioned) {
            let bounds = outline.px_bounds();
            outline.draw(|x, y, coverage| {
                blend_pixel(
                    frame,
                    bounds.min.x + x as f32,
                    bounds.min.y + y as f32,
                    color,
                    coverage,
                );
            });
        }
        cursor_x += advance;
        previous = Some(glyph);
    }
}

/// Draws `text` centered on `frame`, one line per `\n`.
pub fn draw_centered_text(
    frame: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    color: OverlayColor,
    scale: PxScale,
) {
    let metrics = line_metrics(font, scale);
    let lines: Vec<&str> = text.lines().collect();
    let block_height = lines.len() as f32 * metrics.line_height() - metrics.line_gap;
    let mut baseline = (frame.height() as f32 - block_height) / 2.0 + metrics.ascent;
    for line in lines {
        let width = measure_text(line, font, scale);
        let left = (frame.width() as f32 - width) / 2.0;
        draw_text(frame, font, line, color, left, baseline, scale);
        baseline += metrics.line_height();
    }
}

fn blend_pixel(frame: &mut RgbaImage, x: f32, y: f32, color: OverlayColor, coverage: f32) {
    if coverage <= 0.0 {
        return;
    }
    let xi = x.floor() as i64;
    let yi = y.floor() as i64;
    if xi < 0 || yi < 0 || xi >= i64::from(frame.width()) || yi >= i64::from(frame.height()) {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    let pixel = frame.get_pixel_mut(xi as u32, yi as u32);
    for (dst, src) in pixel.0.iter_mut().zip(color.0) {
        let blended = f32::from(src) * alpha + f32::from(*dst) * (1.0 - alpha);
        *dst = blended.round().clamp(0.0, 255.0) as u8;
    }
    pixel.0[3] = 255;
}
