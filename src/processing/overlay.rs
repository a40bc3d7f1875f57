use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::RgbaImage;
use tracing::debug;

use crate::config::{OverlayColor, OverlayConfig};
use crate::processing::layout::{Corner, Size};
use crate::processing::text::{LineMetrics, draw_text, line_metrics, measure_text};

/// Text to draw in a corner, with its placement parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CornerText {
    pub text: String,
    /// Inset from both frame edges meeting at the corner, in pixels.
    pub margin: u32,
    /// Font size in points.
    pub font_size: u32,
}

/// Supplies corner captions for the image currently on screen.
pub trait TextOverlay {
    fn corner_text(&self, corner: Corner, path: &Path) -> Option<CornerText>;
}

/// Caption provider driven by the `overlay` section of the config file.
#[derive(Debug, Clone, Default)]
pub struct TemplateOverlay {
    config: OverlayConfig,
}

impl TemplateOverlay {
    pub fn from_config(config: &OverlayConfig) -> Option<Self> {
        if config.is_empty() {
            None
        } else {
            Some(Self {
                config: config.clone(),
            })
        }
    }
}

impl TextOverlay for TemplateOverlay {
    fn corner_text(&self, corner: Corner, path: &Path) -> Option<CornerText> {
        let template = self.config.corner(corner)?;
        Some(CornerText {
            text: expand_template(&template.template, path),
            margin: template.margin,
            font_size: template.font_size,
        })
    }
}

/// Substitutes `{path}`, `{file}` and `{dir}` (the parent directory's name).
pub fn expand_template(template: &str, path: &Path) -> String {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    template
        .replace("{path}", &path.to_string_lossy())
        .replace("{file}", &file)
        .replace("{dir}", &dir)
}

pub fn points_to_px(points: u32) -> f32 {
    points as f32 * 4.0 / 3.0
}

/// Left edge and baseline of each line of a text block anchored to `corner`.
/// The first line sits at the top edge for top corners; for bottom corners
/// the last line sits at the bottom edge and earlier lines stack upward.
pub fn place_lines(
    corner: Corner,
    frame: Size,
    margin: u32,
    widths: &[f32],
    metrics: LineMetrics,
) -> Vec<(f32, f32)> {
    let margin = margin as f32;
    let right = frame.width as f32 - margin;
    let bottom = frame.height as f32 - margin;
    let line_height = metrics.line_height();
    let count = widths.len();
    widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let left = if corner.is_left() { margin } else { right - width };
            let baseline = if corner.is_top() {
                margin + metrics.ascent + idx as f32 * line_height
            } else {
                let from_bottom = (count - 1 - idx) as f32;
                bottom - metrics.descent - from_bottom * line_height
            };
            (left, baseline)
        })
        .collect()
}

/// Stamps every non-empty corner caption onto `frame`.
pub fn render_overlays(
    frame: &mut RgbaImage,
    font: &FontArc,
    overlay: &dyn TextOverlay,
    path: &Path,
    color: OverlayColor,
) {
    let size = Size::new(frame.width(), frame.height());
    for corner in Corner::ALL {
        let Some(caption) = overlay.corner_text(corner, path) else {
            continue;
        };
        if caption.text.trim().is_empty() {
            continue;
        }
        let scale = PxScale::from(points_to_px(caption.font_size));
        let metrics = line_metrics(font, scale);
        let lines: Vec<&str> = caption.text.lines().collect();
        let widths: Vec<f32> = lines
            .iter()
            .map(|line| measure_text(line, font, scale))
            .collect();
        debug!(?corner, lines = lines.len(), "drawing overlay text");
        for (line, (left, baseline)) in lines
            .iter()
            .zip(place_lines(corner, size, caption.margin, &widths, metrics))
        {
            draw_text(frame, font, line, color, left, baseline, scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CornerTemplate;
    use crate::processing::text::load_font;
    use image::Rgba;
    use std::path::PathBuf;

    /// Returns the same caption for the listed corners.
    struct Fixed(Vec<(Corner, CornerText)>);

    impl TextOverlay for Fixed {
        fn corner_text(&self, corner: Corner, _path: &Path) -> Option<CornerText> {
            self.0
                .iter()
                .find(|(c, _)| *c == corner)
                .map(|(_, text)| text.clone())
        }
    }

    fn caption(text: &str, margin: u32) -> CornerText {
        CornerText {
            text: text.into(),
            margin,
            font_size: 12,
        }
    }

    const METRICS: LineMetrics = LineMetrics {
        ascent: 10.0,
        descent: 4.0,
        line_gap: 2.0,
    };

    #[test]
    fn template_placeholders() {
        let path = PathBuf::from("/photos/2023/beach.jpg");
        assert_eq!(
            expand_template("{dir}: {file} ({path})", &path),
            "2023: beach.jpg (/photos/2023/beach.jpg)"
        );
        assert_eq!(expand_template("static", &path), "static");
    }

    #[test]
    fn overlay_reports_only_configured_corners() {
        let config = OverlayConfig {
            bottom_right: Some(CornerTemplate {
                template: "{file}".into(),
                margin: 12,
                font_size: 24,
            }),
            ..OverlayConfig::default()
        };
        let overlay = TemplateOverlay::from_config(&config).unwrap();
        let path = PathBuf::from("/a/b.png");
        assert_eq!(overlay.corner_text(Corner::TopLeft, &path), None);
        assert_eq!(
            overlay.corner_text(Corner::BottomRight, &path),
            Some(CornerText {
                text: "b.png".into(),
                margin: 12,
                font_size: 24,
            })
        );
    }

    #[test]
    fn empty_config_has_no_overlay() {
        assert!(TemplateOverlay::from_config(&OverlayConfig::default()).is_none());
    }

    #[test]
    fn top_left_lines_stack_down() {
        let placed = place_lines(Corner::TopLeft, Size::new(200, 100), 5, &[30.0, 40.0], METRICS);
        assert_eq!(placed, vec![(5.0, 15.0), (5.0, 31.0)]);
    }

    #[test]
    fn bottom_right_lines_stack_up() {
        let placed = place_lines(
            Corner::BottomRight,
            Size::new(200, 100),
            5,
            &[30.0, 40.0],
            METRICS,
        );
        assert_eq!(placed, vec![(165.0, 75.0), (155.0, 91.0)]);
    }

    #[test]
    fn points_convert_to_pixels() {
        assert!((points_to_px(18) - 24.0).abs() < f32::EPSILON);
    }

    #[test]
    fn blank_captions_leave_frame_untouched() {
        let Ok(font) = load_font() else {
            eprintln!("no system font available; skipping");
            return;
        };
        let original = RgbaImage::from_pixel(80, 60, Rgba([30, 60, 90, 255]));
        let overlay = Fixed(vec![
            (Corner::TopLeft, caption("", 5)),
            (Corner::TopRight, caption("   ", 5)),
            (Corner::BottomLeft, caption("\n", 5)),
        ]);
        let mut frame = original.clone();
        render_overlays(&mut frame, &font, &overlay, Path::new("/a/b.png"), OverlayColor::WHITE);
        assert_eq!(frame, original);

        render_overlays(&mut frame, &font, &Fixed(Vec::new()), Path::new("/a/b.png"), OverlayColor::WHITE);
        assert_eq!(frame, original);
    }

    #[test]
    fn bottom_right_text_stays_inside_margin_rect() {
        let Ok(font) = load_font() else {
            eprintln!("no system font available; skipping");
            return;
        };
        let (w, h, margin) = (200u32, 100u32, 10u32);
        let original = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
        let mut frame = original.clone();
        let overlay = Fixed(vec![(Corner::BottomRight, caption("Agy", margin))]);
        render_overlays(&mut frame, &font, &overlay, Path::new("/a/b.png"), OverlayColor::WHITE);

        let width = measure_text("Agy", &font, PxScale::from(points_to_px(12)));
        // glyph outlines may overhang their advance slightly
        let slack = 2.0;
        let min_x = w as f32 - margin as f32 - width - slack;
        let max_x = w as f32 - margin as f32 + slack;
        let max_y = h as f32 - margin as f32 + slack;

        let mut changed = 0;
        for (x, y, pixel) in frame.enumerate_pixels() {
            if pixel != original.get_pixel(x, y) {
                changed += 1;
                assert!(
                    (min_x..=max_x).contains(&(x as f32)) && (y as f32) <= max_y,
                    "pixel ({x}, {y}) outside the corner rect"
                );
            }
        }
        assert!(changed > 0, "caption drew nothing");
    }
}
