use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::processing::layout::{Size, center_offset};

/// An in-flight crossfade. `to` is the base layer; `from` is drawn over it
/// with opacity falling linearly from 1 to 0.
#[derive(Debug, Clone)]
pub struct TransitionState {
    pub from: Arc<RgbaImage>,
    pub to: Arc<RgbaImage>,
    pub started_at: Instant,
    pub duration: Duration,
}

impl TransitionState {
    /// Returns `None` when the handoff should be instant: no previous frame
    /// or a zero duration.
    pub fn begin(
        previous: Option<Arc<RgbaImage>>,
        next: Arc<RgbaImage>,
        duration: Duration,
        now: Instant,
    ) -> Option<Self> {
        let from = previous?;
        if duration.is_zero() {
            return None;
        }
        Some(Self {
            from,
            to: next,
            started_at: now,
            duration,
        })
    }

    /// Elapsed fraction in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn sample(&self, now: Instant) -> RgbaImage {
        let t = self.progress(now);
        let mut frame = (*self.to).clone();
        if t < 1.0 {
            fade_over(&mut frame, &self.from, 1.0 - t);
        }
        frame
    }
}

fn fade_over(base: &mut RgbaImage, top: &RgbaImage, opacity: f32) {
    let (ox, oy) = center_offset(
        Size::new(top.width(), top.height()),
        Size::new(base.width(), base.height()),
    );
    let (sx, sy) = center_offset(
        Size::new(base.width(), base.height()),
        Size::new(top.width(), top.height()),
    );
    let w = top.width().min(base.width());
    let h = top.height().min(base.height());
    for y in 0..h {
        for x in 0..w {
            let src = top.get_pixel(sx + x, sy + y);
            let alpha = opacity * f32::from(src.0[3]) / 255.0;
            let dst = base.get_pixel_mut(ox + x, oy + y);
            for c in 0..3 {
                let mixed = f32::from(src.0[c]) * alpha + f32::from(dst.0[c]) * (1.0 - alpha);
                dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn flat(value: u8) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(4, 4, Rgba([value, value, value, 255])))
    }

    #[test]
    fn zero_duration_is_instant() {
        let now = Instant::now();
        assert!(TransitionState::begin(Some(flat(0)), flat(200), Duration::ZERO, now).is_none());
    }

    #[test]
    fn first_frame_is_instant() {
        let now = Instant::now();
        assert!(TransitionState::begin(None, flat(200), Duration::from_secs(1), now).is_none());
    }

    #[test]
    fn fades_linearly() {
        let start = Instant::now();
        let fade =
            TransitionState::begin(Some(flat(0)), flat(200), Duration::from_millis(100), start)
                .unwrap();
        assert_eq!(fade.sample(start).get_pixel(1, 1).0, [0, 0, 0, 255]);
        let mid = fade.sample(start + Duration::from_millis(50));
        assert_eq!(mid.get_pixel(1, 1).0, [100, 100, 100, 255]);
        assert!(!fade.is_complete(start + Duration::from_millis(99)));
        assert!(fade.is_complete(start + Duration::from_millis(100)));
        assert_eq!(
            fade.sample(start + Duration::from_millis(150)).get_pixel(1, 1).0,
            [200, 200, 200, 255]
        );
    }

    #[test]
    fn mismatched_sizes_are_centered() {
        let start = Instant::now();
        let small = Arc::new(RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255])));
        let fade =
            TransitionState::begin(Some(small), flat(0), Duration::from_secs(1), start).unwrap();
        let frame = fade.sample(start);
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(frame.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }
}
