/// A touch position normalized to the window, `(0, 0)` top-left and
/// `(1, 1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

const LOW: f32 = 0.1;
const HIGH: f32 = 0.9;

/// True when each of the four corner zones holds at least one of `points`.
/// Zone bounds are exclusive.
pub fn is_quit_combination(points: &[TouchPoint]) -> bool {
    let mut top_left = false;
    let mut top_right = false;
    let mut bottom_left = false;
    let mut bottom_right = false;
    for p in points {
        let left = p.x < LOW;
        let right = p.x > HIGH;
        let top = p.y < LOW;
        let bottom = p.y > HIGH;
        top_left |= top && left;
        top_right |= top && right;
        bottom_left |= bottom && left;
        bottom_right |= bottom && right;
    }
    top_left && top_right && bottom_left && bottom_right
}
