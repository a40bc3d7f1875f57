/// Pixel dimensions of an image, window or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square surfaces count as landscape.
    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }

    pub fn is_left(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::BottomLeft)
    }
}

/// The window axis an image is stretched along in crop-to-fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StretchAxis {
    Width,
    Height,
}

// round(value * num / den) without going through floats
fn scale_dim(value: u32, num: u32, den: u32) -> u32 {
    let den = u64::from(den.max(1));
    let scaled = (u64::from(value) * u64::from(num) + den / 2) / den;
    scaled.clamp(1, u64::from(u32::MAX)) as u32
}

/// `image` scaled so its width equals `width`, keeping the aspect ratio.
pub fn scaled_to_width(image: Size, width: u32) -> Size {
    Size::new(width, scale_dim(image.height, width, image.width))
}

/// `image` scaled so its height equals `height`, keeping the aspect ratio.
pub fn scaled_to_height(image: Size, height: u32) -> Size {
    Size::new(scale_dim(image.width, height, image.height), height)
}

/// Uniform scale-to-fit: the result fits inside `window` and one axis
/// matches it exactly.
pub fn fit_within(image: Size, window: Size) -> Size {
    if image.is_empty() || window.is_empty() {
        return Size::default();
    }
    let image_is_wider =
        u64::from(image.width) * u64::from(window.height) >= u64::from(window.width) * u64::from(image.height);
    if image_is_wider {
        let scaled = scaled_to_width(image, window.width);
        Size::new(scaled.width, scaled.height.min(window.height))
    } else {
        let scaled = scaled_to_height(image, window.height);
        Size::new(scaled.width.min(window.width), scaled.height)
    }
}

/// Picks the axis that, once stretched to the window, leaves no gap on the
/// other axis. Portrait-shaped images try height first, others width.
pub fn choose_stretch_axis(image: Size, window: Size) -> StretchAxis {
    let preferred = if image.height > image.width {
        StretchAxis::Height
    } else {
        StretchAxis::Width
    };
    if stretch_leaves_gap(preferred, image, window) {
        match preferred {
            StretchAxis::Height => StretchAxis::Width,
            StretchAxis::Width => StretchAxis::Height,
        }
    } else {
        preferred
    }
}

fn stretch_leaves_gap(axis: StretchAxis, image: Size, window: Size) -> bool {
    let iw = u64::from(image.width);
    let ih = u64::from(image.height);
    let ww = u64::from(window.width);
    let wh = u64::from(window.height);
    match axis {
        // width after scaling to window height is iw * wh / ih
        StretchAxis::Height => iw * wh < ww * ih,
        StretchAxis::Width => ih * ww < wh * iw,
    }
}

/// Size of `image` once stretched along `axis` to cover `window`. The
/// cross axis never drops below the window.
pub fn stretched_size(image: Size, window: Size, axis: StretchAxis) -> Size {
    match axis {
        StretchAxis::Width => {
            let scaled = scaled_to_width(image, window.width);
            Size::new(scaled.width, scaled.height.max(window.height))
        }
        StretchAxis::Height => {
            let scaled = scaled_to_height(image, window.height);
            Size::new(scaled.width.max(window.width), scaled.height)
        }
    }
}

pub fn center_offset(inner: Size, outer: Size) -> (u32, u32) {
    let ox = outer.width.saturating_sub(inner.width) / 2;
    let oy = outer.height.saturating_sub(inner.height) / 2;
    (ox, oy)
}

/// Origin of a `target`-sized crop centered in `source`.
pub fn center_crop_origin(source: Size, target: Size) -> (u32, u32) {
    center_offset(target, source)
}
