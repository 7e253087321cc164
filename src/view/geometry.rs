//! Small geometry value types used by the transform engine.
//!
//! Conventions:
//! - Panel and buffer pixel space: origin top-left, +Y down.
//! - `CropBox`: normalized [0,1] coordinates relative to the source image.

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pixel position inside a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pixel-space rectangle as (left, top, right, bottom), right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rectangle spanned by two drag corners, in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }
}

/// Normalized crop rectangle. Always left <= right and top <= bottom, all in [0,1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Default for CropBox {
    fn default() -> Self {
        Self::FULL
    }
}

impl CropBox {
    pub const FULL: CropBox = CropBox {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    /// Build a crop box, clamping into [0,1] and ordering the edges.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        let (l, r) = (clamp(left), clamp(right));
        let (t, b) = (clamp(top), clamp(bottom));
        Self {
            left: l.min(r),
            top: t.min(b),
            right: l.max(r),
            bottom: t.max(b),
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    /// Map `inner` (normalized relative to this box) into this box's frame:
    /// `origin + inner * size` per edge.
    pub fn compose(&self, inner: &CropBox) -> CropBox {
        let (w, h) = (self.width(), self.height());
        CropBox::new(
            self.left + inner.left * w,
            self.top + inner.top * h,
            self.left + inner.right * w,
            self.top + inner.bottom * h,
        )
    }

    /// Source-pixel rectangle for an image of `size`, truncating toward zero.
    pub fn to_pixels(&self, size: Size) -> PixelRect {
        let (w, h) = (size.width as f64, size.height as f64);
        PixelRect::new(
            (self.left * w) as i32,
            (self.top * h) as i32,
            (self.right * w) as i32,
            (self.bottom * h) as i32,
        )
    }
}
