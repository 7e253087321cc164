//! Pure zoom/crop/pan math.
//!
//! Nothing here holds state: `CanvasState` feeds current values in and stores
//! what comes out. All inputs are clamped or rejected, never reported as errors.

use crate::view::geometry::{CropBox, PixelRect, Point, Size};
use crate::view::panel::FitMode;

pub const RATIO_MIN: f64 = 0.01;
pub const RATIO_MAX: f64 = 16.0;

/// Smallest crop edge, as a fraction of the source.
pub const MIN_CROP_EXTENT: f64 = 0.01;

/// Zoomed buffer edges are multiples of this...
pub const EDGE_ALIGN: u32 = 4;
/// ...and never smaller than this.
pub const MIN_EDGE: u32 = 10;

/// Fit-mode scale ratio for `source` cropped to `crop`, clamped to
/// [RATIO_MIN, RATIO_MAX]. Degenerate input (zero-size source, empty crop,
/// zero-size panel) falls back to 1.0.
pub fn scale_ratio(fit: FitMode, panel: Size, source: Size, crop: &CropBox) -> f64 {
    let eff_w = source.width as f64 * crop.width();
    let eff_h = source.height as f64 * crop.height();
    if eff_w <= 0.0 || eff_h <= 0.0 {
        return 1.0;
    }
    let (pw, ph) = (panel.width as f64, panel.height as f64);

    let ratio = match fit {
        FitMode::FitAll => {
            // Wider than the panel: width is the limiting axis
            if eff_w / eff_h >= pw / ph {
                pw / eff_w
            } else {
                ph / eff_h
            }
        }
        FitMode::FitHeight => ph / eff_h,
        FitMode::FitWidth => pw / eff_w,
    };

    if ratio.is_finite() {
        ratio.clamp(RATIO_MIN, RATIO_MAX)
    } else {
        1.0
    }
}

/// Size of the scaled buffer for a `cropped` region at `ratio * zoom`.
pub fn zoomed_size(ratio: f64, zoom: f64, cropped: Size) -> Size {
    let edge = |len: u32| {
        let scaled = ratio * zoom * len as f64;
        let px = if scaled.is_finite() && scaled > 0.0 {
            scaled.floor().min(u32::MAX as f64) as u32
        } else {
            0
        };
        (px / EDGE_ALIGN * EDGE_ALIGN).max(MIN_EDGE)
    };
    Size::new(edge(cropped.width), edge(cropped.height))
}

/// Top-left that centers `buffer` in `panel` (negative when larger).
pub fn centered_offset(panel: Size, buffer: Size) -> Point {
    Point::new(
        (panel.width as i32 - buffer.width as i32).div_euclid(2),
        (panel.height as i32 - buffer.height as i32).div_euclid(2),
    )
}

/// Top-left that keeps the image point under `origin` fixed when the effective
/// scale changes by `factor` (new / old).
///
/// `left_top` is the previous computed top-left and `pan` the user drag offset;
/// the image is drawn at `left_top + pan`.
pub fn anchored_offset(origin: Point, pan: Point, left_top: Point, factor: f64) -> Point {
    let axis = |o: i32, p: i32, l: i32| {
        let (of, pf) = (o as f64, p as f64);
        let v = of - (of - pf - l as f64) * factor - pf;
        if v.is_finite() { v.round() as i32 } else { l }
    };
    Point::new(
        axis(origin.x, pan.x, left_top.x),
        axis(origin.y, pan.y, left_top.y),
    )
}

/// Constrain `pan` so the buffer drawn at `left_top + pan` stays inside
/// `[panel - max(panel, buffer), panel - min(panel, buffer)]` on each axis.
///
/// A buffer smaller than the panel can move anywhere it stays fully visible;
/// a larger one must keep covering the panel.
pub fn clamp_pan(panel: Size, buffer: Size, left_top: Point, pan: Point) -> Point {
    let axis = |panel: u32, buffer: u32, left: i32, pan: i32| {
        let (panel, buffer) = (panel as i32, buffer as i32);
        let lo = panel - panel.max(buffer);
        let hi = panel - panel.min(buffer);
        let real = left.saturating_add(pan);
        if real < lo {
            lo.saturating_sub(left)
        } else if real > hi {
            hi.saturating_sub(left)
        } else {
            pan
        }
    };
    Point::new(
        axis(panel.width, buffer.width, left_top.x, pan.x),
        axis(panel.height, buffer.height, left_top.y, pan.y),
    )
}

/// Normalize a panel-space selection against the displayed buffer.
///
/// `draw` is where the buffer's top-left sits in the panel. The result is
/// clamped to [0,1]; `None` if either edge is thinner than MIN_CROP_EXTENT.
pub fn selection_box(selection: PixelRect, draw: Point, buffer: Size) -> Option<CropBox> {
    if buffer.width == 0 || buffer.height == 0 {
        return None;
    }
    let local = selection.translate(draw.x.saturating_neg(), draw.y.saturating_neg());
    let (w, h) = (buffer.width as f64, buffer.height as f64);
    let candidate = CropBox::new(
        local.left as f64 / w,
        local.top as f64 / h,
        local.right as f64 / w,
        local.bottom as f64 / h,
    );
    if candidate.width() < MIN_CROP_EXTENT || candidate.height() < MIN_CROP_EXTENT {
        return None;
    }
    Some(candidate)
}

/// Compose a selection into `crop`. `None` means the selection is rejected and
/// the crop stays as it is.
pub fn reconcile_selection(
    crop: &CropBox,
    selection: PixelRect,
    draw: Point,
    buffer: Size,
) -> Option<CropBox> {
    let candidate = selection_box(selection, draw, buffer)?;
    let composed = crop.compose(&candidate);
    if composed.width() < MIN_CROP_EXTENT || composed.height() < MIN_CROP_EXTENT {
        return None;
    }
    Some(composed)
}

/// Source-pixel rectangle for `crop`, at least one pixel on each axis and
/// inside `source`. `None` for an empty source.
pub fn crop_rect(crop: &CropBox, source: Size) -> Option<PixelRect> {
    if source.width == 0 || source.height == 0 {
        return None;
    }
    let (w, h) = (source.width as i32, source.height as i32);
    let raw = crop.to_pixels(source);
    let left = raw.left.clamp(0, w - 1);
    let top = raw.top.clamp(0, h - 1);
    let right = raw.right.clamp(left + 1, w);
    let bottom = raw.bottom.clamp(top + 1, h);
    Some(PixelRect::new(left, top, right, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: CropBox = CropBox::FULL;

    #[test]
    fn test_fit_all_wide_source() {
        // 800/1600 = 0.5 vs 600/400 = 1.5, width limits
        let ratio = scale_ratio(FitMode::FitAll, Size::new(800, 600), Size::new(1600, 400), &FULL);
        assert_eq!(ratio, 0.5);
        assert_eq!(zoomed_size(ratio, 1.0, Size::new(1600, 400)), Size::new(800, 200));
    }

    #[test]
    fn test_fit_all_tall_source() {
        let ratio = scale_ratio(FitMode::FitAll, Size::new(800, 600), Size::new(300, 1200), &FULL);
        assert_eq!(ratio, 0.5);
    }

    #[test]
    fn test_fit_height_and_width() {
        let panel = Size::new(400, 300);
        let source = Size::new(1600, 1200);
        assert_eq!(scale_ratio(FitMode::FitHeight, panel, source, &FULL), 0.25);
        assert_eq!(scale_ratio(FitMode::FitWidth, panel, source, &FULL), 0.25);

        // Cropping to the left half doubles the width ratio
        let half = CropBox::new(0.0, 0.0, 0.5, 1.0);
        assert_eq!(scale_ratio(FitMode::FitWidth, panel, source, &half), 0.5);
        assert_eq!(scale_ratio(FitMode::FitHeight, panel, source, &half), 0.25);
    }

    #[test]
    fn test_ratio_clamped() {
        let panel = Size::new(800, 600);
        assert_eq!(scale_ratio(FitMode::FitAll, panel, Size::new(10, 10), &FULL), RATIO_MAX);
        assert_eq!(scale_ratio(FitMode::FitAll, panel, Size::new(200_000, 100_000), &FULL), RATIO_MIN);
        assert_eq!(scale_ratio(FitMode::FitHeight, Size::new(0, 0), Size::new(100, 100), &FULL), RATIO_MIN);
    }

    #[test]
    fn test_degenerate_source_ratio_is_one() {
        let panel = Size::new(800, 600);
        for fit in [FitMode::FitAll, FitMode::FitHeight, FitMode::FitWidth] {
            assert_eq!(scale_ratio(fit, panel, Size::new(100, 0), &FULL), 1.0);
            assert_eq!(scale_ratio(fit, panel, Size::new(0, 0), &FULL), 1.0);
        }
        let flat = CropBox::new(0.25, 0.5, 0.75, 0.5);
        assert_eq!(scale_ratio(FitMode::FitAll, panel, Size::new(100, 100), &flat), 1.0);
    }

    #[test]
    fn test_zoomed_size_alignment_and_floor() {
        assert_eq!(zoomed_size(1.0, 1.0, Size::new(103, 98)), Size::new(100, 96));
        assert_eq!(zoomed_size(0.1, 1.0, Size::new(500, 20)), Size::new(48, 10));
        assert_eq!(zoomed_size(1.0, 0.5, Size::new(0, 7)), Size::new(10, 10));
        assert_eq!(zoomed_size(0.5, 2.0, Size::new(64, 64)), Size::new(64, 64));
    }

    #[test]
    fn test_centered_offset_floors() {
        assert_eq!(centered_offset(Size::new(800, 600), Size::new(800, 200)), Point::new(0, 200));
        assert_eq!(centered_offset(Size::new(100, 100), Size::new(111, 90)), Point::new(-6, 5));
    }

    #[test]
    fn test_anchored_offset_keeps_point_fixed() {
        // Image drawn at (100, 50); cursor at (300, 250) is image point (200, 200)
        let left_top = Point::new(90, 50);
        let pan = Point::new(10, 0);
        let origin = Point::new(300, 250);
        let new_lt = anchored_offset(origin, pan, left_top, 2.0);
        // Image point (200, 200) becomes (400, 400) and must stay under the cursor
        assert_eq!(new_lt.x + pan.x + 400, origin.x);
        assert_eq!(new_lt.y + pan.y + 400, origin.y);

        assert_eq!(anchored_offset(origin, pan, left_top, 1.0), left_top);
    }

    #[test]
    fn test_clamp_pan_small_buffer_stays_visible() {
        let panel = Size::new(400, 300);
        let buffer = Size::new(200, 100);
        let left_top = centered_offset(panel, buffer); // (100, 100)
        // Limits on x: [0, 200]
        assert_eq!(clamp_pan(panel, buffer, left_top, Point::new(50, 0)), Point::new(50, 0));
        assert_eq!(clamp_pan(panel, buffer, left_top, Point::new(500, 0)), Point::new(100, 0));
        assert_eq!(clamp_pan(panel, buffer, left_top, Point::new(-500, -500)), Point::new(-100, -100));
    }

    #[test]
    fn test_clamp_pan_large_buffer_covers_panel() {
        let panel = Size::new(400, 300);
        let buffer = Size::new(800, 300);
        let left_top = centered_offset(panel, buffer); // (-200, 0)
        // Limits on x: [-400, 0]
        assert_eq!(clamp_pan(panel, buffer, left_top, Point::new(300, 0)), Point::new(200, 0));
        assert_eq!(clamp_pan(panel, buffer, left_top, Point::new(-300, 0)), Point::new(-200, 0));
        // Equal height: no vertical slack
        assert_eq!(clamp_pan(panel, buffer, left_top, Point::new(0, 40)), Point::new(0, 0));
    }

    #[test]
    fn test_extreme_input_saturates() {
        let panel = Size::new(400, 300);
        let buffer = Size::new(200, 100);
        let left_top = Point::new(100, 100);
        assert_eq!(
            clamp_pan(panel, buffer, left_top, Point::new(i32::MAX, i32::MIN)),
            Point::new(100, -100)
        );

        let anchored = anchored_offset(Point::new(i32::MAX, i32::MIN), Point::default(), Point::default(), 1.1);
        assert_eq!(anchored, Point::new(-214_748_365, 214_748_365));

        let sel = selection_box(PixelRect::new(0, 0, i32::MAX, i32::MAX), Point::new(-2, -3), Size::new(100, 100)).unwrap();
        assert_eq!((sel.right, sel.bottom), (1.0, 1.0));
        assert!((sel.left - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_full_selection_keeps_crop() {
        let crop = CropBox::new(0.25, 0.125, 0.75, 0.875);
        let draw = Point::new(100, 50);
        let buffer = Size::new(400, 200);
        let sel = PixelRect::new(100, 50, 500, 250);
        assert_eq!(reconcile_selection(&crop, sel, draw, buffer), Some(crop));

        // Larger than the buffer clamps to full as well
        let sel = PixelRect::new(0, 0, 800, 600);
        assert_eq!(reconcile_selection(&crop, sel, draw, buffer), Some(crop));
    }

    #[test]
    fn test_selection_composes_into_crop() {
        let crop = CropBox::new(0.5, 0.0, 1.0, 1.0);
        let draw = Point::new(0, 0);
        let buffer = Size::new(400, 400);
        // Bottom-right quarter of what is shown
        let sel = PixelRect::new(200, 200, 400, 400);
        assert_eq!(
            reconcile_selection(&crop, sel, draw, buffer),
            Some(CropBox::new(0.75, 0.5, 1.0, 1.0))
        );
    }

    #[test]
    fn test_tiny_or_outside_selection_rejected() {
        let buffer = Size::new(1000, 1000);
        let draw = Point::new(0, 0);
        // 5px of 1000 is below the minimum extent
        assert_eq!(reconcile_selection(&FULL, PixelRect::new(0, 0, 5, 500), draw, buffer), None);
        // Entirely left of the buffer clamps to zero width
        assert_eq!(
            reconcile_selection(&FULL, PixelRect::new(-50, 0, -10, 500), draw, buffer),
            None
        );
        // Nested crop already small: composed edge below the minimum
        let small = CropBox::new(0.0, 0.0, 0.02, 0.02);
        assert_eq!(reconcile_selection(&small, PixelRect::new(0, 0, 400, 400), draw, buffer), None);
        assert_eq!(selection_box(PixelRect::new(0, 0, 10, 10), draw, Size::new(0, 0)), None);
    }

    #[test]
    fn test_crop_rect_bounds() {
        let src = Size::new(100, 50);
        assert_eq!(crop_rect(&FULL, src), Some(PixelRect::new(0, 0, 100, 50)));
        let thin = CropBox::new(0.999, 0.0, 1.0, 1.0);
        assert_eq!(crop_rect(&thin, src), Some(PixelRect::new(99, 0, 100, 50)));
        assert_eq!(crop_rect(&FULL, Size::new(0, 10)), None);
    }
}
