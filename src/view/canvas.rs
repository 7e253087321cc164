//! Per-panel transform state machine.
//!
//! **Why**: Each panel shows the same source through its own crop, fit mode and
//! zoom. Re-scaling a large page is the expensive step, so it only happens when
//! the ratio, crop or zoom multiplier actually changed.
//!
//! **Used by**: Viewer (one `CanvasState` per `PanelState`)
//!
//! # Cycle
//!
//! 1. `calculate()` - consume a pending selection, recompute the fit ratio and
//!    report whether a rebuild is needed (or a crop for the other panels)
//! 2. `zoom()` - crop + resize the source and place the result in the panel
//! 3. `move_image()` - clamp the user's pan against the placed buffer
//!
//! The source is shared with the viewer and never modified here.

use std::sync::Arc;

use log::{debug, trace};

use crate::core::raster::{Flip, Raster};
use crate::error::Result;
use crate::view::geometry::{CropBox, Point, Size};
use crate::view::panel::{PanelId, PanelState};
use crate::view::transform::{
    anchored_offset, centered_offset, clamp_pan, crop_rect, reconcile_selection, scale_ratio,
    zoomed_size,
};

/// What `calculate()` decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomOutcome {
    /// Nothing changed; keep the current buffer.
    Unchanged,
    /// Ratio, crop or zoom changed; call `zoom()`.
    Rerender,
    /// The main panel turned a selection into a crop for every other panel.
    Broadcast(CropBox),
}

#[derive(Debug, Clone)]
pub struct CanvasState {
    source: Option<Arc<Raster>>,
    cropped: Option<Raster>,
    zoomed: Option<Raster>,
    zoomed_size: Size,
    ratio: f64,
    ratio_old: f64,
    zoom: f64,
    zoom_old: f64,
    crop: CropBox,
    crop_old: CropBox,
    left_top: Point,
    stale: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            source: None,
            cropped: None,
            zoomed: None,
            zoomed_size: Size::default(),
            ratio: 1.0,
            ratio_old: 1.0,
            zoom: 1.0,
            zoom_old: 1.0,
            crop: CropBox::FULL,
            crop_old: CropBox::FULL,
            left_top: Point::default(),
            stale: false,
        }
    }
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the canvas at `source`, fold in any pending selection and
    /// recompute the scale ratio.
    ///
    /// A pending selection is always consumed and the pan zeroed, even when the
    /// selection is rejected.
    pub fn calculate(&mut self, source: &Arc<Raster>, panel: &mut PanelState, id: PanelId) -> ZoomOutcome {
        self.source = Some(Arc::clone(source));

        if let Some(selection) = panel.selection.take() {
            let draw = self.draw_offset(panel);
            let composed = reconcile_selection(&self.crop, selection, draw, self.zoomed_size);
            panel.pan = Point::default();
            match composed {
                Some(crop) if id.is_main() => {
                    debug!("{}: selection -> broadcast crop {:?}", panel.name, crop);
                    return ZoomOutcome::Broadcast(crop);
                }
                Some(crop) => {
                    debug!("{}: selection -> crop {:?}", panel.name, crop);
                    self.crop_old = self.crop;
                    self.crop = crop;
                }
                None => debug!("{}: selection rejected", panel.name),
            }
        }

        self.rescale(panel)
    }

    /// Replace the crop with one decided by another panel.
    pub fn apply_crop(&mut self, source: &Arc<Raster>, panel: &mut PanelState, crop: CropBox) -> ZoomOutcome {
        self.source = Some(Arc::clone(source));
        self.crop_old = self.crop;
        self.crop = crop;
        panel.pan = Point::default();
        self.rescale(panel)
    }

    fn rescale(&mut self, panel: &mut PanelState) -> ZoomOutcome {
        let source_size = self.source.as_ref().map(|s| s.size()).unwrap_or_default();
        let ratio = scale_ratio(panel.fit, panel.size, source_size, &self.crop);

        if ratio != self.ratio || self.crop != self.crop_old || panel.zoom != self.zoom {
            trace!("{}: ratio {:.4} -> {:.4}, zoom {:.3} -> {:.3}", panel.name, self.ratio, ratio, self.zoom, panel.zoom);
            self.ratio_old = self.ratio;
            self.ratio = ratio;
            self.zoom_old = self.zoom;
            self.zoom = panel.zoom;
            ZoomOutcome::Rerender
        } else {
            panel.zoom_origin = None;
            ZoomOutcome::Unchanged
        }
    }

    /// Rebuild the scaled buffer if anything changed since the last build (or
    /// always with `force`). Returns whether a rebuild happened.
    ///
    /// Hidden panels get their geometry updated but no pixels; they are marked
    /// stale until a forced rebuild while visible.
    pub fn zoom(&mut self, panel: &mut PanelState, force: bool) -> Result<bool> {
        let changed =
            self.ratio != self.ratio_old || self.crop != self.crop_old || self.zoom != self.zoom_old;
        if !force && !changed {
            return Ok(false);
        }
        let Some(source) = self.source.clone() else {
            return Ok(false);
        };
        let Some(rect) = crop_rect(&self.crop, source.size()) else {
            debug!("{}: empty source, nothing to build", panel.name);
            self.cropped = None;
            self.zoomed = None;
            self.zoomed_size = Size::default();
            return Ok(false);
        };

        let size = zoomed_size(
            self.ratio,
            self.zoom,
            Size::new(rect.width() as u32, rect.height() as u32),
        );
        if panel.visible {
            let cropped = source.crop(rect)?;
            self.zoomed = Some(cropped.resize(size.width, size.height, Flip::Vertical));
            self.cropped = Some(cropped);
            self.stale = false;
        } else {
            self.cropped = None;
            self.zoomed = None;
            self.stale = true;
        }
        self.zoomed_size = size;

        self.left_top = match panel.zoom_origin.take() {
            Some(origin) => {
                let old = self.ratio_old * self.zoom_old;
                let factor = if old > 0.0 { self.ratio * self.zoom / old } else { 1.0 };
                anchored_offset(origin, panel.pan, self.left_top, factor)
            }
            None => centered_offset(panel.size, size),
        };

        debug!(
            "{}: built {}x{} at ({}, {}), ratio {:.4}, zoom {:.3}",
            panel.name, size.width, size.height, self.left_top.x, self.left_top.y, self.ratio, self.zoom
        );

        self.crop_old = self.crop;
        self.ratio_old = self.ratio;
        self.zoom_old = self.zoom;
        Ok(true)
    }

    /// Clamp the panel's pan so the buffer cannot leave the panel.
    pub fn move_image(&self, panel: &mut PanelState) {
        panel.pan = clamp_pan(panel.size, self.zoomed_size, self.left_top, panel.pan);
    }

    /// Back to full extent and unit zoom, optionally against a new source,
    /// then rebuild.
    pub fn reset(&mut self, panel: &mut PanelState, source: Option<Arc<Raster>>) -> Result<()> {
        let source = source.or_else(|| self.source.take());
        *self = Self {
            source,
            ..Self::default()
        };
        panel.reset();
        self.rescale(panel);
        self.zoom(panel, true)?;
        Ok(())
    }

    /// Where the buffer's top-left lands in the panel.
    pub fn draw_offset(&self, panel: &PanelState) -> Point {
        Point::new(
            self.left_top.x.saturating_add(panel.pan.x),
            self.left_top.y.saturating_add(panel.pan.y),
        )
    }

    pub fn source(&self) -> Option<&Arc<Raster>> {
        self.source.as_ref()
    }

    pub fn cropped(&self) -> Option<&Raster> {
        self.cropped.as_ref()
    }

    /// Scaled, bottom-up buffer ready for the render sink.
    pub fn zoomed(&self) -> Option<&Raster> {
        self.zoomed.as_ref()
    }

    pub fn zoomed_size(&self) -> Size {
        self.zoomed_size
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn zoom_multiplier(&self) -> f64 {
        self.zoom
    }

    pub fn crop(&self) -> CropBox {
        self.crop
    }

    pub fn left_top(&self) -> Point {
        self.left_top
    }

    /// Geometry is current but pixels were skipped while hidden.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::geometry::PixelRect;
    use crate::view::panel::{FitMode, Wheel, ZOOM_STEP};

    fn setup(fit: FitMode, panel: Size, source: Size) -> (CanvasState, PanelState, Arc<Raster>) {
        (
            CanvasState::new(),
            PanelState::new("test", fit, panel),
            Arc::new(Raster::blank(source.width, source.height)),
        )
    }

    /// Calculate + build, asserting a rebuild happened.
    fn settle(canvas: &mut CanvasState, panel: &mut PanelState, src: &Arc<Raster>, id: PanelId) {
        assert_eq!(canvas.calculate(src, panel, id), ZoomOutcome::Rerender);
        assert!(canvas.zoom(panel, false).unwrap());
    }

    #[test]
    fn test_wide_source_in_main_panel() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(800, 600), Size::new(1600, 400));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);

        assert_eq!(canvas.ratio(), 0.5);
        assert_eq!(canvas.zoomed_size(), Size::new(800, 200));
        assert_eq!(canvas.zoomed().map(|z| z.size()), Some(Size::new(800, 200)));
        assert_eq!(canvas.left_top(), Point::new(0, 200));
        assert_eq!(canvas.cropped().map(|c| c.size()), Some(Size::new(1600, 400)));
    }

    #[test]
    fn test_no_change_is_unchanged() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);

        assert_eq!(canvas.calculate(&src, &mut panel, PanelId::MAIN), ZoomOutcome::Unchanged);
        assert!(!canvas.zoom(&mut panel, false).unwrap());
        // Forced rebuild still works
        assert!(canvas.zoom(&mut panel, true).unwrap());
    }

    #[test]
    fn test_resize_triggers_rerender() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitWidth, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId(1));
        panel.size = Size::new(100, 150);
        settle(&mut canvas, &mut panel, &src, PanelId(1));
        assert_eq!(canvas.ratio(), 0.25);
        assert_eq!(canvas.zoomed_size(), Size::new(100, 72));
    }

    #[test]
    fn test_aux_selection_crops_itself() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitHeight, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId(1));
        assert_eq!(canvas.zoomed_size(), Size::new(200, 148));

        panel.pan = Point::new(3, 0);
        let draw = canvas.draw_offset(&panel);
        // Left half of the displayed buffer
        panel.commit_selection(PixelRect::new(draw.x, draw.y, draw.x + 100, draw.y + 148));
        settle(&mut canvas, &mut panel, &src, PanelId(1));

        assert_eq!(canvas.crop(), CropBox::new(0.0, 0.0, 0.5, 1.0));
        assert_eq!(panel.selection, None);
        assert_eq!(panel.pan, Point::default());
        assert_eq!(canvas.cropped().map(|c| c.size()), Some(Size::new(200, 300)));
    }

    #[test]
    fn test_main_selection_broadcasts() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);

        let draw = canvas.draw_offset(&panel);
        panel.commit_selection(PixelRect::new(draw.x + 100, draw.y, draw.x + 200, draw.y + 74));
        match canvas.calculate(&src, &mut panel, PanelId::MAIN) {
            ZoomOutcome::Broadcast(crop) => {
                assert_eq!(crop, CropBox::new(0.5, 0.0, 1.0, 0.5));
            }
            other => panic!("expected broadcast, got {:?}", other),
        }
        assert!(canvas.crop().is_full());
        assert_eq!(panel.selection, None);
    }

    #[test]
    fn test_full_selection_leaves_crop() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId(2));
        let crop = CropBox::new(0.25, 0.25, 0.75, 0.75);
        assert_eq!(canvas.apply_crop(&src, &mut panel, crop), ZoomOutcome::Rerender);
        canvas.zoom(&mut panel, false).unwrap();

        panel.commit_selection(PixelRect::new(-10, -10, 500, 500));
        assert_eq!(canvas.calculate(&src, &mut panel, PanelId(2)), ZoomOutcome::Unchanged);
        assert_eq!(canvas.crop(), crop);
    }

    #[test]
    fn test_rejected_selection_still_consumed() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId(1));
        panel.pan = Point::new(4, 4);
        panel.commit_selection(PixelRect::new(-40, -40, -20, -20));

        assert_eq!(canvas.calculate(&src, &mut panel, PanelId(1)), ZoomOutcome::Unchanged);
        assert!(canvas.crop().is_full());
        assert_eq!(panel.selection, None);
        assert_eq!(panel.pan, Point::default());
    }

    #[test]
    fn test_wheel_zoom_keeps_cursor_point() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(800, 600), Size::new(1600, 400));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);

        assert!(panel.wheel(Wheel::In, Point::new(400, 300), ZOOM_STEP));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);

        assert_eq!(canvas.zoomed_size(), Size::new(880, 220));
        assert_eq!(canvas.left_top(), Point::new(-40, 190));
        assert_eq!(panel.zoom_origin, None);
    }

    #[test]
    fn test_unchanged_drops_zoom_origin() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);
        panel.zoom_origin = Some(Point::new(5, 5));
        assert_eq!(canvas.calculate(&src, &mut panel, PanelId::MAIN), ZoomOutcome::Unchanged);
        assert_eq!(panel.zoom_origin, None);
    }

    #[test]
    fn test_hidden_panel_skips_pixels() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        panel.visible = false;
        settle(&mut canvas, &mut panel, &src, PanelId(1));
        assert!(canvas.zoomed().is_none());
        assert!(canvas.is_stale());
        assert_eq!(canvas.zoomed_size(), Size::new(200, 148));

        panel.visible = true;
        assert!(canvas.zoom(&mut panel, true).unwrap());
        assert!(!canvas.is_stale());
        assert_eq!(canvas.zoomed().map(|z| z.size()), Some(Size::new(200, 148)));
    }

    #[test]
    fn test_move_image_clamps_pan() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(800, 600), Size::new(1600, 400));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);
        // 800x200 at (0, 200): no horizontal slack, 400px vertical
        panel.pan_by(50, 1000);
        canvas.move_image(&mut panel);
        assert_eq!(panel.pan, Point::new(0, 200));
        assert_eq!(canvas.draw_offset(&panel), Point::new(0, 400));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 300));
        settle(&mut canvas, &mut panel, &src, PanelId(1));
        canvas.apply_crop(&src, &mut panel, CropBox::new(0.0, 0.0, 0.5, 0.5));
        canvas.zoom(&mut panel, false).unwrap();
        panel.wheel(Wheel::In, Point::new(10, 10), ZOOM_STEP);

        canvas.reset(&mut panel, None).unwrap();
        assert!(canvas.crop().is_full());
        assert_eq!(panel.zoom, 1.0);
        assert_eq!(canvas.ratio(), 0.5);
        assert_eq!(canvas.zoomed_size(), Size::new(200, 148));
    }

    #[test]
    fn test_reset_with_rotated_source() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 200), Size::new(400, 100));
        settle(&mut canvas, &mut panel, &src, PanelId::MAIN);
        assert_eq!(canvas.zoomed_size(), Size::new(200, 48));

        let rotated = Arc::new(src.rotate(crate::core::raster::Rotation::Clockwise));
        canvas.reset(&mut panel, Some(rotated)).unwrap();
        assert_eq!(canvas.zoomed_size(), Size::new(48, 200));
    }

    #[test]
    fn test_zero_height_source() {
        let (mut canvas, mut panel, src) = setup(FitMode::FitAll, Size::new(200, 150), Size::new(400, 0));
        canvas.calculate(&src, &mut panel, PanelId::MAIN);
        assert_eq!(canvas.ratio(), 1.0);
        assert!(!canvas.zoom(&mut panel, true).unwrap());
        assert!(canvas.zoomed().is_none());
    }
}
