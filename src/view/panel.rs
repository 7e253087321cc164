//! Per-panel view state owned by the viewer.
//!
//! A panel is one display surface: the main view or an auxiliary magnifier.
//! `PanelState` holds what the user controls (size, fit mode, pan, wheel zoom)
//! plus the one-shot gesture inputs the transform engine consumes.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::view::geometry::{PixelRect, Point, Size};

/// Wheel zoom multiplier bounds.
pub const ZOOM_MIN: f64 = 0.5;
pub const ZOOM_MAX: f64 = 4.0;

/// Default wheel zoom factor per notch.
pub const ZOOM_STEP: f64 = 1.1;

/// Index into the viewer's panel list. Index 0 is the main panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub usize);

impl PanelId {
    pub const MAIN: PanelId = PanelId(0);

    pub fn is_main(self) -> bool {
        self == Self::MAIN
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the scale ratio is derived from panel and image sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitMode {
    /// Whole (cropped) image visible.
    #[default]
    FitAll,
    FitHeight,
    FitWidth,
}

impl FitMode {
    /// Cycle order: FIT_ALL -> FIT_HEIGHT -> FIT_WIDTH -> FIT_ALL.
    pub fn next(self) -> Self {
        match self {
            FitMode::FitAll => FitMode::FitHeight,
            FitMode::FitHeight => FitMode::FitWidth,
            FitMode::FitWidth => FitMode::FitAll,
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FitMode::FitAll => "FIT_ALL",
            FitMode::FitHeight => "FIT_HEIGHT",
            FitMode::FitWidth => "FIT_WIDTH",
        };
        f.write_str(s)
    }
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "FIT_ALL" | "ALL" => Ok(FitMode::FitAll),
            "FIT_HEIGHT" | "HEIGHT" => Ok(FitMode::FitHeight),
            "FIT_WIDTH" | "WIDTH" => Ok(FitMode::FitWidth),
            other => Err(format!("unknown fit mode: {}", other)),
        }
    }
}

/// Wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub name: String,
    pub size: Size,
    pub fit: FitMode,
    /// User drag offset added to the computed draw position.
    pub pan: Point,
    /// Wheel zoom multiplier, within [ZOOM_MIN, ZOOM_MAX].
    pub zoom: f64,
    /// Committed selection waiting to be turned into a crop (one-shot).
    pub selection: Option<PixelRect>,
    /// Selection rectangle being dragged, drawn by the render sink.
    pub overlay: Option<PixelRect>,
    /// Cursor position of the last wheel zoom (one-shot).
    pub zoom_origin: Option<Point>,
    pub visible: bool,
}

impl PanelState {
    pub fn new(name: impl Into<String>, fit: FitMode, size: Size) -> Self {
        Self {
            name: name.into(),
            size,
            fit,
            pan: Point::default(),
            zoom: 1.0,
            selection: None,
            overlay: None,
            zoom_origin: None,
            visible: true,
        }
    }

    /// Restore gesture state to defaults. Name, size, fit and visibility stay.
    pub fn reset(&mut self) {
        self.pan = Point::default();
        self.zoom = 1.0;
        self.selection = None;
        self.overlay = None;
        self.zoom_origin = None;
    }

    /// Apply one wheel notch around `at`. Returns false if the multiplier was
    /// already pinned at the bound in that direction.
    pub fn wheel(&mut self, wheel: Wheel, at: Point, step: f64) -> bool {
        let step = if step.is_finite() && step > 1.0 { step } else { ZOOM_STEP };
        let zoom = match wheel {
            Wheel::In => self.zoom * step,
            Wheel::Out => self.zoom / step,
        }
        .clamp(ZOOM_MIN, ZOOM_MAX);

        if zoom == self.zoom {
            return false;
        }
        debug!("{}: wheel zoom {:.3} -> {:.3} at ({}, {})", self.name, self.zoom, zoom, at.x, at.y);
        self.zoom = zoom;
        self.zoom_origin = Some(at);
        true
    }

    /// Update the drag overlay while a selection is in progress.
    pub fn drag_selection(&mut self, rect: PixelRect) {
        self.overlay = Some(rect);
    }

    /// Commit a selection. Zero-area rectangles are dropped.
    pub fn commit_selection(&mut self, rect: PixelRect) {
        self.overlay = None;
        self.selection = if rect.is_empty() { None } else { Some(rect) };
    }

    pub fn pan_by(&mut self, dx: i32, dy: i32) {
        self.pan = Point::new(self.pan.x.saturating_add(dx), self.pan.y.saturating_add(dy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> PanelState {
        PanelState::new("main", FitMode::FitAll, Size::new(800, 600))
    }

    #[test]
    fn test_fit_cycle() {
        assert_eq!(FitMode::FitAll.next(), FitMode::FitHeight);
        assert_eq!(FitMode::FitHeight.next(), FitMode::FitWidth);
        assert_eq!(FitMode::FitWidth.next(), FitMode::FitAll);
    }

    #[test]
    fn test_fit_parse_and_serde() {
        assert_eq!("fit_width".parse::<FitMode>(), Ok(FitMode::FitWidth));
        assert_eq!("height".parse::<FitMode>(), Ok(FitMode::FitHeight));
        assert!("stretch".parse::<FitMode>().is_err());

        let json = serde_json::to_string(&FitMode::FitHeight).unwrap();
        assert_eq!(json, "\"FIT_HEIGHT\"");
        let back: FitMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FitMode::FitHeight);
    }

    #[test]
    fn test_wheel_clamps_and_records_origin() {
        let mut p = panel();
        assert!(p.wheel(Wheel::In, Point::new(10, 20), ZOOM_STEP));
        assert!((p.zoom - 1.1).abs() < 1e-12);
        assert_eq!(p.zoom_origin, Some(Point::new(10, 20)));

        for _ in 0..50 {
            p.wheel(Wheel::In, Point::new(0, 0), ZOOM_STEP);
        }
        assert_eq!(p.zoom, ZOOM_MAX);
        p.zoom_origin = None;
        assert!(!p.wheel(Wheel::In, Point::new(0, 0), ZOOM_STEP));
        assert_eq!(p.zoom_origin, None);

        for _ in 0..50 {
            p.wheel(Wheel::Out, Point::new(0, 0), ZOOM_STEP);
        }
        assert_eq!(p.zoom, ZOOM_MIN);
    }

    #[test]
    fn test_commit_selection_drops_empty() {
        let mut p = panel();
        p.drag_selection(PixelRect::new(1, 1, 5, 5));
        assert!(p.overlay.is_some());
        p.commit_selection(PixelRect::new(10, 10, 10, 40));
        assert_eq!(p.overlay, None);
        assert_eq!(p.selection, None);

        p.commit_selection(PixelRect::new(10, 10, 20, 40));
        assert_eq!(p.selection, Some(PixelRect::new(10, 10, 20, 40)));
    }

    #[test]
    fn test_pan_by_saturates() {
        let mut p = panel();
        p.pan_by(0, 1);
        p.pan_by(i32::MAX, i32::MAX);
        assert_eq!(p.pan, Point::new(i32::MAX, i32::MAX));
        p.pan_by(i32::MIN, i32::MIN);
        assert_eq!(p.pan, Point::new(-1, -1));
    }

    #[test]
    fn test_reset_keeps_identity() {
        let mut p = panel();
        p.fit = FitMode::FitWidth;
        p.visible = false;
        p.pan_by(5, -3);
        p.wheel(Wheel::In, Point::new(1, 1), ZOOM_STEP);
        p.commit_selection(PixelRect::new(0, 0, 4, 4));

        p.reset();
        assert_eq!(p.pan, Point::default());
        assert_eq!(p.zoom, 1.0);
        assert_eq!(p.selection, None);
        assert_eq!(p.zoom_origin, None);
        assert_eq!(p.fit, FitMode::FitWidth);
        assert!(!p.visible);
        assert_eq!(p.size, Size::new(800, 600));
    }
}
