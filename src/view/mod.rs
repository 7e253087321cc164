//! Zoom/crop/pan transform engine - pure math plus per-panel state

pub mod canvas;
pub mod geometry;
pub mod panel;
pub mod transform;

pub use canvas::{CanvasState, ZoomOutcome};
pub use geometry::{CropBox, PixelRect, Point, Size};
pub use panel::{FitMode, PanelId, PanelState, Wheel};
