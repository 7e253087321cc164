//! TRIPANE - multi-panel image viewer core
//!
//! Asynchronous LRU image cache plus a zoom/crop/pan engine that keeps a main
//! panel and magnifier panels in step. Display surfaces plug in via sinks.

// Core engine (raster, decoding, cache, worker)
pub mod core;
// Transform engine (geometry, panel state, canvases)
pub mod view;

pub mod browser;
pub mod cli;
pub mod error;
pub mod paths;
pub mod settings;
pub mod shell;
pub mod sink;
pub mod viewer;

// Re-export commonly used types
pub use browser::{Browser, DirBrowser};
pub use core::{CacheEvent, Decoder, ImageCache, ImageDecoder, LoadRequest, Locator, Lookup, Raster, Rotation};
pub use error::{Error, Result};
pub use settings::Settings;
pub use sink::{Frame, ImageStatus, LogStatus, NullSink, PngSink, RenderSink, StatusSink};
pub use view::{CanvasState, CropBox, FitMode, PanelId, PanelState, PixelRect, Point, Size, Wheel, ZoomOutcome};
pub use viewer::{Navigation, Viewer};
