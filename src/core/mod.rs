//! Core engine modules - raster, decoding, cache, worker
//!
//! These modules form the loading pipeline, independent of any display.

pub mod cache;
pub mod loader;
pub mod locator;
pub mod raster;
pub mod workers;

// Re-exports for convenience
pub use cache::{CacheEvent, CacheStats, ImageCache, LoadRequest, Lookup};
pub use loader::{Decoder, ImageDecoder};
pub use locator::Locator;
pub use raster::{Flip, Raster, Rotation};
pub use workers::Completion;
