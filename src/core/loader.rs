//! Codec collaborator: turns a `Locator` into a decoded `Raster`.
//!
//! The cache worker only sees the `Decoder` trait. The default
//! `ImageDecoder` reads files through the `image` crate; archive-backed
//! browsers plug in their own implementation.

use log::trace;

use crate::core::locator::Locator;
use crate::core::raster::Raster;
use crate::error::Result;

/// Black-box decode step. May be slow; always called on the worker thread.
pub trait Decoder: Send + Sync + 'static {
    fn decode(&self, locator: &Locator) -> Result<Raster>;
}

/// File decoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    fn decode(&self, locator: &Locator) -> Result<Raster> {
        trace!("ImageDecoder: {}", locator);
        Raster::open(locator.path())
    }
}

impl<F> Decoder for F
where
    F: Fn(&Locator) -> Result<Raster> + Send + Sync + 'static,
{
    fn decode(&self, locator: &Locator) -> Result<Raster> {
        self(locator)
    }
}
