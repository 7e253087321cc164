//! Error taxonomy shared by the cache pipeline, raster buffer and browser.
//!
//! - `Decode`: unreadable or corrupt source. Reported through the cache's
//!   failure event, never fatal to the worker.
//! - `Bounds`: crop rectangle outside the buffer. The transform engine clamps
//!   before cropping, so seeing this one means a clamping bug.
//! - `EmptyCollection`: nothing to browse. Navigation becomes a no-op.

use std::path::PathBuf;

use crate::core::locator::Locator;
use crate::view::geometry::PixelRect;

#[derive(Debug)]
pub enum Error {
    Decode { locator: Locator, reason: String },
    Bounds { rect: PixelRect, width: u32, height: u32 },
    EmptyCollection(PathBuf),
    Io(std::io::Error),
}

impl Error {
    pub fn decode(locator: &Locator, reason: impl Into<String>) -> Self {
        Error::Decode {
            locator: locator.clone(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Decode { locator, reason } => {
                write!(f, "Decode error: {}: {}", locator, reason)
            }
            Error::Bounds { rect, width, height } => write!(
                f,
                "Crop rect ({}, {}, {}, {}) outside {}x{} buffer",
                rect.left, rect.top, rect.right, rect.bottom, width, height
            ),
            Error::EmptyCollection(path) => {
                write!(f, "No images found in {}", path.display())
            }
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
