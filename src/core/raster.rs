//! Owned RGB pixel buffer with crop/resize/rotate.
//!
//! **Why**: The transform engine needs value semantics. Every operation returns
//! a fresh buffer so a source shared between panels is never mutated.
//!
//! **Used by**: Decoder (produces), CanvasState (crops and scales per panel),
//! Viewer (rotation of the active image), render sinks (consume).
//!
//! # Layout
//!
//! Row-major, 3 bytes per pixel, no alpha. Decoded images are converted to RGB
//! at load time regardless of their stored format.
//!
//! # Scanline order
//!
//! `resize()` flips vertically by default because render sinks consume
//! bottom-up scanlines. Pass `Flip::None` to keep top-down order.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::debug;

use crate::core::locator::Locator;
use crate::error::{Error, Result};
use crate::view::geometry::{PixelRect, Size};

/// Vertical flip applied after resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flip {
    /// Bottom-up output for the render sink.
    #[default]
    Vertical,
    None,
}

/// Quarter-turn rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pixels: RgbImage,
}

impl Raster {
    /// Black buffer of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbImage::new(width, height),
        }
    }

    /// Wrap raw RGB bytes. Returns `None` if `data.len() != width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|pixels| Self { pixels })
    }

    /// Decode a file through the `image` crate and normalize it to RGB8.
    pub fn open(path: &Path) -> Result<Self> {
        let locator = Locator::from(path);
        let img = image::open(path).map_err(|e| Error::decode(&locator, e.to_string()))?;
        let pixels = img.to_rgb8();
        debug!("Decoded {}: {}x{}", locator, pixels.width(), pixels.height());
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Raw RGB bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.pixels
    }

    /// Copy out `rect`. The caller clamps; an out-of-range rect is a `Bounds` error.
    pub fn crop(&self, rect: PixelRect) -> Result<Raster> {
        let (w, h) = (self.width() as i64, self.height() as i64);
        let in_bounds = rect.left >= 0
            && rect.top >= 0
            && rect.left <= rect.right
            && rect.top <= rect.bottom
            && rect.right as i64 <= w
            && rect.bottom as i64 <= h;
        if !in_bounds {
            return Err(Error::Bounds {
                rect,
                width: self.width(),
                height: self.height(),
            });
        }

        let pixels = imageops::crop_imm(
            &self.pixels,
            rect.left as u32,
            rect.top as u32,
            rect.width() as u32,
            rect.height() as u32,
        )
        .to_image();
        Ok(Self { pixels })
    }

    /// Scale to `width` x `height`.
    ///
    /// The width decides the filter: a wider target upsamples bicubic, a
    /// narrower or equal one area-averages. When only the height grows, area
    /// averaging cannot upsample, so a triangle filter is used instead. An
    /// empty source yields a black buffer of the requested size.
    pub fn resize(&self, width: u32, height: u32, flip: Flip) -> Raster {
        let resized = if self.is_empty() || width == 0 || height == 0 {
            RgbImage::new(width, height)
        } else if width > self.width() {
            imageops::resize(&self.pixels, width, height, FilterType::CatmullRom)
        } else if height > self.height() {
            imageops::resize(&self.pixels, width, height, FilterType::Triangle)
        } else {
            imageops::thumbnail(&self.pixels, width, height)
        };

        let pixels = match flip {
            Flip::Vertical => imageops::flip_vertical(&resized),
            Flip::None => resized,
        };
        Self { pixels }
    }

    /// Lossless quarter turn; width and height swap.
    pub fn rotate(&self, rotation: Rotation) -> Raster {
        let pixels = match rotation {
            Rotation::Clockwise => imageops::rotate90(&self.pixels),
            Rotation::CounterClockwise => imageops::rotate270(&self.pixels),
        };
        Self { pixels }
    }

    /// Top-down copy of a bottom-up buffer (and vice versa).
    pub fn flipped(&self) -> Raster {
        Self {
            pixels: imageops::flip_vertical(&self.pixels),
        }
    }
}
