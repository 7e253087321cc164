//! Output collaborators: where rendered panels and status updates go.
//!
//! The viewer never touches a display surface. It hands each rebuilt panel to
//! a `RenderSink` and each status change to a `StatusSink`.
//!
//! - `PngSink`: composes every panel onto its own PNG in an output directory
//! - `LogStatus`: status lines through the `log` facade
//! - `NullSink`: discards frames (headless runs without `--out`)

use std::path::PathBuf;

use image::{Rgb, RgbImage, imageops};
use log::{debug, error, info};

use crate::core::locator::Locator;
use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::view::geometry::{PixelRect, Point, Size};
use crate::view::panel::PanelId;

/// Panel background behind the image.
const BACKGROUND: Rgb<u8> = Rgb([64, 64, 64]);
/// Selection overlay outline.
const OVERLAY: Rgb<u8> = Rgb([0, 255, 0]);

/// One rebuilt panel.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub panel: PanelId,
    pub name: &'a str,
    pub panel_size: Size,
    /// Bottom-up scaled buffer.
    pub pixels: &'a Raster,
    /// Top-left of the buffer in panel coordinates.
    pub offset: Point,
    pub overlay: Option<PixelRect>,
}

pub trait RenderSink {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()>;
}

/// Published when a new image becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStatus {
    /// Zero-based position in the collection.
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub folder: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {} ({}x{}) in {}",
            self.index + 1,
            self.total,
            self.name,
            self.width,
            self.height,
            self.folder.display()
        )
    }
}

pub trait StatusSink {
    fn status(&mut self, status: &ImageStatus);
    /// Around primary loads.
    fn busy(&mut self, busy: bool);
    fn error(&mut self, locator: &Locator, error: &Error);
}

/// Writes `<dir>/<panel name>.png` for every rendered frame.
#[derive(Debug, Clone)]
pub struct PngSink {
    dir: PathBuf,
}

impl PngSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("Rendering panels to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", name))
    }
}

/// Compose a frame into a top-down panel-sized image.
pub fn compose(frame: &Frame<'_>) -> RgbImage {
    let Size { width, height } = frame.panel_size;
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let top_down = frame.pixels.flipped();
    imageops::overlay(&mut canvas, top_down.as_image(), frame.offset.x as i64, frame.offset.y as i64);
    if let Some(rect) = frame.overlay {
        outline(&mut canvas, rect);
    }
    canvas
}

fn outline(img: &mut RgbImage, rect: PixelRect) {
    if rect.is_empty() {
        return;
    }
    // Clip to the canvas; only edges that fall inside get drawn
    let (w, h) = (img.width() as i32, img.height() as i32);
    let (right, bottom) = (rect.right.saturating_sub(1), rect.bottom.saturating_sub(1));
    let (x0, x1) = (rect.left.max(0), right.min(w - 1));
    let (y0, y1) = (rect.top.max(0), bottom.min(h - 1));
    if x0 > x1 || y0 > y1 {
        return;
    }
    for x in x0..=x1 {
        if rect.top >= 0 {
            img.put_pixel(x as u32, y0 as u32, OVERLAY);
        }
        if bottom < h {
            img.put_pixel(x as u32, y1 as u32, OVERLAY);
        }
    }
    for y in y0..=y1 {
        if rect.left >= 0 {
            img.put_pixel(x0 as u32, y as u32, OVERLAY);
        }
        if right < w {
            img.put_pixel(x1 as u32, y as u32, OVERLAY);
        }
    }
}

impl RenderSink for PngSink {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        let path = self.path_for(frame.name);
        compose(frame)
            .save(&path)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        debug!("Wrote {} ({})", path.display(), frame.panel);
        Ok(())
    }
}

/// Drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, _frame: &Frame<'_>) -> Result<()> {
        Ok(())
    }
}

/// Status updates as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&mut self, status: &ImageStatus) {
        info!("{}", status);
    }

    fn busy(&mut self, busy: bool) {
        debug!("Busy: {}", busy);
    }

    fn error(&mut self, locator: &Locator, err: &Error) {
        error!("Failed to load {}: {}", locator, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red(width: u32, height: u32) -> Raster {
        Raster::from_rgb(width, height, [255, 0, 0].repeat((width * height) as usize)).unwrap()
    }

    #[test]
    fn test_compose_places_buffer_at_offset() {
        // Top row marked blue so orientation is visible after the flip
        let mut data = [255u8, 0, 0].repeat(16);
        data[..12].copy_from_slice(&[0, 0, 255].repeat(4));
        let top_down = Raster::from_rgb(4, 4, data).unwrap();
        let bottom_up = top_down.flipped();

        let frame = Frame {
            panel: PanelId::MAIN,
            name: "main",
            panel_size: Size::new(10, 8),
            pixels: &bottom_up,
            offset: Point::new(3, 2),
            overlay: None,
        };
        let img = compose(&frame);
        assert_eq!(img.dimensions(), (10, 8));
        assert_eq!(img.get_pixel(0, 0), &BACKGROUND);
        assert_eq!(img.get_pixel(3, 2), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(6, 5), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(7, 5), &BACKGROUND);
    }

    #[test]
    fn test_compose_clips_and_draws_overlay() {
        let pixels = red(20, 20);
        let frame = Frame {
            panel: PanelId(1),
            name: "aux1",
            panel_size: Size::new(10, 10),
            pixels: &pixels,
            offset: Point::new(-5, -5),
            overlay: Some(PixelRect::new(2, 2, 6, 6)),
        };
        let img = compose(&frame);
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(2, 2), &OVERLAY);
        assert_eq!(img.get_pixel(5, 4), &OVERLAY);
        assert_eq!(img.get_pixel(4, 4), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_overlay_far_outside_is_clipped() {
        let pixels = red(4, 4);
        let frame = Frame {
            panel: PanelId::MAIN,
            name: "main",
            panel_size: Size::new(10, 8),
            pixels: &pixels,
            offset: Point::new(20, 20),
            overlay: Some(PixelRect::new(-2_000_000_000, 0, 2_000_000_000, 10)),
        };
        let img = compose(&frame);
        // Only the top edge lies inside the canvas
        assert!((0..10).all(|x| img.get_pixel(x, 0) == &OVERLAY));
        assert_eq!(img.get_pixel(0, 1), &BACKGROUND);
        assert_eq!(img.get_pixel(9, 7), &BACKGROUND);

        let frame = Frame {
            overlay: Some(PixelRect::new(i32::MIN, i32::MIN, -1, -1)),
            ..frame
        };
        assert!(compose(&frame).pixels().all(|p| p == &BACKGROUND));
    }

    #[test]
    fn test_png_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSink::new(dir.path().join("out")).unwrap();
        let pixels = red(4, 4);
        let frame = Frame {
            panel: PanelId(2),
            name: "aux2",
            panel_size: Size::new(8, 6),
            pixels: &pixels,
            offset: Point::new(2, 1),
            overlay: None,
        };
        sink.render(&frame).unwrap();

        let written = image::open(sink.path_for("aux2")).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (8, 6));
        assert_eq!(written.get_pixel(2, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_status_display() {
        let status = ImageStatus {
            index: 2,
            total: 10,
            name: "003.png".into(),
            folder: PathBuf::from("/pics"),
            width: 640,
            height: 480,
        };
        assert_eq!(status.to_string(), "[3/10] 003.png (640x480) in /pics");
    }
}
