//! Orchestrator: navigation, cache requests and per-panel transforms.
//!
//! **Why**: Panels, the cache and the browser know nothing about each other.
//! The viewer owns all of them and is the only place that decides which image
//! is active and which panels get redrawn.
//!
//! **Used by**: Shell (text commands), main (event loop)
//!
//! # Flow
//!
//! 1. Navigation selects a locator in the browser
//! 2. A primary `request_load` goes to the cache, plus prefetch requests for
//!    the next `prefetch_depth` locators in the browsing direction
//! 3. Completions come back through `pump()` / `complete()`; only the latest
//!    primary request becomes the active image, others just stay cached
//! 4. Activation recomputes every panel and hands the results to the render sink
//!
//! Canvases are created on the first activation and then kept, so a crop set
//! on a magnifier panel follows page turns.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::browser::{Browser, DirBrowser};
use crate::core::cache::{CacheEvent, ImageCache, LoadRequest, Lookup};
use crate::core::locator::Locator;
use crate::core::raster::{Raster, Rotation};
use crate::core::workers::Completion;
use crate::error::Result;
use crate::settings::Settings;
use crate::sink::{Frame, ImageStatus, RenderSink, StatusSink};
use crate::view::canvas::{CanvasState, ZoomOutcome};
use crate::view::geometry::{CropBox, PixelRect, Point, Size};
use crate::view::panel::{FitMode, PanelId, PanelState, Wheel, ZOOM_STEP};

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Already showing this locator.
    Same,
    /// Served from the cache and shown immediately.
    Shown(Locator),
    /// Decoding in the background.
    Loading(Locator),
    /// Nothing to navigate (no browser, empty collection, bad index).
    Empty,
    /// The cache has shut down.
    Closed,
}

pub struct Viewer {
    browser: Option<Box<dyn Browser>>,
    cache: ImageCache,
    render: Box<dyn RenderSink>,
    status: Box<dyn StatusSink>,
    panels: Vec<PanelState>,
    canvases: Option<Vec<CanvasState>>,
    image: Option<Arc<Raster>>,
    current: Option<Locator>,
    pending: Option<Locator>,
    prefetch_depth: usize,
    zoom_step: f64,
    extensions: Vec<String>,
}

impl Viewer {
    /// `panels[0]` is the main panel. An empty list gets a default main panel.
    pub fn new(
        cache: ImageCache,
        mut panels: Vec<PanelState>,
        render: Box<dyn RenderSink>,
        status: Box<dyn StatusSink>,
    ) -> Self {
        if panels.is_empty() {
            panels.push(PanelState::new("main", FitMode::FitAll, Size::new(800, 600)));
        }
        Self {
            browser: None,
            cache,
            render,
            status,
            panels,
            canvases: None,
            image: None,
            current: None,
            pending: None,
            prefetch_depth: 1,
            zoom_step: ZOOM_STEP,
            extensions: crate::browser::default_extensions(),
        }
    }

    /// Viewer configured from `settings`.
    pub fn from_settings(
        settings: &Settings,
        cache: ImageCache,
        render: Box<dyn RenderSink>,
        status: Box<dyn StatusSink>,
    ) -> Self {
        let mut viewer = Self::new(cache, settings.panel_states(), render, status)
            .with_prefetch_depth(settings.prefetch_depth)
            .with_zoom_step(settings.zoom_step);
        viewer.extensions = settings.extensions.clone();
        viewer
    }

    pub fn with_prefetch_depth(mut self, depth: usize) -> Self {
        self.prefetch_depth = depth;
        self
    }

    pub fn with_zoom_step(mut self, step: f64) -> Self {
        self.zoom_step = step;
        self
    }

    // === Navigation ===

    /// Browse the directory of `path` (or `path` itself if it is a directory).
    pub fn open(&mut self, path: &Path) -> Result<Navigation> {
        let browser = DirBrowser::open(path, &self.extensions).inspect_err(|e| warn!("Open failed: {}", e))?;
        Ok(self.set_browser(Box::new(browser)))
    }

    /// Replace the collection and show its selected entry.
    ///
    /// A primary load still pending from the old collection is abandoned: it
    /// will not become the active image even if its decode is in flight.
    pub fn set_browser(&mut self, browser: Box<dyn Browser>) -> Navigation {
        if let Some(abandoned) = self.pending.take() {
            debug!("Abandon pending load of {}", abandoned);
            self.status.busy(false);
        }
        self.cache.clear_pending();
        let index = browser.current_index();
        self.browser = Some(browser);
        match index {
            Some(index) => self.goto(index),
            None => Navigation::Empty,
        }
    }

    pub fn goto(&mut self, index: usize) -> Navigation {
        let locator = self.browser.as_mut().and_then(|b| b.select(index));
        match locator {
            Some(locator) => self.navigate(locator, 0),
            None => Navigation::Empty,
        }
    }

    /// Move `direction` steps (negative = backwards), wrapping around.
    pub fn step(&mut self, direction: i64) -> Navigation {
        let locator = self.browser.as_mut().and_then(|b| b.step(direction));
        match locator {
            Some(locator) => self.navigate(locator, direction),
            None => Navigation::Empty,
        }
    }

    fn navigate(&mut self, locator: Locator, direction: i64) -> Navigation {
        if self.current.as_ref() == Some(&locator) {
            if self.pending.take().is_some() {
                self.status.busy(false);
            }
            return Navigation::Same;
        }

        info!("Navigate to {}", locator);
        self.pending = Some(locator.clone());
        self.status.busy(true);

        let nav = match self.cache.request_load(locator.clone()) {
            Lookup::Hit(request) => {
                self.activate(&request);
                Navigation::Shown(locator)
            }
            Lookup::Closed => {
                self.pending = None;
                self.status.busy(false);
                return Navigation::Closed;
            }
            Lookup::Queued | Lookup::Requeued | Lookup::InFlight => Navigation::Loading(locator),
        };

        if direction != 0 {
            self.prefetch(direction.signum());
        }
        nav
    }

    fn prefetch(&mut self, direction: i64) {
        let Some(browser) = self.browser.as_ref() else {
            return;
        };
        for i in 1..=self.prefetch_depth as i64 {
            let Some(next) = browser.peek_relative(direction * i) else {
                break;
            };
            if self.current.as_ref() == Some(&next) || self.pending.as_ref() == Some(&next) {
                continue;
            }
            trace!("Prefetch {}", next);
            self.cache.request_prefetch(next);
        }
    }

    // === Cache completions ===

    /// Handle a completion received from `cache().completions()`.
    pub fn complete(&mut self, completion: Completion) {
        let event = self.cache.complete(completion);
        self.handle(event);
    }

    /// Drain finished decodes without blocking. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let events = self.cache.poll();
        let count = events.len();
        for event in events {
            self.handle(event);
        }
        count
    }

    /// Block until the pending primary load resolves or `timeout` passes.
    /// Returns true when nothing is pending anymore.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.cache.wait(remaining) {
                Some(event) => self.handle(event),
                None => break,
            }
        }
        self.pending.is_none()
    }

    fn handle(&mut self, event: CacheEvent) {
        match event {
            CacheEvent::Loaded(request) => {
                if self.pending.as_ref() == Some(&request.locator) {
                    self.activate(&request);
                } else {
                    debug!("Cached in background: {}", request.locator);
                }
            }
            CacheEvent::Failed { locator, error } => {
                if self.pending.as_ref() == Some(&locator) {
                    self.pending = None;
                    self.status.busy(false);
                    self.status.error(&locator, &error);
                } else {
                    warn!("Background load failed: {}", error);
                }
            }
        }
    }

    /// Make a decoded request the active image and redraw every panel.
    fn activate(&mut self, request: &Arc<LoadRequest>) {
        let Some(raster) = request.raster().cloned() else {
            warn!("Loaded request without pixels: {}", request.locator);
            return;
        };
        info!("Showing {} ({}x{})", request.locator, raster.width(), raster.height());

        self.pending = None;
        self.current = Some(request.locator.clone());
        self.image = Some(Arc::clone(&raster));

        let count = self.panels.len();
        let canvases = self
            .canvases
            .get_or_insert_with(|| (0..count).map(|_| CanvasState::new()).collect());
        for (i, (panel, canvas)) in self.panels.iter_mut().zip(canvases.iter_mut()).enumerate() {
            // A selection drawn on the previous image means nothing here
            panel.selection = None;
            panel.overlay = None;
            canvas.calculate(&raster, panel, PanelId(i));
            if let Err(e) = canvas.zoom(panel, true) {
                error!("{}: rebuild failed: {}", panel.name, e);
            }
            canvas.move_image(panel);
        }

        self.render_all();
        self.status.busy(false);
        self.publish_status();
    }

    // === Panel gestures ===

    /// Re-evaluate a panel after its size, zoom or selection changed.
    /// Returns true if any panel was rebuilt.
    pub fn zoom_change(&mut self, id: PanelId) -> bool {
        let Some(image) = self.image.clone() else {
            return false;
        };
        let (outcome, had_selection) = {
            let Some((panel, canvas)) = self.parts(id) else {
                return false;
            };
            let had_selection = panel.selection.is_some();
            let outcome = canvas.calculate(&image, panel, id);
            if outcome == ZoomOutcome::Rerender {
                if let Err(e) = canvas.zoom(panel, false) {
                    error!("{}: rebuild failed: {}", panel.name, e);
                }
            }
            (outcome, had_selection)
        };

        match outcome {
            ZoomOutcome::Rerender => {
                self.render_panel(id);
                true
            }
            ZoomOutcome::Broadcast(crop) => {
                self.broadcast_crop(&image, id, crop);
                // Redraw the source panel too: its overlay is gone
                self.render_panel(id);
                true
            }
            ZoomOutcome::Unchanged => {
                if had_selection {
                    self.render_panel(id);
                }
                false
            }
        }
    }

    fn broadcast_crop(&mut self, image: &Arc<Raster>, from: PanelId, crop: CropBox) {
        let Some(canvases) = self.canvases.as_mut() else {
            return;
        };
        info!("Broadcast crop {:?}", crop);
        let mut rebuilt = Vec::new();
        for (i, (panel, canvas)) in self.panels.iter_mut().zip(canvases.iter_mut()).enumerate() {
            let id = PanelId(i);
            if id == from {
                continue;
            }
            if canvas.apply_crop(image, panel, crop) != ZoomOutcome::Rerender {
                continue;
            }
            match canvas.zoom(panel, false) {
                Ok(true) => rebuilt.push(id),
                Ok(false) => {}
                Err(e) => error!("{}: rebuild failed: {}", panel.name, e),
            }
        }
        for id in rebuilt {
            self.render_panel(id);
        }
    }

    /// Wheel zoom around `at`, in panel coordinates.
    pub fn wheel(&mut self, id: PanelId, wheel: Wheel, at: Point) -> bool {
        if self.image.is_none() {
            return false;
        }
        let step = self.zoom_step;
        let changed = self.panels.get_mut(id.0).is_some_and(|p| p.wheel(wheel, at, step));
        changed && self.zoom_change(id)
    }

    /// Selection drag in progress: show the overlay.
    pub fn drag_selection(&mut self, id: PanelId, rect: PixelRect) {
        if let Some(panel) = self.panels.get_mut(id.0) {
            panel.drag_selection(rect);
            self.render_panel(id);
        }
    }

    /// Selection released: crop to it (or broadcast from the main panel).
    pub fn select(&mut self, id: PanelId, rect: PixelRect) -> bool {
        let Some(panel) = self.panels.get_mut(id.0) else {
            return false;
        };
        panel.commit_selection(rect);
        self.zoom_change(id)
    }

    /// Drag the image by (dx, dy), clamped to the panel.
    pub fn pan(&mut self, id: PanelId, dx: i32, dy: i32) {
        let Some((panel, canvas)) = self.parts(id) else {
            return;
        };
        panel.pan_by(dx, dy);
        canvas.move_image(panel);
        trace!("{}: pan ({}, {})", panel.name, panel.pan.x, panel.pan.y);
        self.render_panel(id);
    }

    pub fn resize(&mut self, id: PanelId, size: Size) -> bool {
        let Some(panel) = self.panels.get_mut(id.0) else {
            return false;
        };
        debug!("{}: resize {}x{}", panel.name, size.width, size.height);
        panel.size = size;
        self.zoom_change(id)
    }

    /// Advance the fit mode and reset the panel.
    pub fn cycle_fit(&mut self, id: PanelId) -> Option<FitMode> {
        let panel = self.panels.get_mut(id.0)?;
        panel.fit = panel.fit.next();
        let fit = panel.fit;
        info!("{}: fit {}", panel.name, fit);
        self.reset(id);
        Some(fit)
    }

    /// Restore crop, zoom, pan and selection for one panel.
    pub fn reset(&mut self, id: PanelId) {
        let Some(panel) = self.panels.get_mut(id.0) else {
            return;
        };
        let Some(canvas) = self.canvases.as_mut().and_then(|c| c.get_mut(id.0)) else {
            panel.reset();
            return;
        };
        if let Err(e) = canvas.reset(panel, None) {
            error!("{}: reset failed: {}", panel.name, e);
        }
        self.render_panel(id);
    }

    pub fn show(&mut self, id: PanelId, visible: bool) {
        let Some(panel) = self.panels.get_mut(id.0) else {
            return;
        };
        panel.visible = visible;
        debug!("{}: visible={}", panel.name, visible);
        if !visible {
            return;
        }
        if let Some((panel, canvas)) = self.parts(id) {
            if let Err(e) = canvas.zoom(panel, true) {
                error!("{}: rebuild failed: {}", panel.name, e);
            }
        }
        self.render_panel(id);
    }

    /// Rotate the active image a quarter turn and hard-reset every panel.
    pub fn rotate(&mut self, rotation: Rotation) -> bool {
        let Some(image) = self.image.as_ref() else {
            return false;
        };
        let rotated = Arc::new(image.rotate(rotation));
        info!("Rotate {:?}: {}x{}", rotation, rotated.width(), rotated.height());
        self.image = Some(Arc::clone(&rotated));

        if let Some(canvases) = self.canvases.as_mut() {
            for (panel, canvas) in self.panels.iter_mut().zip(canvases.iter_mut()) {
                if let Err(e) = canvas.reset(panel, Some(Arc::clone(&rotated))) {
                    error!("{}: reset failed: {}", panel.name, e);
                }
            }
        }
        self.render_all();
        self.publish_status();
        true
    }

    pub fn flush(&mut self) {
        self.cache.flush();
    }

    /// Stop the decode worker. Further navigation returns `Navigation::Closed`.
    pub fn shutdown(&mut self) {
        self.cache.clear_pending();
        self.cache.shutdown();
    }

    // === Output ===

    fn parts(&mut self, id: PanelId) -> Option<(&mut PanelState, &mut CanvasState)> {
        let panel = self.panels.get_mut(id.0)?;
        let canvas = self.canvases.as_mut()?.get_mut(id.0)?;
        Some((panel, canvas))
    }

    fn render_all(&mut self) {
        for i in 0..self.panels.len() {
            self.render_panel(PanelId(i));
        }
    }

    fn render_panel(&mut self, id: PanelId) {
        let Some(panel) = self.panels.get(id.0) else {
            return;
        };
        if !panel.visible {
            return;
        }
        let Some(canvas) = self.canvases.as_ref().and_then(|c| c.get(id.0)) else {
            return;
        };
        let Some(pixels) = canvas.zoomed() else {
            return;
        };
        let frame = Frame {
            panel: id,
            name: &panel.name,
            panel_size: panel.size,
            pixels,
            offset: canvas.draw_offset(panel),
            overlay: panel.overlay,
        };
        if let Err(e) = self.render.render(&frame) {
            error!("{}: render failed: {}", panel.name, e);
        }
    }

    /// Status of the active image, if any.
    pub fn image_status(&self) -> Option<ImageStatus> {
        let browser = self.browser.as_ref()?;
        let image = self.image.as_ref()?;
        let current = self.current.as_ref()?;
        Some(ImageStatus {
            index: browser.current_index().unwrap_or(0),
            total: browser.count(),
            name: current.display_name(),
            folder: browser.source().to_path_buf(),
            width: image.width(),
            height: image.height(),
        })
    }

    fn publish_status(&mut self) {
        if let Some(status) = self.image_status() {
            self.status.status(&status);
        }
    }

    // === Accessors ===

    pub fn panels(&self) -> &[PanelState] {
        &self.panels
    }

    pub fn panel(&self, id: PanelId) -> Option<&PanelState> {
        self.panels.get(id.0)
    }

    /// Look a panel up by name or by index ("main", "aux1", "0", "2").
    pub fn panel_id(&self, key: &str) -> Option<PanelId> {
        if let Some(i) = self.panels.iter().position(|p| p.name == key) {
            return Some(PanelId(i));
        }
        key.parse::<usize>()
            .ok()
            .filter(|&i| i < self.panels.len())
            .map(PanelId)
    }

    pub fn canvas(&self, id: PanelId) -> Option<&CanvasState> {
        self.canvases.as_ref()?.get(id.0)
    }

    pub fn image(&self) -> Option<&Arc<Raster>> {
        self.image.as_ref()
    }

    pub fn current(&self) -> Option<&Locator> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> Option<&Locator> {
        self.pending.as_ref()
    }

    pub fn browser(&self) -> Option<&dyn Browser> {
        self.browser.as_deref()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn prefetch_depth(&self) -> usize {
        self.prefetch_depth
    }
}
