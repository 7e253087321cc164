//! User settings persisted as `tripane.json`.
//!
//! Every field has a default, so a partial file only overrides what it names.
//! A missing file means defaults; a malformed one is reported and ignored.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::browser::default_extensions;
use crate::core::cache::DEFAULT_CAPACITY;
use crate::view::geometry::Size;
use crate::view::panel::{FitMode, PanelState, ZOOM_STEP};

/// One display panel. The first entry is the main panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub name: String,
    pub fit: FitMode,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            name: "panel".to_string(),
            fit: FitMode::FitAll,
            width: 400,
            height: 300,
            visible: true,
        }
    }
}

impl PanelConfig {
    fn new(name: &str, fit: FitMode, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            fit,
            width,
            height,
            visible: true,
        }
    }

    pub fn to_state(&self) -> PanelState {
        let mut state = PanelState::new(&self.name, self.fit, Size::new(self.width, self.height));
        state.visible = self.visible;
        state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Adjacent images decoded ahead in the browsing direction.
    pub prefetch_depth: usize,
    pub cache_capacity: usize,
    /// Wheel zoom factor per notch.
    pub zoom_step: f64,
    /// Browsable suffixes, case-insensitive.
    pub extensions: Vec<String>,
    pub panels: Vec<PanelConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefetch_depth: 1,
            cache_capacity: DEFAULT_CAPACITY,
            zoom_step: ZOOM_STEP,
            extensions: default_extensions(),
            panels: vec![
                PanelConfig::new("main", FitMode::FitAll, 800, 600),
                PanelConfig::new("aux1", FitMode::FitHeight, 400, 300),
                PanelConfig::new("aux2", FitMode::FitWidth, 400, 300),
            ],
        }
    }
}

impl Settings {
    /// Load from `path`, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Settings loaded from {}", path.display());
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Repair values the viewer cannot work with.
    pub fn sanitized(mut self) -> Self {
        if self.panels.is_empty() {
            warn!("Settings define no panels, using defaults");
            self.panels = Self::default().panels;
        }
        if self.cache_capacity == 0 {
            self.cache_capacity = 1;
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 1.0) {
            self.zoom_step = ZOOM_STEP;
        }
        if self.extensions.is_empty() {
            self.extensions = default_extensions();
        }
        self
    }

    pub fn panel_states(&self) -> Vec<PanelState> {
        self.panels.iter().map(PanelConfig::to_state).collect()
    }
}
