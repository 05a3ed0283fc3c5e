//! Engine configuration injected into the canvas at construction.

use serde::{Deserialize, Serialize};

use super::errors::EngineError;

/// Tunables read by the drawing components.
///
/// Every field has a default so a partial JSON document is enough:
///
/// ```
/// use sutu_raster::core::config::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "undoLimit": 3 }"#).unwrap();
/// assert_eq!(config.undo_limit, 3);
/// assert_eq!(config.paper_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum number of undo frames kept
    pub undo_limit: usize,
    /// Edge length of the tileable paper texture
    pub paper_size: usize,
    /// Seed for the paper texture synthesis
    pub paper_seed: u64,
    /// Wall-clock budget for a single stroke segment (ms)
    pub segment_budget_ms: u64,
    /// Default stabilizer window (0..=50 samples)
    pub stabilization: usize,
    /// Checkerboard tile size in canvas units
    pub checker_tile: u32,
    /// Opacity of the ghost cursor stamp
    pub ghost_cursor_opacity: f32,
    /// Interval between wet/pigment map decay steps (ms)
    pub drying_interval_ms: u64,
    /// Longest edge of a time-lapse frame
    pub timelapse_max_dim: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_limit: 50,
            paper_size: 1024,
            paper_seed: 0x5eed_7a9e,
            segment_budget_ms: 100,
            stabilization: 0,
            checker_tile: 20,
            ghost_cursor_opacity: 0.4,
            drying_interval_ms: 3000,
            timelapse_max_dim: 512,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamp values into their supported ranges.
    pub fn sanitized(mut self) -> Self {
        self.undo_limit = self.undo_limit.max(1);
        self.paper_size = self.paper_size.clamp(16, 4096);
        self.stabilization = self.stabilization.min(50);
        self.checker_tile = self.checker_tile.max(1);
        self.ghost_cursor_opacity = if self.ghost_cursor_opacity.is_finite() {
            self.ghost_cursor_opacity.clamp(0.0, 1.0)
        } else {
            0.4
        };
        self.timelapse_max_dim = self.timelapse_max_dim.max(1);
        self
    }
}
