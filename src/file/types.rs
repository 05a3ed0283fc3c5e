//! Persisted project records exchanged with the project saver

use serde::{Deserialize, Serialize};

use crate::layer::LayerKind;

/// Current layout version of [`ProjectData`]
pub const PROJECT_VERSION: u32 = 1;

/// One layer's metadata plus its pixels as a PNG stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerData {
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: f32, // 0.0 - 1.0
    pub blend_mode: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default = "default_true")]
    pub expanded: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub alpha_lock: bool,
    #[serde(default)]
    pub clipped: bool,
    #[serde(default)]
    pub private: bool,
    /// SHA-256 (hex) of the PNG bytes; `None` for groups
    pub image_ref: Option<String>,
    /// Base64-encoded straight-alpha PNG; `None` for groups
    pub image_data: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Complete canvas state for save/load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    #[serde(default = "default_version")]
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    /// `#rrggbb` or `#rrggbbaa`
    pub background_color: String,
    pub layers: Vec<LayerData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_layer: Option<usize>,
}

fn default_version() -> u32 {
    PROJECT_VERSION
}
