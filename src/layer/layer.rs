//! A single layer: pixels plus compositing metadata

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

use super::blend::BlendMode;
use super::buffer::PixelBuffer;
use super::pixel::Color;
use crate::core::errors::EngineError;

/// Layer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    #[default]
    Normal,
    Group,
}

/// One entry of the layer stack.
///
/// Groups own an empty (0x0) image; hierarchy is expressed by `depth` only.
#[derive(Debug, Clone)]
pub struct Layer {
    pub image: PixelBuffer,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: f32,
    pub blend: BlendMode,
    /// Disables drawing and deletion
    pub locked: bool,
    /// Drawing restricted to pixels with existing alpha
    pub alpha_lock: bool,
    /// Masked by the nearest non-clipped layer below
    pub clipped: bool,
    pub depth: u32,
    pub expanded: bool,
    /// Excluded from time-lapse capture
    pub private: bool,
}

impl Layer {
    /// Transparent normal layer.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            image: PixelBuffer::new(width, height),
            name: name.into(),
            kind: LayerKind::Normal,
            visible: true,
            opacity: 1.0,
            blend: BlendMode::Normal,
            locked: false,
            alpha_lock: false,
            clipped: false,
            depth: 0,
            expanded: true,
            private: false,
        }
    }

    /// Locked background filled with `color`.
    pub fn background(width: u32, height: u32, color: Color) -> Self {
        let mut layer = Self::new("Background", width, height);
        layer.kind = LayerKind::Background;
        layer.locked = true;
        layer.image.fill(color);
        layer
    }

    pub fn group(name: impl Into<String>) -> Self {
        let mut layer = Self::new(name, 0, 0);
        layer.kind = LayerKind::Group;
        layer
    }

    pub fn is_group(&self) -> bool {
        self.kind == LayerKind::Group
    }

    pub fn is_background(&self) -> bool {
        self.kind == LayerKind::Background
    }

    /// Set opacity, clamped to [0, 1]. Non-finite values are ignored.
    pub fn set_opacity(&mut self, opacity: f32) {
        if opacity.is_finite() {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Compressed copy of the pixels.
    pub fn save_snapshot(&self) -> LayerSnapshot {
        LayerSnapshot::capture(&self.image)
    }

    /// Replace the pixels with a previously saved snapshot.
    pub fn restore_snapshot(&mut self, snapshot: &LayerSnapshot) -> Result<(), EngineError> {
        self.image = snapshot.decompress()?;
        Ok(())
    }
}

/// LZ4-compressed raw premultiplied pixels (size-prepended block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSnapshot {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LayerSnapshot {
    pub fn capture(image: &PixelBuffer) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: compress_prepend_size(image.as_raw()),
        }
    }

    pub fn decompress(&self) -> Result<PixelBuffer, EngineError> {
        let raw = decompress_size_prepended(&self.data)
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        PixelBuffer::from_raw(self.width, self.height, raw).ok_or_else(|| {
            EngineError::Snapshot(format!(
                "decompressed size does not match {}x{}",
                self.width, self.height
            ))
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size of the compressed payload in bytes.
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }
}
