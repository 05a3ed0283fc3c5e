//! Brush stamp cache and imported tip registry
//!
//! The stamp cache holds a single slot: a new key evicts the previous stamp.
//! Entries are immutable once inserted and handed out as `Arc`s, so a stroke
//! keeps using the same tip even if the slot is replaced mid-stroke.

use std::collections::HashMap;
use std::sync::Arc;

use image::GrayImage;

use super::tips;
use super::{BrushDescriptor, BrushFamily};
use crate::core::errors::EngineError;
use crate::layer::pixel::Color;
use crate::layer::PixelBuffer;

/// Every descriptor value that changes the synthesized stamp, quantized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StampKey {
    family: BrushFamily,
    size_q: u32,
    color: Color,
    hardness_q: u16,
    grain_q: u16,
    roundness_q: u16,
    seed: u64,
    tip: Option<String>,
}

#[inline]
fn quantize(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 1000.0).round() as u16
}

impl StampKey {
    pub fn new(brush: &BrushDescriptor, color: Color) -> Self {
        Self {
            family: brush.family,
            size_q: (brush.size.max(0.0) * 16.0).round() as u32,
            color,
            hardness_q: quantize(brush.hardness),
            grain_q: quantize(brush.grain),
            roundness_q: quantize(brush.roundness),
            seed: brush.seed(),
            tip: if brush.family == BrushFamily::Imported {
                Some(brush.custom_tip.clone().unwrap_or_else(|| brush.name.clone()))
            } else {
                None
            },
        }
    }
}

/// Single-slot cache of the current stamp
#[derive(Debug, Default)]
pub struct StampCache {
    slot: Option<(StampKey, Arc<PixelBuffer>)>,
    hits: u64,
    misses: u64,
}

impl StampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp for `brush` in `color`, synthesized on a key change.
    ///
    /// Synthesis failures fall back to the airbrush soft disk.
    pub fn get(&mut self, brush: &BrushDescriptor, color: Color, tips: &TipLibrary) -> Arc<PixelBuffer> {
        let key = StampKey::new(brush, color);
        if let Some((cached, stamp)) = &self.slot {
            if *cached == key {
                self.hits += 1;
                return Arc::clone(stamp);
            }
        }
        self.misses += 1;
        let stamp = match tips::synthesize(brush, color, tips) {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!("{}; falling back to soft disk", e);
                tips::soft_disk(brush.size.clamp(1.0, tips::MAX_STAMP_SIZE), color)
            }
        };
        tracing::debug!(
            "Synthesized {:?} stamp {}x{}",
            brush.family,
            stamp.width(),
            stamp.height()
        );
        let stamp = Arc::new(stamp);
        self.slot = Some((key, Arc::clone(&stamp)));
        stamp
    }

    /// The cached stamp if it matches, without synthesizing.
    pub fn peek(&self, brush: &BrushDescriptor, color: Color) -> Option<Arc<PixelBuffer>> {
        let key = StampKey::new(brush, color);
        match &self.slot {
            Some((cached, stamp)) if *cached == key => Some(Arc::clone(stamp)),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// An imported grayscale tip
#[derive(Debug, Clone)]
pub struct ImportedTip {
    pub mask: GrayImage,
    /// Native dab spacing as a fraction of size
    pub spacing: f32,
}

/// Registry of imported tips, referenced by name from descriptors
#[derive(Debug, Default, Clone)]
pub struct TipLibrary {
    tips: HashMap<String, ImportedTip>,
}

impl TipLibrary {
    pub fn new() -> Self {
        Self {
            tips: HashMap::new(),
        }
    }

    /// Register a tip; an existing tip with the same name is replaced.
    pub fn insert(&mut self, name: impl Into<String>, mask: GrayImage, spacing: f32) {
        let spacing = if spacing.is_finite() && spacing > 0.0 {
            spacing
        } else {
            0.25
        };
        let name = name.into();
        tracing::debug!(
            "Registered tip '{}' ({}x{}, spacing {:.2})",
            name,
            mask.width(),
            mask.height(),
            spacing
        );
        self.tips.insert(name, ImportedTip { mask, spacing });
    }

    /// Decode an encoded image (PNG) and register its luminance as a tip.
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        bytes: &[u8],
        spacing: f32,
    ) -> Result<(), EngineError> {
        let mask = image::load_from_memory(bytes)?.to_luma8();
        if mask.width() == 0 || mask.height() == 0 {
            return Err(EngineError::StampSynthesisFailed(
                "imported tip is empty".to_string(),
            ));
        }
        self.insert(name, mask, spacing);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ImportedTip> {
        self.tips.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ImportedTip> {
        self.tips.remove(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tips.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }
}
