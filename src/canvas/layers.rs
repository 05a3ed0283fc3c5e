//! Layer commands, structural edits and undo/redo

use image::GrayImage;

use super::Canvas;
use crate::compositor::blend_atop;
use crate::core::errors::{validate_dimensions, EngineError};
use crate::layer::pixel::{from_f32, lerp_f32, to_f32};
use crate::layer::{blend_row, BlendMode, Color, Layer, PixelBuffer};
use crate::mixing::WetMaps;

/// Set every selected pixel to `px`, feathered by the selection.
fn fill_masked(image: &mut PixelBuffer, px: [u8; 4], selection: Option<&GrayImage>) -> usize {
    let width = image.width();
    let target = to_f32(px);
    let mut changed = 0;
    for (i, chunk) in image.as_raw_mut().chunks_exact_mut(4).enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        let m = selection.map_or(255, |s| s.get_pixel_checked(x, y).map_or(0, |v| v[0]));
        if m == 0 {
            continue;
        }
        let old = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let new = if m == 255 {
            px
        } else {
            from_f32(lerp_f32(to_f32(old), target, m as f32 / 255.0))
        };
        if new != old {
            chunk.copy_from_slice(&new);
            changed += 1;
        }
    }
    changed
}

impl Canvas {
    /// Add a transparent layer above the active one; returns its index.
    pub fn add_layer(&mut self) -> usize {
        self.cancel_stroke();
        let index = self.stack.add_layer();
        self.history.layers_inserted(index, 1);
        index
    }

    pub fn add_group(&mut self) -> usize {
        self.cancel_stroke();
        let index = self.stack.add_group();
        self.history.layers_inserted(index, 1);
        index
    }

    /// Remove a layer, or a group with its children.
    pub fn remove_layer(&mut self, index: usize) -> Result<(), EngineError> {
        self.cancel_stroke();
        let removed = self.stack.remove_layer(index)?;
        self.history.layers_removed(index..index + removed.len());
        Ok(())
    }

    pub fn duplicate_layer(&mut self, index: usize) -> Result<usize, EngineError> {
        self.cancel_stroke();
        let before = self.stack.len();
        let at = self.stack.duplicate_layer(index)?;
        self.history.layers_inserted(at, self.stack.len() - before);
        Ok(at)
    }

    /// Reorder a layer block. Undo history does not survive a move.
    pub fn move_layer(&mut self, from: usize, to: usize, new_depth: u32) -> Result<(), EngineError> {
        self.cancel_stroke();
        self.stack.move_layer(from, to, new_depth)?;
        self.history.clear();
        Ok(())
    }

    pub fn set_active_layer(&mut self, index: usize) -> Result<(), EngineError> {
        self.cancel_stroke();
        self.stack.set_active(index)
    }

    pub fn toggle_visibility(&mut self, index: usize) -> Result<bool, EngineError> {
        self.cancel_stroke();
        self.stack.toggle_visibility(index)
    }

    pub fn toggle_lock(&mut self, index: usize) -> Result<bool, EngineError> {
        self.cancel_stroke();
        self.stack.toggle_lock(index)
    }

    pub fn toggle_alpha_lock(&mut self, index: usize) -> Result<bool, EngineError> {
        self.cancel_stroke();
        self.stack.toggle_alpha_lock(index)
    }

    pub fn toggle_clipping(&mut self, index: usize) -> Result<bool, EngineError> {
        self.stack.toggle_clipping(index)
    }

    pub fn set_layer_opacity(&mut self, index: usize, opacity: f32) -> Result<(), EngineError> {
        self.stack.set_opacity(index, opacity)
    }

    pub fn set_blend_mode(&mut self, index: usize, name: &str) -> Result<BlendMode, EngineError> {
        self.stack.set_blend_mode(index, name)
    }

    pub fn set_private(&mut self, index: usize, private: bool) -> Result<(), EngineError> {
        self.stack.set_private(index, private)
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> Result<(), EngineError> {
        self.stack.rename(index, name)
    }

    pub fn set_expanded(&mut self, index: usize, expanded: bool) -> Result<(), EngineError> {
        self.stack.set_expanded(index, expanded)
    }

    /// Make the selected pixels of layer `index` transparent.
    ///
    /// A no-op under alpha lock, which forbids alpha changes.
    pub fn clear_layer(&mut self, index: usize) -> Result<usize, EngineError> {
        if self.stack.layer(index)?.alpha_lock {
            tracing::debug!("Clear of alpha-locked layer {} ignored", index);
            return Ok(0);
        }
        self.edit_layer(index, |image, selection| Ok(fill_masked(image, [0; 4], selection)))
    }

    /// Fill the selected pixels of layer `index` with the current color.
    pub fn fill_layer(&mut self, index: usize) -> Result<usize, EngineError> {
        let px = self.color.with_alpha(255).premultiplied();
        self.edit_layer(index, |image, selection| Ok(fill_masked(image, px, selection)))
    }

    /// Merge layer `index` into the layer below it; returns the merged index.
    ///
    /// Both must be pixel layers at the same depth. The lower layer's opacity
    /// is baked into its pixels; a hidden upper layer merges as nothing.
    pub fn merge_down(&mut self, index: usize) -> Result<usize, EngineError> {
        self.cancel_stroke();
        let Some(below) = index.checked_sub(1) else {
            return Err(EngineError::InvalidMove("no layer below the bottom layer".into()));
        };
        let upper = self.stack.layer(index)?;
        let lower = self.stack.layer(below)?;
        if upper.is_group() || lower.is_group() {
            return Err(EngineError::InvalidMove("groups cannot be merged".into()));
        }
        if upper.depth != lower.depth {
            return Err(EngineError::InvalidMove(format!(
                "layers {} and {} are in different groups",
                below, index
            )));
        }
        if upper.locked {
            return Err(EngineError::LayerLocked(index));
        }
        if lower.locked && !lower.is_background() {
            return Err(EngineError::LayerLocked(below));
        }

        let mut merged = lower.clone();
        if merged.opacity < 1.0 {
            let opacity = merged.opacity;
            for px in merged.image.as_raw_mut().iter_mut() {
                *px = (*px as f32 * opacity).round() as u8;
            }
            merged.opacity = 1.0;
        }
        if self.stack.is_effectively_visible(index) {
            let (mode, opacity) = (upper.blend, upper.opacity);
            let dst = merged.image.as_raw_mut();
            let src = upper.image.as_raw();
            if upper.clipped {
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    if s[3] == 0 || d[3] == 0 {
                        continue;
                    }
                    let s = to_f32([s[0], s[1], s[2], s[3]]).map(|v| v * opacity);
                    let out = blend_atop(mode, to_f32([d[0], d[1], d[2], d[3]]), s);
                    d.copy_from_slice(&from_f32(out));
                }
            } else {
                blend_row(mode, dst, src, opacity);
            }
        }

        tracing::debug!("Merged layer {} into {}", index, below);
        self.stack.replace_range(below..index + 1, merged);
        self.history.clear();
        Ok(below)
    }

    /// Collapse every visible layer into one, then add a fresh working layer.
    pub fn flatten(&mut self) {
        self.cancel_stroke();
        let (width, height) = (self.width(), self.height());
        let image = self.compositor.composite(&self.stack, false).clone();
        let mut layer = if self.stack.has_background() {
            Layer::background(width, height, self.background)
        } else {
            Layer::new("Layer 1", width, height)
        };
        layer.image = image;
        let len = self.stack.len();
        self.stack.replace_range(0..len, layer);
        self.stack.add_layer();
        self.history.clear();
        tracing::debug!("Flattened {} layer(s)", len);
    }

    /// Repaint the background layer; undoable.
    pub fn set_background_color(&mut self, color: Color) -> Result<(), EngineError> {
        self.cancel_stroke();
        self.background = color;
        if !self.stack.has_background() {
            return Ok(());
        }
        self.history.record(&self.stack, 0)?;
        self.stack.layer_mut(0)?.image.fill(color);
        Ok(())
    }

    /// Crop or extend the canvas, anchored top-left.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        validate_dimensions(width, height)?;
        self.cancel_stroke();
        tracing::info!(
            "Resizing canvas {}x{} -> {}x{}",
            self.width(),
            self.height(),
            width,
            height
        );
        self.stack.resize(width, height, self.background);
        self.wet = WetMaps::new(width, height);
        self.selection.reset(width, height);
        self.history.clear();
        Ok(())
    }

    /// Revert the newest undo frame; returns the restored layer.
    pub fn undo(&mut self) -> Result<Option<usize>, EngineError> {
        self.cancel_stroke();
        self.history.undo(&mut self.stack)
    }

    pub fn redo(&mut self) -> Result<Option<usize>, EngineError> {
        self.cancel_stroke();
        self.history.redo(&mut self.stack)
    }
}
