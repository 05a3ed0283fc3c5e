//! Flat, ordered layer stack (index 0 = bottom)
//!
//! Groups are marked by `depth`: the children of a group at index `g` are the
//! run `g + 1 .. end` where `end` is the first index whose depth is
//! `<= depth(g)`.

use std::ops::Range;

use super::blend::BlendMode;
use super::layer::{Layer, LayerKind};
use super::pixel::Color;
use crate::core::errors::EngineError;

#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
    active: Option<usize>,
    width: u32,
    height: u32,
    next_layer_number: u32,
    next_group_number: u32,
}

impl LayerStack {
    /// Background plus a working `Layer 1`, which becomes active.
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let mut stack = Self {
            layers: vec![Layer::background(width, height, background)],
            active: Some(0),
            width,
            height,
            next_layer_number: 1,
            next_group_number: 1,
        };
        stack.add_layer();
        stack
    }

    /// Rebuild a stack from persisted layers.
    pub fn from_layers(width: u32, height: u32, layers: Vec<Layer>, active: Option<usize>) -> Self {
        let active = active
            .filter(|&i| i < layers.len())
            .or_else(|| layers.len().checked_sub(1));
        let normal = layers.iter().filter(|l| l.kind == LayerKind::Normal).count() as u32;
        let groups = layers.iter().filter(|l| l.is_group()).count() as u32;
        Self {
            layers,
            active,
            width,
            height,
            next_layer_number: normal + 1,
            next_group_number: groups + 1,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn layer(&self, index: usize) -> Result<&Layer, EngineError> {
        self.layers
            .get(index)
            .ok_or(EngineError::InvalidLayerIndex(index))
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer, EngineError> {
        self.layers
            .get_mut(index)
            .ok_or(EngineError::InvalidLayerIndex(index))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn set_active(&mut self, index: usize) -> Result<(), EngineError> {
        self.layer(index)?;
        self.active = Some(index);
        Ok(())
    }

    pub fn active(&self) -> Option<&Layer> {
        self.active.and_then(|i| self.layers.get(i))
    }

    pub fn has_background(&self) -> bool {
        self.layers.first().is_some_and(Layer::is_background)
    }

    /// Whether pixel writes into `index` are allowed.
    pub fn check_writable(&self, index: usize) -> Result<(), EngineError> {
        let layer = self.layer(index)?;
        if layer.is_group() {
            return Err(EngineError::NoActiveLayer);
        }
        if layer.locked {
            return Err(EngineError::LayerLocked(index));
        }
        if !self.is_effectively_visible(index) {
            return Err(EngineError::LayerHidden(index));
        }
        Ok(())
    }

    /// Index of the active layer if it can take pixel writes.
    pub fn writable_active(&self) -> Result<usize, EngineError> {
        let index = self.active.ok_or(EngineError::NoActiveLayer)?;
        self.check_writable(index)?;
        Ok(index)
    }

    /// Children slice of a group (empty for non-groups).
    pub fn children_range(&self, index: usize) -> Range<usize> {
        let Some(layer) = self.layers.get(index) else {
            return index..index;
        };
        if !layer.is_group() {
            return index + 1..index + 1;
        }
        let end = self.layers[index + 1..]
            .iter()
            .position(|l| l.depth <= layer.depth)
            .map_or(self.layers.len(), |p| index + 1 + p);
        index + 1..end
    }

    /// The layer together with its children.
    fn block_range(&self, index: usize) -> Range<usize> {
        index..self.children_range(index).end
    }

    /// Visible unless the layer or any enclosing group is hidden.
    pub fn is_effectively_visible(&self, index: usize) -> bool {
        let Some(layer) = self.layers.get(index) else {
            return false;
        };
        layer.visible && self.ancestors(index).all(|g| self.layers[g].visible)
    }

    /// Product of the opacities of enclosing groups.
    pub fn group_opacity(&self, index: usize) -> f32 {
        self.ancestors(index).map(|g| self.layers[g].opacity).product()
    }

    /// Indices of enclosing groups, innermost first.
    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let mut depth = self.layers.get(index).map_or(0, |l| l.depth);
        (0..index.min(self.layers.len())).rev().filter(move |&j| {
            let layer = &self.layers[j];
            if depth > 0 && layer.depth < depth && layer.is_group() {
                depth = layer.depth;
                true
            } else {
                false
            }
        })
    }

    /// The layer a clipped layer at `index` clips to: the nearest
    /// non-clipped layer below, reached through clipped siblings of the same
    /// depth. `None` when a group or a depth change comes first.
    pub fn clip_base(&self, index: usize) -> Option<usize> {
        let depth = self.layers.get(index)?.depth;
        for j in (0..index).rev() {
            let layer = &self.layers[j];
            if layer.is_group() || layer.depth != depth {
                return None;
            }
            if !layer.clipped {
                return Some(j);
            }
        }
        None
    }

    /// Insertion point and depth for a new layer relative to the active one.
    fn insertion_point(&self) -> (usize, u32) {
        match self.active.and_then(|i| self.layers.get(i).map(|l| (i, l))) {
            Some((i, layer)) if layer.is_group() && layer.expanded => (i + 1, layer.depth + 1),
            Some((i, layer)) if layer.is_group() => (self.children_range(i).end, layer.depth),
            Some((i, layer)) => (i + 1, layer.depth),
            None => (self.layers.len(), 0),
        }
    }

    fn insert(&mut self, mut layer: Layer) -> usize {
        let (index, depth) = self.insertion_point();
        layer.depth = depth;
        self.layers.insert(index, layer);
        self.active = Some(index);
        index
    }

    /// Add a transparent layer above the active layer and activate it.
    pub fn add_layer(&mut self) -> usize {
        let name = format!("Layer {}", self.next_layer_number);
        self.next_layer_number += 1;
        let index = self.insert(Layer::new(name, self.width, self.height));
        tracing::debug!("Added layer at {}", index);
        index
    }

    /// Add an empty group above the active layer and activate it.
    pub fn add_group(&mut self) -> usize {
        let name = format!("Group {}", self.next_group_number);
        self.next_group_number += 1;
        let index = self.insert(Layer::group(name));
        tracing::debug!("Added group at {}", index);
        index
    }

    /// Remove a layer (and a group's children). Returns the removed layers.
    pub fn remove_layer(&mut self, index: usize) -> Result<Vec<Layer>, EngineError> {
        let layer = self.layer(index)?;
        if layer.is_background() {
            return Err(EngineError::BackgroundLayer("removed"));
        }
        if layer.locked {
            return Err(EngineError::LayerLocked(index));
        }
        let range = self.block_range(index);
        let count = range.len();
        let removed: Vec<Layer> = self.layers.drain(range.clone()).collect();

        self.active = match self.active {
            _ if self.layers.is_empty() => None,
            Some(a) if range.contains(&a) => Some(index.min(self.layers.len() - 1)),
            Some(a) if a >= range.end => Some(a - count),
            other => other,
        };
        tracing::debug!("Removed {} layer(s) at {}", count, index);
        Ok(removed)
    }

    /// Copy a layer (with a group's children) directly above itself.
    pub fn duplicate_layer(&mut self, index: usize) -> Result<usize, EngineError> {
        self.layer(index)?;
        let range = self.block_range(index);
        let mut copies: Vec<Layer> = self.layers[range.clone()].to_vec();
        if let Some(first) = copies.first_mut() {
            first.name = format!("{} copy", first.name);
            if first.is_background() {
                first.kind = LayerKind::Normal;
                first.locked = false;
            }
        }
        let insert_at = range.end;
        self.layers.splice(insert_at..insert_at, copies);
        self.active = Some(insert_at);
        Ok(insert_at)
    }

    /// Move a layer block so that it starts at `to`, re-rooting it at `new_depth`.
    ///
    /// `to` is an index in the stack after the block has been taken out.
    pub fn move_layer(&mut self, from: usize, to: usize, new_depth: u32) -> Result<(), EngineError> {
        let layer = self.layer(from)?;
        if layer.is_background() {
            return Err(EngineError::BackgroundLayer("moved"));
        }
        let range = self.block_range(from);
        let remaining = self.layers.len() - range.len();
        let floor = usize::from(self.has_background());
        if to < floor || to > remaining {
            return Err(EngineError::InvalidMove(format!(
                "target index {} outside {}..={}",
                to, floor, remaining
            )));
        }

        let block: Vec<Layer> = self.layers.drain(range).collect();
        let max_depth = match to.checked_sub(1).and_then(|b| self.layers.get(b)) {
            Some(below) if below.is_group() && below.expanded => below.depth + 1,
            Some(below) => below.depth,
            None => 0,
        };
        if new_depth > max_depth {
            let old_start = from.min(self.layers.len());
            self.layers.splice(old_start..old_start, block);
            return Err(EngineError::InvalidMove(format!(
                "depth {} exceeds {} at index {}",
                new_depth, max_depth, to
            )));
        }

        let base_depth = block.first().map_or(0, |l| l.depth);
        let moved: Vec<Layer> = block
            .into_iter()
            .map(|mut l| {
                l.depth = l.depth - base_depth + new_depth;
                l
            })
            .collect();
        self.layers.splice(to..to, moved);
        self.active = Some(to);
        tracing::debug!("Moved layer {} -> {} (depth {})", from, to, new_depth);
        Ok(())
    }

    pub fn toggle_visibility(&mut self, index: usize) -> Result<bool, EngineError> {
        let layer = self.layer_mut(index)?;
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    pub fn toggle_lock(&mut self, index: usize) -> Result<bool, EngineError> {
        let layer = self.layer_mut(index)?;
        if layer.is_background() {
            return Err(EngineError::BackgroundLayer("unlocked"));
        }
        layer.locked = !layer.locked;
        Ok(layer.locked)
    }

    pub fn toggle_alpha_lock(&mut self, index: usize) -> Result<bool, EngineError> {
        let layer = self.layer_mut(index)?;
        layer.alpha_lock = !layer.alpha_lock;
        Ok(layer.alpha_lock)
    }

    /// Toggle clipping. Backgrounds and groups cannot clip, and clipping is
    /// only turned on when a base exists at the same depth.
    pub fn toggle_clipping(&mut self, index: usize) -> Result<bool, EngineError> {
        let layer = self.layer(index)?;
        if layer.is_background() {
            return Err(EngineError::BackgroundLayer("clipped"));
        }
        if layer.is_group() || (!layer.clipped && self.clip_base(index).is_none()) {
            return Err(EngineError::InvalidMove(format!(
                "layer {} has no base to clip to",
                index
            )));
        }
        let layer = self.layer_mut(index)?;
        layer.clipped = !layer.clipped;
        Ok(layer.clipped)
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> Result<(), EngineError> {
        self.layer_mut(index)?.set_opacity(opacity);
        Ok(())
    }

    pub fn set_blend_mode(&mut self, index: usize, name: &str) -> Result<BlendMode, EngineError> {
        let mode =
            BlendMode::from_name(name).ok_or_else(|| EngineError::UnknownBlendMode(name.into()))?;
        self.layer_mut(index)?.blend = mode;
        Ok(mode)
    }

    pub fn set_private(&mut self, index: usize, private: bool) -> Result<(), EngineError> {
        self.layer_mut(index)?.private = private;
        Ok(())
    }

    pub fn set_expanded(&mut self, index: usize, expanded: bool) -> Result<(), EngineError> {
        self.layer_mut(index)?.expanded = expanded;
        Ok(())
    }

    pub fn rename(&mut self, index: usize, name: &str) -> Result<(), EngineError> {
        self.layer_mut(index)?.name = name.to_string();
        Ok(())
    }

    /// Collapse a range of layers into one layer and activate it.
    pub(crate) fn replace_range(&mut self, range: Range<usize>, layer: Layer) {
        let start = range.start;
        self.layers.splice(range, std::iter::once(layer));
        self.active = Some(start);
    }

    /// Crop or extend every pixel layer, anchored top-left.
    pub fn resize(&mut self, width: u32, height: u32, background: Color) {
        for layer in self.layers.iter_mut().filter(|l| !l.is_group()) {
            let fill = if layer.is_background() {
                background.premultiplied()
            } else {
                [0; 4]
            };
            layer.image = layer.image.resized_canvas(width, height, fill);
        }
        self.width = width;
        self.height = height;
    }
}
