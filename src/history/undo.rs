//! Per-layer undo/redo of pixel snapshots

use std::collections::VecDeque;

use crate::core::errors::EngineError;
use crate::layer::{LayerSnapshot, LayerStack, PixelBuffer};

/// Pixels of one layer before a write
#[derive(Debug, Clone)]
pub struct UndoFrame {
    pub layer: usize,
    pub snapshot: LayerSnapshot,
}

/// Lazily captured "before" state of the stroke's target layer.
///
/// The snapshot is only taken when the first dab reaches the layer, and a
/// frame is only produced once some pixel actually changed, so strokes
/// blocked by the selection or the alpha lock leave history untouched.
#[derive(Debug, Default)]
pub struct StrokeCapture {
    layer: usize,
    snapshot: Option<LayerSnapshot>,
    changed: bool,
}

impl StrokeCapture {
    pub fn new(layer: usize) -> Self {
        Self {
            layer,
            snapshot: None,
            changed: false,
        }
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Snapshot `image` unless already captured.
    pub fn ensure(&mut self, image: &PixelBuffer) {
        if self.snapshot.is_none() {
            self.snapshot = Some(LayerSnapshot::capture(image));
        }
    }

    pub fn is_captured(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Record that a write after `ensure` changed the layer.
    pub fn mark_changed(&mut self) {
        self.changed = self.snapshot.is_some();
    }

    pub fn has_changes(&self) -> bool {
        self.changed
    }

    /// The frame to push, if the layer changed since the capture.
    pub fn into_frame(self) -> Option<UndoFrame> {
        if !self.changed {
            return None;
        }
        let layer = self.layer;
        self.snapshot.map(|snapshot| UndoFrame { layer, snapshot })
    }
}

/// Bounded LIFO of undo frames plus the redo stack.
#[derive(Debug)]
pub struct UndoHistory {
    undo: VecDeque<UndoFrame>,
    redo: Vec<UndoFrame>,
    limit: usize,
}

impl UndoHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the bound, dropping the oldest frames if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Record a frame; the oldest frame is dropped past the limit and the
    /// redo stack is cleared.
    pub fn push(&mut self, frame: UndoFrame) {
        self.undo.push_back(frame);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
            tracing::debug!("Undo limit {} reached, dropped oldest frame", self.limit);
        }
        self.redo.clear();
    }

    /// Snapshot layer `index` of `stack` and push it.
    pub fn record(&mut self, stack: &LayerStack, index: usize) -> Result<(), EngineError> {
        let layer = stack.layer(index)?;
        self.push(UndoFrame {
            layer: index,
            snapshot: layer.save_snapshot(),
        });
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Pop the newest frame, saving the current pixels for redo.
    ///
    /// Returns the restored layer index, or `None` when there is nothing to
    /// undo. Frames whose layer no longer exists are discarded.
    pub fn undo(&mut self, stack: &mut LayerStack) -> Result<Option<usize>, EngineError> {
        while let Some(frame) = self.undo.pop_back() {
            if let Some(inverse) = Self::swap(stack, &frame)? {
                self.redo.push(inverse);
                return Ok(Some(frame.layer));
            }
            tracing::warn!("Skipping undo frame for missing layer {}", frame.layer);
        }
        Ok(None)
    }

    pub fn redo(&mut self, stack: &mut LayerStack) -> Result<Option<usize>, EngineError> {
        while let Some(frame) = self.redo.pop() {
            if let Some(inverse) = Self::swap(stack, &frame)? {
                self.undo.push_back(inverse);
                return Ok(Some(frame.layer));
            }
            tracing::warn!("Skipping redo frame for missing layer {}", frame.layer);
        }
        Ok(None)
    }

    /// Restore `frame` and return the frame that reverts the restore.
    fn swap(stack: &mut LayerStack, frame: &UndoFrame) -> Result<Option<UndoFrame>, EngineError> {
        let Some(layer) = stack.get_mut(frame.layer) else {
            return Ok(None);
        };
        if layer.is_group() || layer.image.dimensions() != frame.snapshot.dimensions() {
            return Ok(None);
        }
        let inverse = UndoFrame {
            layer: frame.layer,
            snapshot: layer.save_snapshot(),
        };
        layer.restore_snapshot(&frame.snapshot)?;
        Ok(Some(inverse))
    }

    /// Shift frame indices after `count` layers were inserted at `at`.
    pub fn layers_inserted(&mut self, at: usize, count: usize) {
        for frame in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            if frame.layer >= at {
                frame.layer += count;
            }
        }
    }

    /// Drop frames of removed layers and shift the ones above.
    pub fn layers_removed(&mut self, range: std::ops::Range<usize>) {
        let count = range.len();
        let remap = |frame: &mut UndoFrame| {
            if range.contains(&frame.layer) {
                false
            } else {
                if frame.layer >= range.end {
                    frame.layer -= count;
                }
                true
            }
        };
        self.undo.retain_mut(remap);
        self.redo.retain_mut(remap);
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layer::Color;

    fn paint(stack: &mut LayerStack, value: u8) {
        stack.get_mut(1).unwrap().image.fill_premultiplied([value, 0, 0, 255]);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut stack = LayerStack::new(4, 4, Color::WHITE);
        let mut history = UndoHistory::new(10);
        history.record(&stack, 1).unwrap();
        paint(&mut stack, 50);
        let after = stack.get(1).unwrap().image.clone();

        assert_eq!(history.undo(&mut stack).unwrap(), Some(1));
        assert!(!stack.get(1).unwrap().image.has_coverage());
        assert_eq!(history.redo(&mut stack).unwrap(), Some(1));
        assert_eq!(stack.get(1).unwrap().image, after);
        assert_eq!(history.redo(&mut stack).unwrap(), None);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut stack = LayerStack::new(2, 2, Color::WHITE);
        let mut history = UndoHistory::new(3);
        for v in 1..=5 {
            history.record(&stack, 1).unwrap();
            paint(&mut stack, v * 10);
        }
        assert_eq!(history.undo_len(), 3);
        for _ in 0..3 {
            assert!(history.undo(&mut stack).unwrap().is_some());
        }
        // back to the state after the second write
        assert_eq!(stack.get(1).unwrap().image.pixel(0, 0)[0], 20);
        assert_eq!(history.undo(&mut stack).unwrap(), None);
    }

    #[test]
    fn test_new_push_clears_redo() {
        let mut stack = LayerStack::new(2, 2, Color::WHITE);
        let mut history = UndoHistory::new(5);
        history.record(&stack, 1).unwrap();
        paint(&mut stack, 10);
        history.undo(&mut stack).unwrap();
        assert!(history.can_redo());
        history.record(&stack, 1).unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_removed_layer_frames_are_skipped() {
        let mut stack = LayerStack::new(2, 2, Color::WHITE);
        let mut history = UndoHistory::new(5);
        history.record(&stack, 1).unwrap();
        let top = stack.add_layer();
        history.layers_inserted(top, 1);
        history.record(&stack, top).unwrap();
        stack.remove_layer(top).unwrap();
        history.layers_removed(top..top + 1);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo(&mut stack).unwrap(), Some(1));
    }

    #[test]
    fn test_capture_is_lazy() {
        let image = PixelBuffer::new(2, 2);
        let capture = StrokeCapture::new(3);
        assert!(capture.into_frame().is_none());
        let mut capture = StrokeCapture::new(3);
        capture.ensure(&image);
        capture.ensure(&PixelBuffer::filled(2, 2, [9, 9, 9, 9]));
        assert!(capture.is_captured());
        capture.mark_changed();
        let frame = capture.into_frame().unwrap();
        assert_eq!(frame.layer, 3);
        assert_eq!(frame.snapshot.decompress().unwrap(), image);
    }

    #[test]
    fn test_capture_without_changes_yields_no_frame() {
        let image = PixelBuffer::new(2, 2);
        let mut capture = StrokeCapture::new(1);
        capture.mark_changed();
        assert!(!capture.has_changes());
        capture.ensure(&image);
        assert!(capture.into_frame().is_none());
    }
}
