//! Pointer events, pixel edits, fills, selection and color sampling

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::{ActiveStroke, Canvas};
use crate::brush::{preserve_alpha, StrokeContext, StrokeEngine, StrokeStats};
use crate::core::errors::EngineError;
use crate::fill::{bucket_fill, lasso_fill, BucketOptions};
use crate::history::{SelectionOp, StrokeCapture, UndoFrame};
use crate::input::{DeviceKind, Point};
use crate::layer::pixel::{from_f32, to_f32};
use crate::layer::{Color, LayerSnapshot, PixelBuffer, Rect};

/// Source of the eyedropper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    #[default]
    Composite,
    CurrentLayer,
}

/// Restore the alpha of `before` on every pixel that changed.
fn lock_alpha(before: &PixelBuffer, after: &mut PixelBuffer) {
    for (old, new) in before
        .as_raw()
        .chunks_exact(4)
        .zip(after.as_raw_mut().chunks_exact_mut(4))
    {
        if old == new {
            continue;
        }
        let old_px = [old[0], old[1], old[2], old[3]];
        let new_px = [new[0], new[1], new[2], new[3]];
        new.copy_from_slice(&from_f32(preserve_alpha(to_f32(old_px), to_f32(new_px))));
    }
}

impl Canvas {
    /// Pointer down in viewport space.
    pub fn on_press(&mut self, position: Point, pressure: f32, rotation: f32, device: DeviceKind) {
        if self.stroke.is_some() {
            self.cancel_stroke();
        }
        let layer = match self.stack.writable_active() {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!("Press ignored: {}", e);
                return;
            }
        };
        if !position.is_finite() {
            tracing::debug!("Press ignored: non-finite position");
            return;
        }
        let position = self.view.to_canvas(position);
        self.hover = None;

        self.pipeline.set_curve(self.brush.effective_pressure_curve());
        let window = if self.brush.stabilization > 0 {
            self.brush.stabilization
        } else {
            self.config.stabilization
        };
        self.pipeline.set_stabilization(window);
        let sample = self.pipeline.press(position, pressure, rotation, device);
        let phase = self.machine.press(window);
        self.ensure_paper();

        tracing::debug!(
            "Stroke {} started on layer {} ({:?})",
            phase.stroke_id,
            layer,
            self.brush.family
        );
        self.stroke = Some(ActiveStroke {
            stroke_id: phase.stroke_id,
            layer,
            capture: StrokeCapture::new(layer),
            stats: StrokeStats::default(),
        });
        self.with_stroke(|engine, ctx| engine.begin(ctx, sample));
    }

    /// Pointer move in viewport space; hovers when no stroke is active.
    pub fn on_move(&mut self, position: Point, pressure: f32, rotation: f32) {
        if !position.is_finite() {
            return;
        }
        let position = self.view.to_canvas(position);
        if self.stroke.is_none() {
            self.hover = Some(position);
            return;
        }
        if self.machine.motion().is_none() {
            return;
        }
        for sample in self.pipeline.motion(position, pressure, rotation) {
            self.with_stroke(|engine, ctx| engine.stroke_to(ctx, sample));
        }
    }

    /// Pointer up; flushes the smoother and closes the undo frame.
    pub fn on_release(&mut self, position: Point) {
        if self.stroke.is_none() {
            return;
        }
        self.machine.release();
        if position.is_finite() {
            let position = self.view.to_canvas(position);
            for sample in self.pipeline.release(position) {
                self.with_stroke(|engine, ctx| engine.stroke_to(ctx, sample));
            }
        }
        self.finish_stroke();
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// End the stroke in progress without further dabs.
    pub(crate) fn cancel_stroke(&mut self) {
        if self.stroke.is_some() {
            self.machine.release();
            self.finish_stroke();
        }
    }

    fn finish_stroke(&mut self) {
        let Some(stroke) = self.stroke.take() else {
            return;
        };
        self.engine.end();
        self.pipeline.cancel();
        self.machine.finish();

        let ActiveStroke {
            stroke_id,
            layer,
            capture,
            stats,
        } = stroke;
        match capture.into_frame() {
            Some(frame) => {
                tracing::debug!(
                    "Stroke {} finished on layer {}: {} dab(s), dirty {:?}",
                    stroke_id,
                    layer,
                    stats.dabs,
                    stats.dirty
                );
                self.history.push(frame);
                self.capture_timelapse(stroke_id);
            }
            None => tracing::debug!("Stroke {} left no pixels, no undo frame", stroke_id),
        }
    }

    fn capture_timelapse(&mut self, stroke_id: u64) {
        let Some(recorder) = self.timelapse.as_mut() else {
            return;
        };
        let frame = self.compositor.composite(&self.stack, true);
        recorder.submit(stroke_id, frame);
    }

    /// Run `f` with the stroke context borrowed from the canvas fields.
    fn with_stroke<F>(&mut self, f: F)
    where
        F: FnOnce(&mut StrokeEngine, &mut StrokeContext<'_>) -> StrokeStats,
    {
        let Self {
            stack,
            selection,
            paper,
            wet,
            cache,
            tips,
            brush,
            color,
            engine,
            stroke,
            ..
        } = self;
        let (Some(active), Some(paper)) = (stroke.as_mut(), paper.as_ref()) else {
            return;
        };
        let Some(layer) = stack.get_mut(active.layer) else {
            return;
        };
        let mut ctx = StrokeContext {
            image: &mut layer.image,
            alpha_lock: layer.alpha_lock,
            selection: selection.mask(),
            paper,
            wet: Some(wet),
            cache,
            tips,
            brush,
            color: *color,
            capture: &mut active.capture,
        };
        let stats = f(engine, &mut ctx);
        if stats.aborted {
            tracing::debug!("Stroke {} segment cut short by the time budget", active.stroke_id);
        }
        active.stats.merge(&stats);
    }

    /// Apply `f` to the pixels of layer `index` with undo and the alpha lock.
    ///
    /// `f` gets the selection mask and returns the number of changed pixels.
    pub(crate) fn edit_layer<F>(&mut self, index: usize, f: F) -> Result<usize, EngineError>
    where
        F: FnOnce(&mut PixelBuffer, Option<&GrayImage>) -> Result<usize, EngineError>,
    {
        self.cancel_stroke();
        self.stack.check_writable(index)?;
        let layer = self.stack.layer_mut(index)?;
        let before = layer.image.clone();
        let changed = f(&mut layer.image, self.selection.mask())?;
        if layer.alpha_lock {
            lock_alpha(&before, &mut layer.image);
        }
        if changed == 0 || layer.image == before {
            return Ok(0);
        }
        self.history.push(UndoFrame {
            layer: index,
            snapshot: LayerSnapshot::capture(&before),
        });
        Ok(changed)
    }

    /// Like [`Canvas::edit_layer`] on the active layer, absorbing failures.
    fn edit_active<F>(&mut self, f: F) -> usize
    where
        F: FnOnce(&mut PixelBuffer, Option<&GrayImage>) -> Result<usize, EngineError>,
    {
        let result = self
            .stack
            .writable_active()
            .and_then(|index| self.edit_layer(index, f));
        match result {
            Ok(changed) => changed,
            Err(e) => {
                tracing::debug!("Edit ignored: {}", e);
                0
            }
        }
    }

    /// Flood fill at canvas coordinates; returns the number of changed pixels.
    pub fn apply_bucket_fill(&mut self, x: f32, y: f32, color: Color, options: BucketOptions) -> usize {
        if !x.is_finite() || !y.is_finite() {
            return 0;
        }
        let (x, y) = (x.floor() as i64, y.floor() as i64);
        self.edit_active(|image, selection| bucket_fill(image, x, y, color, options, selection))
    }

    /// Fill the polygon `points` (canvas space) on the active layer.
    pub fn apply_lasso_fill(&mut self, points: &[Point], color: Color) -> usize {
        self.edit_active(|image, selection| Ok(lasso_fill(image, points, color, selection)))
    }

    pub fn select_rect(&mut self, rect: Rect, op: SelectionOp) {
        self.selection.select_rect(rect, op);
    }

    /// Returns false when the polygon has fewer than three distinct points.
    pub fn select_lasso(&mut self, points: &[Point], op: SelectionOp) -> bool {
        self.selection.select_lasso(points, op)
    }

    /// Magic wand on the active layer's pixels.
    pub fn select_wand(&mut self, x: f32, y: f32, tolerance: u8, op: SelectionOp) -> Result<(), EngineError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(EngineError::OutOfBounds { x: i64::MIN, y: i64::MIN });
        }
        let index = self.stack.active_index().ok_or(EngineError::NoActiveLayer)?;
        let layer = self.stack.layer(index)?;
        if layer.is_group() {
            return Err(EngineError::NoActiveLayer);
        }
        self.selection
            .select_wand(&layer.image, x.floor() as i64, y.floor() as i64, tolerance, op)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn invert_selection(&mut self) {
        self.selection.invert();
    }

    /// Straight color at canvas coordinates, or `None` outside the canvas.
    pub fn sample_color(&mut self, x: f32, y: f32, mode: SampleMode) -> Option<Color> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (x, y) = (x.floor() as i64, y.floor() as i64);
        let px = match mode {
            SampleMode::Composite => self.compositor.composite(&self.stack, false).get(x, y)?,
            SampleMode::CurrentLayer => {
                let layer = self.stack.active().filter(|l| !l.is_group())?;
                layer.image.get(x, y)?
            }
        };
        Some(Color::from_premultiplied(px))
    }
}
