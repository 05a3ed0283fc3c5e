//! Canvas - the drawing-thread facade holding every component by value.
//!
//! Pointer events, layer commands, selection, fills and painting all go
//! through here; each responsibility lives in its own component and the
//! canvas only passes state between them.

mod drawing;
mod layers;
#[cfg(test)]
mod tests;

pub use drawing::SampleMode;

use std::time::Duration;

use crate::brush::{BrushDescriptor, StampCache, StrokeEngine, StrokeStats, TipLibrary};
use crate::compositor::{Compositor, GhostCursor, ViewTransform};
use crate::core::config::EngineConfig;
use crate::core::errors::{validate_dimensions, EngineError};
use crate::file::{encode_base64, encode_layer_png, image_ref, LayerData, ProjectData, PROJECT_VERSION};
use crate::history::{Selection, StrokeCapture, UndoHistory};
use crate::input::{InputPipeline, Point, StrokeMachine};
use crate::layer::{BlendMode, Color, Layer, LayerStack, PixelBuffer};
use crate::mixing::WetMaps;
use crate::pattern::PaperTexture;
use crate::timelapse::{FrameReport, TimelapseRecorder};

/// Bookkeeping of the stroke in progress
#[derive(Debug)]
struct ActiveStroke {
    stroke_id: u64,
    layer: usize,
    capture: StrokeCapture,
    stats: StrokeStats,
}

#[derive(Debug)]
pub struct Canvas {
    stack: LayerStack,
    dpi: u32,
    background: Color,
    config: EngineConfig,

    pipeline: InputPipeline,
    machine: StrokeMachine,
    engine: StrokeEngine,
    stroke: Option<ActiveStroke>,

    cache: StampCache,
    tips: TipLibrary,
    /// Built on first use, it is expensive at full size
    paper: Option<PaperTexture>,
    wet: WetMaps,
    dry_elapsed: Duration,

    selection: Selection,
    history: UndoHistory,

    compositor: Compositor,
    view: ViewTransform,
    hover: Option<Point>,

    color: Color,
    brush: BrushDescriptor,
    timelapse: Option<TimelapseRecorder>,
}

impl Canvas {
    /// Background layer plus a working `Layer 1`, which is active.
    pub fn new(width: u32, height: u32, dpi: u32, background: Color, config: EngineConfig) -> Result<Self, EngineError> {
        validate_dimensions(width, height)?;
        let config = config.sanitized();
        tracing::info!("Creating canvas: {}x{} @ {}dpi", width, height, dpi);
        Ok(Self {
            stack: LayerStack::new(width, height, background),
            dpi,
            background,
            pipeline: InputPipeline::new(config.stabilization),
            machine: StrokeMachine::new(),
            engine: StrokeEngine::new(config.segment_budget_ms),
            stroke: None,
            cache: StampCache::new(),
            tips: TipLibrary::new(),
            paper: None,
            wet: WetMaps::new(width, height),
            dry_elapsed: Duration::ZERO,
            selection: Selection::new(width, height),
            history: UndoHistory::new(config.undo_limit),
            compositor: Compositor::new(config.checker_tile),
            view: ViewTransform::default(),
            hover: None,
            color: Color::BLACK,
            brush: BrushDescriptor::default(),
            timelapse: None,
            config,
        })
    }

    /// Replace the document with a fresh one, keeping configuration, tools
    /// and the time-lapse recorder.
    pub fn reset(&mut self, width: u32, height: u32, dpi: u32, background: Color) -> Result<(), EngineError> {
        validate_dimensions(width, height)?;
        self.cancel_stroke();
        tracing::info!("Resetting canvas: {}x{} @ {}dpi", width, height, dpi);
        self.stack = LayerStack::new(width, height, background);
        self.dpi = dpi;
        self.background = background;
        self.wet = WetMaps::new(width, height);
        self.dry_elapsed = Duration::ZERO;
        self.selection.reset(width, height);
        self.history.clear();
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.stack.width()
    }

    pub fn height(&self) -> u32 {
        self.stack.height()
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn background_color(&self) -> Color {
        self.background
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn wet_maps(&self) -> &WetMaps {
        &self.wet
    }

    pub fn tips_mut(&mut self) -> &mut TipLibrary {
        &mut self.tips
    }

    pub fn brush(&self) -> &BrushDescriptor {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: BrushDescriptor) {
        self.brush = brush.sanitized();
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_undo_limit(&mut self, limit: usize) {
        self.config.undo_limit = limit.max(1);
        self.history.set_limit(limit);
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn set_view(&mut self, offset: Point, zoom: f32) {
        self.view = ViewTransform::new(offset, zoom);
    }

    pub fn viewport_to_canvas(&self, p: Point) -> Point {
        self.view.to_canvas(p)
    }

    pub fn canvas_to_viewport(&self, p: Point) -> Point {
        self.view.to_screen(p)
    }

    /// Attach a time-lapse recorder; frames are submitted after each stroke.
    pub fn attach_timelapse(&mut self, recorder: TimelapseRecorder) {
        self.timelapse = Some(recorder);
    }

    pub fn detach_timelapse(&mut self) -> Option<TimelapseRecorder> {
        self.timelapse.take()
    }

    pub fn timelapse_reports(&self) -> Vec<FrameReport> {
        self.timelapse
            .as_ref()
            .map_or_else(Vec::new, TimelapseRecorder::drain_reports)
    }

    /// Advance the drying clock; wet and pigment maps decay once per
    /// `drying_interval_ms`. Returns whether anything decayed.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if self.stroke.is_some() {
            // never concurrently with a dab
            return false;
        }
        let interval = Duration::from_millis(self.config.drying_interval_ms.max(1));
        self.dry_elapsed += elapsed;
        let mut changed = false;
        while self.dry_elapsed >= interval {
            if self.wet.is_dry() {
                self.dry_elapsed = Duration::ZERO;
                break;
            }
            self.dry_elapsed -= interval;
            self.wet.decay();
            changed = true;
        }
        changed
    }

    /// Canvas-space composite of every visible layer.
    pub fn composite(&mut self) -> PixelBuffer {
        self.compositor.composite(&self.stack, false).clone()
    }

    /// Render the viewport: layers, checkerboard, border and ghost cursor.
    pub fn paint(&mut self, viewport_width: u32, viewport_height: u32) -> PixelBuffer {
        let stamp = match self.hover {
            Some(_) if self.stroke.is_none() => Some(self.cache.get(&self.brush, self.color, &self.tips)),
            _ => None,
        };
        let ghost = stamp.as_deref().zip(self.hover).map(|(stamp, position)| GhostCursor {
            stamp,
            base_size: self.brush.size.clamp(1.0, crate::brush::tips::MAX_STAMP_SIZE),
            position,
            size: self.brush.size,
            opacity: self.config.ghost_cursor_opacity,
        });
        self.compositor
            .paint(&self.stack, &self.view, viewport_width, viewport_height, ghost)
    }

    /// Pointer left the viewport.
    pub fn clear_hover(&mut self) {
        self.hover = None;
    }

    /// Metadata and PNG-encoded pixels of every layer.
    pub fn to_project_data(&self) -> Result<ProjectData, EngineError> {
        let layers = self
            .stack
            .layers()
            .iter()
            .map(|layer| {
                let (image_ref, image_data) = if layer.is_group() {
                    (None, None)
                } else {
                    let png = encode_layer_png(&layer.image)?;
                    (Some(image_ref(&png)), Some(encode_base64(&png)))
                };
                Ok(LayerData {
                    name: layer.name.clone(),
                    kind: layer.kind,
                    visible: layer.visible,
                    opacity: layer.opacity,
                    blend_mode: layer.blend.name().to_string(),
                    depth: layer.depth,
                    expanded: layer.expanded,
                    locked: layer.locked,
                    alpha_lock: layer.alpha_lock,
                    clipped: layer.clipped,
                    private: layer.private,
                    image_ref,
                    image_data,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        Ok(ProjectData {
            version: PROJECT_VERSION,
            width: self.width(),
            height: self.height(),
            dpi: self.dpi,
            background_color: self.background.to_hex(),
            layers,
            active_layer: self.stack.active_index(),
        })
    }

    /// Rebuild a canvas from persisted state.
    pub fn from_project_data(data: &ProjectData, config: EngineConfig) -> Result<Self, EngineError> {
        let background = Color::from_hex(&data.background_color).unwrap_or(Color::WHITE);
        let mut canvas = Self::new(data.width, data.height, data.dpi, background, config)?;
        let mut layers = Vec::with_capacity(data.layers.len());
        for entry in &data.layers {
            let mut layer = if entry.kind == crate::layer::LayerKind::Group {
                Layer::group(entry.name.clone())
            } else {
                let mut layer = Layer::new(entry.name.clone(), data.width, data.height);
                if let Some(image) = entry.decode_image(data.width, data.height)? {
                    layer.image = image;
                }
                layer
            };
            layer.kind = entry.kind;
            layer.visible = entry.visible;
            layer.set_opacity(entry.opacity);
            layer.blend = BlendMode::from_name(&entry.blend_mode).unwrap_or_else(|| {
                tracing::warn!("Unknown blend mode '{}', using normal", entry.blend_mode);
                BlendMode::Normal
            });
            layer.depth = entry.depth;
            layer.expanded = entry.expanded;
            layer.locked = entry.locked || layer.is_background();
            layer.alpha_lock = entry.alpha_lock;
            layer.clipped = entry.clipped;
            layer.private = entry.private;
            layers.push(layer);
        }
        canvas.stack = LayerStack::from_layers(data.width, data.height, layers, data.active_layer);
        tracing::info!("Loaded project with {} layer(s)", canvas.stack.len());
        Ok(canvas)
    }

    fn ensure_paper(&mut self) {
        if self.paper.is_none() {
            let size = self.config.paper_size;
            tracing::debug!("Synthesizing {}x{} paper texture", size, size);
            self.paper = Some(PaperTexture::generate(size, self.config.paper_seed));
        }
    }
}
