//! Command envelope - the interface between the shell and the canvas
//!
//! Every shell request is one JSON object tagged by `"cmd"`:
//!
//! ```
//! use sutu_raster::commands::Command;
//!
//! let cmd: Command = serde_json::from_str(r#"{ "cmd": "setOpacity", "index": 1, "opacity": 0.5 }"#).unwrap();
//! assert_eq!(cmd, Command::SetOpacity { index: 1, opacity: 0.5 });
//! ```

use serde::{Deserialize, Serialize};

use crate::brush::BrushDescriptor;
use crate::canvas::{Canvas, SampleMode};
use crate::core::brush_model::BrushPreset;
use crate::core::errors::EngineError;
use crate::fill::BucketOptions;
use crate::history::SelectionOp;
use crate::input::{PointerEvent, PointerPhase, Point};
use crate::layer::{BlendMode, Color, Rect};

/// Document information returned after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub layers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    NewCanvas {
        width: u32,
        height: u32,
        #[serde(default = "default_dpi")]
        dpi: u32,
        #[serde(default = "default_background")]
        background: Color,
    },
    ResizeCanvas {
        width: u32,
        height: u32,
    },
    SetBackgroundColor {
        color: Color,
    },

    AddLayer,
    AddGroup,
    RemoveLayer {
        index: usize,
    },
    DuplicateLayer {
        index: usize,
    },
    MoveLayer {
        from: usize,
        to: usize,
        new_depth: u32,
    },
    SetActiveLayer {
        index: usize,
    },
    ToggleVisibility {
        index: usize,
    },
    ToggleLock {
        index: usize,
    },
    ToggleAlphaLock {
        index: usize,
    },
    ToggleClipping {
        index: usize,
    },
    SetOpacity {
        index: usize,
        opacity: f32,
    },
    SetBlendMode {
        index: usize,
        name: String,
    },
    MergeDown {
        index: usize,
    },
    Flatten,
    SetPrivate {
        index: usize,
        private: bool,
    },
    Rename {
        index: usize,
        name: String,
    },
    SetExpanded {
        index: usize,
        expanded: bool,
    },
    Clear {
        index: usize,
    },
    Fill {
        index: usize,
    },

    Undo,
    Redo,

    SelectRect {
        rect: Rect,
        #[serde(default)]
        op: SelectionOp,
    },
    SelectLasso {
        points: Vec<Point>,
        #[serde(default)]
        op: SelectionOp,
    },
    SelectWand {
        x: f32,
        y: f32,
        #[serde(default)]
        tolerance: u8,
        #[serde(default)]
        op: SelectionOp,
    },
    ClearSelection,
    InvertSelection,

    ApplyBucketFill {
        x: f32,
        y: f32,
        color: Color,
        #[serde(default)]
        options: BucketOptions,
    },
    ApplyLassoFill {
        points: Vec<Point>,
        color: Color,
    },
    SampleColor {
        x: f32,
        y: f32,
        #[serde(default)]
        mode: SampleMode,
    },

    SetColor {
        color: Color,
    },
    SetBrush {
        brush: BrushDescriptor,
    },
    LoadPreset {
        preset: BrushPreset,
    },
    SetView {
        offset: Point,
        zoom: f32,
    },
    Pointer {
        event: PointerEvent,
    },
}

fn default_dpi() -> u32 {
    72
}

fn default_background() -> Color {
    Color::WHITE
}

/// Result of a command, tagged by `"kind"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CommandOutcome {
    Done,
    Document(DocumentInfo),
    /// Index of the created, moved or merged layer
    Layer(usize),
    /// New state of a toggled flag
    Flag(bool),
    BlendMode(BlendMode),
    /// Number of changed pixels
    Changed(usize),
    /// Layer restored by undo/redo, if any
    Restored(Option<usize>),
    /// Sampled color, `None` outside the canvas
    Color(Option<Color>),
}

impl Canvas {
    /// Execute one shell command.
    ///
    /// Layer commands report locked or missing layers as errors; fills and
    /// pointer events absorb them and report that nothing changed.
    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome, EngineError> {
        tracing::debug!("Executing {:?}", command);
        let outcome = match command {
            Command::NewCanvas {
                width,
                height,
                dpi,
                background,
            } => {
                self.reset(width, height, dpi, background)?;
                CommandOutcome::Document(self.document_info())
            }
            Command::ResizeCanvas { width, height } => {
                self.resize_canvas(width, height)?;
                CommandOutcome::Document(self.document_info())
            }
            Command::SetBackgroundColor { color } => {
                self.set_background_color(color)?;
                CommandOutcome::Done
            }

            Command::AddLayer => CommandOutcome::Layer(self.add_layer()),
            Command::AddGroup => CommandOutcome::Layer(self.add_group()),
            Command::RemoveLayer { index } => {
                self.remove_layer(index)?;
                CommandOutcome::Done
            }
            Command::DuplicateLayer { index } => CommandOutcome::Layer(self.duplicate_layer(index)?),
            Command::MoveLayer { from, to, new_depth } => {
                self.move_layer(from, to, new_depth)?;
                CommandOutcome::Layer(to)
            }
            Command::SetActiveLayer { index } => {
                self.set_active_layer(index)?;
                CommandOutcome::Layer(index)
            }
            Command::ToggleVisibility { index } => CommandOutcome::Flag(self.toggle_visibility(index)?),
            Command::ToggleLock { index } => CommandOutcome::Flag(self.toggle_lock(index)?),
            Command::ToggleAlphaLock { index } => CommandOutcome::Flag(self.toggle_alpha_lock(index)?),
            Command::ToggleClipping { index } => CommandOutcome::Flag(self.toggle_clipping(index)?),
            Command::SetOpacity { index, opacity } => {
                self.set_layer_opacity(index, opacity)?;
                CommandOutcome::Done
            }
            Command::SetBlendMode { index, name } => CommandOutcome::BlendMode(self.set_blend_mode(index, &name)?),
            Command::MergeDown { index } => CommandOutcome::Layer(self.merge_down(index)?),
            Command::Flatten => {
                self.flatten();
                CommandOutcome::Done
            }
            Command::SetPrivate { index, private } => {
                self.set_private(index, private)?;
                CommandOutcome::Done
            }
            Command::Rename { index, name } => {
                self.rename_layer(index, &name)?;
                CommandOutcome::Done
            }
            Command::SetExpanded { index, expanded } => {
                self.set_expanded(index, expanded)?;
                CommandOutcome::Done
            }
            Command::Clear { index } => CommandOutcome::Changed(self.clear_layer(index)?),
            Command::Fill { index } => CommandOutcome::Changed(self.fill_layer(index)?),

            Command::Undo => CommandOutcome::Restored(self.undo()?),
            Command::Redo => CommandOutcome::Restored(self.redo()?),

            Command::SelectRect { rect, op } => {
                self.select_rect(rect, op);
                CommandOutcome::Done
            }
            Command::SelectLasso { points, op } => CommandOutcome::Flag(self.select_lasso(&points, op)),
            Command::SelectWand { x, y, tolerance, op } => {
                self.select_wand(x, y, tolerance, op)?;
                CommandOutcome::Done
            }
            Command::ClearSelection => {
                self.clear_selection();
                CommandOutcome::Done
            }
            Command::InvertSelection => {
                self.invert_selection();
                CommandOutcome::Done
            }

            Command::ApplyBucketFill { x, y, color, options } => {
                CommandOutcome::Changed(self.apply_bucket_fill(x, y, color, options))
            }
            Command::ApplyLassoFill { points, color } => CommandOutcome::Changed(self.apply_lasso_fill(&points, color)),
            Command::SampleColor { x, y, mode } => CommandOutcome::Color(self.sample_color(x, y, mode)),

            Command::SetColor { color } => {
                self.set_color(color);
                CommandOutcome::Done
            }
            Command::SetBrush { brush } => {
                self.set_brush(brush);
                CommandOutcome::Done
            }
            Command::LoadPreset { preset } => {
                self.set_brush(preset.into_descriptor()?);
                CommandOutcome::Done
            }
            Command::SetView { offset, zoom } => {
                self.set_view(offset, zoom);
                CommandOutcome::Done
            }
            Command::Pointer { event } => {
                match event.phase {
                    PointerPhase::Press => self.on_press(event.position, event.pressure, event.rotation, event.device),
                    PointerPhase::Move => self.on_move(event.position, event.pressure, event.rotation),
                    PointerPhase::Release => self.on_release(event.position),
                }
                CommandOutcome::Done
            }
        };
        Ok(outcome)
    }

    pub fn document_info(&self) -> DocumentInfo {
        DocumentInfo {
            width: self.width(),
            height: self.height(),
            dpi: self.dpi(),
            layers: self.stack().len(),
        }
    }
}
