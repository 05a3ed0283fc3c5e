//! Undo/redo snapshots and the selection gate

mod selection;
mod undo;

pub use selection::{Selection, SelectionOp};
pub use undo::{StrokeCapture, UndoFrame, UndoHistory};
