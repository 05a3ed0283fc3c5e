//! Pixel buffers, layers and the layer stack

mod blend;
mod buffer;
#[allow(clippy::module_inception)]
mod layer;
pub mod pixel;
mod stack;

pub use blend::{blend_pixel, blend_premul, blend_row, BlendMode, CompositeOp};
pub use buffer::{PixelBuffer, Rect};
pub use layer::{Layer, LayerKind, LayerSnapshot};
pub use pixel::Color;
pub use stack::LayerStack;
