use super::{from_alpha, stamp_extent};
use crate::brush::ellipse::EllipseMask;
use crate::brush::BrushDescriptor;
use crate::layer::pixel::Color;
use crate::layer::PixelBuffer;

/// Opaque antialiased ellipse `size x size·roundness`, no grain.
pub fn synthesize(brush: &BrushDescriptor, color: Color) -> PixelBuffer {
    let n = stamp_extent(brush.size);
    let rx = brush.size / 2.0;
    let mask = EllipseMask::new(rx, rx * brush.roundness, 0.0);
    let center = n as f32 / 2.0;
    let mut alpha = vec![0.0f32; (n * n) as usize];
    for (y, row) in alpha.chunks_exact_mut(n as usize).enumerate() {
        mask.fill_row(row, y as f32, 0.0, center, center);
    }
    from_alpha(n, &alpha, color)
}
