use super::{from_alpha, stamp_extent};
use crate::brush::BrushDescriptor;
use crate::layer::pixel::Color;
use crate::layer::PixelBuffer;
use crate::pattern::noise::{cubic_resample, gaussian_grid, seeded_rng, Edge};

/// Edge of the coarse noise grid that distorts the stain outline.
const DISTORTION_GRID: usize = 8;

/// Stain alpha for a (noise-perturbed) normalized distance `d`.
///
/// `(1 - d²)·0.6 + fringe + granulation`, faded by `1 - d⁸`.
#[inline]
pub fn stain_alpha(d: f32, noise: f32) -> f32 {
    if d >= 1.0 {
        return 0.0;
    }
    let d = d.max(0.0);
    let fringe = (-100.0 * (d - 0.9).powi(2)).exp() * 0.5;
    let granulation = (noise - 0.5) * 0.2;
    let body = (1.0 - d * d) * 0.6;
    ((body + fringe + granulation) * (1.0 - d.powi(8))).clamp(0.0, 1.0)
}

/// Organic stain with a pigment rim.
pub fn synthesize(brush: &BrushDescriptor, color: Color) -> PixelBuffer {
    let n = stamp_extent(brush.size);
    let nu = n as usize;
    let mut rng = seeded_rng(brush.seed());
    let coarse = gaussian_grid(&mut rng, DISTORTION_GRID, DISTORTION_GRID, 0.5, 0.15);
    let noise = cubic_resample(&coarse, DISTORTION_GRID, DISTORTION_GRID, nu, nu, Edge::Clamp);

    let r = brush.size.max(1.0) / 2.0;
    let center = n as f32 / 2.0;
    let mut alpha = vec![0.0f32; nu * nu];
    for y in 0..nu {
        let dy = y as f32 + 0.5 - center;
        for x in 0..nu {
            let dx = x as f32 + 0.5 - center;
            let v = noise[y * nu + x];
            let d = (dx * dx + dy * dy).sqrt() / r + (v - 0.5) * 0.3;
            alpha[y * nu + x] = stain_alpha(d, v);
        }
    }
    from_alpha(n, &alpha, color)
}
