use super::{from_alpha, stamp_extent};
use crate::layer::pixel::Color;
use crate::layer::PixelBuffer;

/// Radial profile `1 - (d/r)^(1/h)` with `h = hardness` in (0, 1].
///
/// `h = 1` is a linear cone; small `h` approaches a hard disk.
#[inline]
pub fn profile(d_over_r: f32, hardness: f32) -> f32 {
    if d_over_r >= 1.0 {
        return 0.0;
    }
    let h = hardness.clamp(0.01, 1.0);
    (1.0 - d_over_r.max(0.0).powf(1.0 / h)).clamp(0.0, 1.0)
}

pub fn synthesize(size: f32, hardness: f32, roundness: f32, color: Color) -> PixelBuffer {
    let n = stamp_extent(size);
    let r = size.max(1.0) / 2.0;
    let yscale = 1.0 / roundness.clamp(0.05, 1.0);
    let center = n as f32 / 2.0;
    let mut alpha = vec![0.0f32; (n * n) as usize];
    for y in 0..n {
        let dy = (y as f32 + 0.5 - center) * yscale;
        for x in 0..n {
            let dx = x as f32 + 0.5 - center;
            let d = (dx * dx + dy * dy).sqrt();
            // 1px antialiased rim on top of the profile
            let rim = (r - d + 0.5).clamp(0.0, 1.0);
            alpha[(y * n + x) as usize] = profile(d / (r + 0.5), hardness) * rim;
        }
    }
    from_alpha(n, &alpha, color)
}

/// Fallback tip used when a family's synthesis fails.
pub fn soft_disk(size: f32, color: Color) -> PixelBuffer {
    synthesize(size, 0.5, 1.0, color)
}
