use super::stamp_extent;
use crate::brush::ellipse::EllipseMask;
use crate::brush::BrushDescriptor;
use crate::layer::pixel::{from_f32, Color};
use crate::layer::PixelBuffer;
use crate::pattern::noise::{box_blur_horizontal, gaussian_grid, seeded_rng};

/// Lighting gain applied to the height-map normals, in 8-bit units.
const LIGHT_GAIN: f32 = 120.0;

/// Streaked impasto blob shaded by a top-left light.
pub fn synthesize(brush: &BrushDescriptor, color: Color) -> PixelBuffer {
    let n = stamp_extent(brush.size);
    let nu = n as usize;
    let mut rng = seeded_rng(brush.seed());

    let noise = gaussian_grid(&mut rng, nu, nu, 0.5, 0.15);
    let streak_len = ((brush.size / 3.0).round() as usize).max(1);
    let mut height = box_blur_horizontal(&noise, nu, nu, streak_len);

    let rx = brush.size.max(1.0) / 2.0;
    let mask = EllipseMask::new(rx, rx * 0.8 * brush.roundness, 0.0);
    let center = n as f32 / 2.0;
    let mut alpha = vec![0.0f32; nu * nu];
    for (y, row) in alpha.chunks_exact_mut(nu).enumerate() {
        mask.fill_row(row, y as f32, 0.0, center, center);
    }
    for (h, a) in height.iter_mut().zip(&alpha) {
        *h = (*h * a).clamp(0.0, 1.0);
    }

    let at = |x: i64, y: i64| -> f32 {
        let xi = x.clamp(0, nu as i64 - 1) as usize;
        let yi = y.clamp(0, nu as i64 - 1) as usize;
        height[yi * nu + xi]
    };
    let body = color.rgb_f32();
    let base_alpha = color.a as f32 / 255.0;
    let mut stamp = PixelBuffer::new(n, n);
    for y in 0..nu {
        for x in 0..nu {
            let a = alpha[y * nu + x] * base_alpha;
            if a <= 0.0 {
                continue;
            }
            let (xi, yi) = (x as i64, y as i64);
            let gx = (at(xi + 1, yi) - at(xi - 1, yi)) * 0.5;
            let gy = (at(xi, yi + 1) - at(xi, yi - 1)) * 0.5;
            // light from the top-left: surfaces facing up-left brighten
            let light = (gx + gy) * LIGHT_GAIN / 255.0;
            let shaded = body.map(|c| (c + light).clamp(0.0, 1.0));
            stamp.put_pixel(
                x as u32,
                y as u32,
                from_f32([shaded[0] * a, shaded[1] * a, shaded[2] * a, a]),
            );
        }
    }
    stamp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::BrushFamily;

    #[test]
    fn test_impasto_is_shaded() {
        let brush = BrushDescriptor {
            size: 32.0,
            ..BrushDescriptor::for_family(BrushFamily::Oil)
        };
        let stamp = synthesize(&brush, Color::rgb(128, 128, 128));
        let mut distinct = std::collections::HashSet::new();
        for y in 8..26 {
            for x in 8..26 {
                let p = stamp.pixel(x, y);
                if p[3] == 255 {
                    distinct.insert(p[0]);
                }
            }
        }
        assert!(distinct.len() > 3);
    }

    #[test]
    fn test_blob_is_squashed() {
        let brush = BrushDescriptor {
            size: 32.0,
            ..BrushDescriptor::for_family(BrushFamily::Oil)
        };
        let stamp = synthesize(&brush, Color::BLACK);
        // 0.8 * 16 = 12.8px vertical radius
        assert_eq!(stamp.pixel(17, 2)[3], 0);
        assert_eq!(stamp.pixel(2, 17)[3], 255);
    }
}
