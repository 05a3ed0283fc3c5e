use rand::Rng;

use super::{from_alpha, stamp_extent};
use crate::brush::ellipse::EllipseMask;
use crate::brush::BrushDescriptor;
use crate::layer::pixel::Color;
use crate::layer::PixelBuffer;
use crate::pattern::noise::{blur, gaussian, normalize, seeded_rng, white_noise, Edge};

const MIN_CHIPS: usize = 12;
const MAX_CHIPS: usize = 47;

/// Lead-chip cloud with a thresholded grain pass.
pub fn synthesize(brush: &BrushDescriptor, color: Color) -> PixelBuffer {
    let n = stamp_extent(brush.size);
    let size = brush.size.max(1.0);
    let half = size / 2.0;
    let center = n as f32 / 2.0;
    let mut rng = seeded_rng(brush.seed());
    let mut alpha = vec![0.0f32; (n * n) as usize];

    let chips = rng.gen_range(MIN_CHIPS..=MAX_CHIPS);
    let sigma = size / 5.0;
    let max_radius = (0.35 * size).max(0.5);
    for _ in 0..chips {
        let cx = (gaussian(&mut rng) * sigma).clamp(-half, half);
        let cy = (gaussian(&mut rng) * sigma).clamp(-half, half);
        let radius = if max_radius > 0.5 {
            rng.gen_range(0.5..max_radius)
        } else {
            0.5
        };
        let strength = (1.0 - (cx * cx + cy * cy).sqrt() / half).max(0.0);
        if strength <= 0.0 {
            continue;
        }
        let mask = EllipseMask::circle(radius);
        let x0 = ((center + cx - radius - 1.0).floor().max(0.0)) as u32;
        let y0 = ((center + cy - radius - 1.0).floor().max(0.0)) as u32;
        let x1 = ((center + cx + radius + 1.0).ceil() as u32).min(n);
        let y1 = ((center + cy + radius + 1.0).ceil() as u32).min(n);
        for y in y0..y1 {
            for x in x0..x1 {
                let cov = mask.coverage(
                    x as f32 + 0.5 - (center + cx),
                    y as f32 + 0.5 - (center + cy),
                );
                let a = &mut alpha[(y * n + x) as usize];
                let add = cov * strength;
                *a += add * (1.0 - *a);
            }
        }
    }

    if brush.grain > 0.0 {
        let mut noise = white_noise(&mut rng, n as usize, n as usize);
        noise = blur(&noise, n as usize, n as usize, 1.0, Edge::Wrap);
        normalize(&mut noise);
        let threshold = 0.6 * brush.grain;
        for (a, v) in alpha.iter_mut().zip(&noise) {
            *a *= ((v - threshold) * 6.0 + 1.0).clamp(0.0, 1.0);
        }
    }

    from_alpha(n, &alpha, color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::BrushFamily;

    #[test]
    fn test_grain_removes_coverage() {
        let smooth = BrushDescriptor {
            size: 24.0,
            grain: 0.0,
            ..BrushDescriptor::for_family(BrushFamily::Pencil)
        };
        let grainy = BrushDescriptor {
            grain: 1.0,
            ..smooth.clone()
        };
        let total = |s: &PixelBuffer| s.as_raw().chunks_exact(4).map(|p| p[3] as u32).sum::<u32>();
        let a = synthesize(&smooth, Color::BLACK);
        let b = synthesize(&grainy, Color::BLACK);
        assert!(total(&b) < total(&a));
    }

    #[test]
    fn test_seed_changes_cloud() {
        let a = BrushDescriptor {
            size: 24.0,
            ..BrushDescriptor::for_family(BrushFamily::Pencil)
        };
        let b = BrushDescriptor {
            name: "6B Pencil".into(),
            ..a.clone()
        };
        assert_ne!(synthesize(&a, Color::BLACK), synthesize(&b, Color::BLACK));
    }
}
