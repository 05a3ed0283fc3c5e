//! Tolerance flood fill (fixed range, 4-connected)

use image::{GrayImage, Luma};

use crate::layer::pixel::{lerp_f32, to_f32, from_f32};
use crate::layer::{Color, PixelBuffer};

/// Whether `px` is within `tolerance` of `seed` on every channel.
#[inline]
fn matches(px: [u8; 4], seed: [u8; 4], tolerance: u8) -> bool {
    px.iter()
        .zip(seed.iter())
        .all(|(a, b)| a.abs_diff(*b) <= tolerance)
}

/// Grow `region` by `radius` pixels (square structuring element) inside `allowed`.
fn dilate(region: &mut [bool], allowed: &[bool], width: usize, height: usize, radius: usize) {
    for _ in 0..radius {
        let prev = region.to_vec();
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if prev[i] || !allowed[i] {
                    continue;
                }
                let y0 = y.saturating_sub(1);
                let y1 = (y + 1).min(height - 1);
                let x0 = x.saturating_sub(1);
                let x1 = (x + 1).min(width - 1);
                let hit = (y0..=y1).any(|ny| (x0..=x1).any(|nx| prev[ny * width + nx]));
                if hit {
                    region[i] = true;
                }
            }
        }
    }
}

/// Pixels reachable from the seed whose color stays within `tolerance` of
/// the seed color (all four premultiplied channels).
///
/// Pixels where `barrier` is 0 are never entered. With `expand > 0`, gaps of
/// up to `2·expand` pixels in the boundary are closed by dilating it before
/// the flood; the region then grows back by `expand` into matching pixels.
///
/// Returns a mask with 255 on filled pixels, or `None` if the seed is outside
/// the image or blocked.
pub fn flood_region(
    image: &PixelBuffer,
    seed_x: u32,
    seed_y: u32,
    tolerance: u8,
    expand: u32,
    barrier: Option<&GrayImage>,
) -> Option<GrayImage> {
    let (width, height) = image.dimensions();
    if seed_x >= width || seed_y >= height {
        return None;
    }
    let (w, h) = (width as usize, height as usize);
    let seed = image.pixel(seed_x, seed_y);

    let mut open: Vec<bool> = image
        .as_raw()
        .chunks_exact(4)
        .map(|p| matches([p[0], p[1], p[2], p[3]], seed, tolerance))
        .collect();
    if let Some(mask) = barrier {
        for (i, flag) in open.iter_mut().enumerate() {
            let (x, y) = ((i % w) as u32, (i / w) as u32);
            if x >= mask.width() || y >= mask.height() || mask.get_pixel(x, y)[0] == 0 {
                *flag = false;
            }
        }
    }
    let matching = open.clone();

    if expand > 0 {
        // dilate the boundary by shrinking the open area
        let mut closed: Vec<bool> = open.iter().map(|o| !o).collect();
        let everywhere = vec![true; w * h];
        dilate(&mut closed, &everywhere, w, h, expand as usize);
        for (o, c) in open.iter_mut().zip(&closed) {
            *o = !c;
        }
    }

    let start = seed_y as usize * w + seed_x as usize;
    if !open[start] {
        if expand == 0 || !matching[start] {
            return None;
        }
        // seed sits in a closed gap; fall back to the plain region
        open.clone_from(&matching);
    }

    let mut filled = vec![false; w * h];
    let mut stack = vec![(seed_x as usize, seed_y as usize)];
    filled[start] = true;
    while let Some((x, y)) = stack.pop() {
        let mut visit = |nx: usize, ny: usize, stack: &mut Vec<(usize, usize)>| {
            let i = ny * w + nx;
            if open[i] && !filled[i] {
                filled[i] = true;
                stack.push((nx, ny));
            }
        };
        if x > 0 {
            visit(x - 1, y, &mut stack);
        }
        if x + 1 < w {
            visit(x + 1, y, &mut stack);
        }
        if y > 0 {
            visit(x, y - 1, &mut stack);
        }
        if y + 1 < h {
            visit(x, y + 1, &mut stack);
        }
    }

    if expand > 0 {
        dilate(&mut filled, &matching, w, h, expand as usize);
    }

    let mut mask = GrayImage::new(width, height);
    for (i, _) in filled.iter().enumerate().filter(|(_, f)| **f) {
        mask.put_pixel((i % w) as u32, (i / w) as u32, Luma([255]));
    }
    Some(mask)
}

/// Paint `color` (alpha forced to 255) wherever `region` is set, blended by
/// the selection coverage. Returns the number of changed pixels.
pub fn paint_region(
    image: &mut PixelBuffer,
    region: &GrayImage,
    color: Color,
    selection: Option<&GrayImage>,
) -> usize {
    let fill = to_f32(color.with_alpha(255).premultiplied());
    let mut changed = 0;
    for (x, y, px) in region.enumerate_pixels() {
        if px[0] == 0 {
            continue;
        }
        let m = selection.map_or(255, |s| {
            if x < s.width() && y < s.height() {
                s.get_pixel(x, y)[0]
            } else {
                0
            }
        });
        let coverage = (px[0] as f32 / 255.0) * (m as f32 / 255.0);
        if coverage <= 0.0 {
            continue;
        }
        let old = image.pixel(x, y);
        let new = if coverage >= 1.0 {
            from_f32(fill)
        } else {
            from_f32(lerp_f32(to_f32(old), fill, coverage))
        };
        if new != old {
            image.put_pixel(x, y, new);
            changed += 1;
        }
    }
    changed
}
