//! Dab rasterization and the gated write into a layer
//!
//! A dab is rendered into a float premultiplied patch clipped to the layer,
//! then written pixel by pixel through [`DabTarget`], which applies alpha lock
//! and the selection mask to every write.

use image::GrayImage;

use super::ellipse::EllipseMask;
use super::tips::stamp_extent;
use crate::layer::pixel::{from_f32, lerp_f32, to_f32, Color};
use crate::layer::{blend_premul, BlendMode, CompositeOp, PixelBuffer, Rect};

/// One placement of the brush tip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dab {
    pub x: f32,
    pub y: f32,
    /// Diameter in pixels
    pub size: f32,
    /// Rotation in radians
    pub angle: f32,
    pub opacity: f32,
    pub pressure: f32,
}

/// Rendered dab: premultiplied float pixels over `rect`
#[derive(Debug, Clone)]
pub struct DabPatch {
    rect: Rect,
    pixels: Vec<[f32; 4]>,
}

impl DabPatch {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Pixel at canvas `(x, y)`; transparent outside the patch.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> [f32; 4] {
        if !self.rect.contains(x, y) {
            return [0.0; 4];
        }
        let w = self.rect.width() as usize;
        self.pixels[(y - self.rect.top) as usize * w + (x - self.rect.left) as usize]
    }

    /// `(x, y, pixel)` for every pixel of the patch, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, [f32; 4])> + '_ {
        let w = self.rect.width().max(1) as i32;
        let rect = self.rect;
        self.pixels
            .iter()
            .enumerate()
            .map(move |(i, p)| (rect.left + i as i32 % w, rect.top + i as i32 / w, *p))
    }

    /// Replace every pixel through `f(x, y, pixel)`.
    pub fn map(&mut self, mut f: impl FnMut(i32, i32, [f32; 4]) -> [f32; 4]) {
        let w = self.rect.width().max(1) as i32;
        let rect = self.rect;
        for (i, p) in self.pixels.iter_mut().enumerate() {
            *p = f(rect.left + i as i32 % w, rect.top + i as i32 / w, *p);
        }
    }

    pub fn has_coverage(&self) -> bool {
        self.pixels.iter().any(|p| p[3] > 0.0)
    }
}

#[inline]
fn stamp_texel(stamp: &PixelBuffer, x: i64, y: i64) -> [f32; 4] {
    stamp.get(x, y).map_or([0.0; 4], to_f32)
}

/// Bilinear lookup between texel centers; transparent outside the stamp.
#[inline]
fn sample_bilinear(stamp: &PixelBuffer, u: f32, v: f32) -> [f32; 4] {
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let p00 = stamp_texel(stamp, x0, y0);
    let p10 = stamp_texel(stamp, x0 + 1, y0);
    let p01 = stamp_texel(stamp, x0, y0 + 1);
    let p11 = stamp_texel(stamp, x0 + 1, y0 + 1);
    let top = lerp_f32(p00, p10, fx);
    let bottom = lerp_f32(p01, p11, fx);
    lerp_f32(top, bottom, fy)
}

/// Blit a stamp synthesized at `base_size`, scaled to the dab size and
/// rotated by the dab angle, into a patch clipped to `bounds`.
pub fn render_stamp(stamp: &PixelBuffer, base_size: f32, dab: &Dab, bounds: Rect) -> Option<DabPatch> {
    if stamp.is_empty() || !dab.x.is_finite() || !dab.y.is_finite() {
        return None;
    }
    let expected = stamp_extent(base_size);
    let fits = stamp.dimensions() == (expected, expected);
    debug_assert!(
        fits,
        "stamp {:?} does not match base size {}",
        stamp.dimensions(),
        base_size
    );
    if !fits {
        tracing::warn!(
            "Skipping dab: stamp {:?} does not match base size {}",
            stamp.dimensions(),
            base_size
        );
        return None;
    }
    let n = stamp.width() as f32;
    let scale = (dab.size / base_size.max(1e-3)).max(1e-3);
    let (sin, cos) = dab.angle.sin_cos();
    let half = n * 0.5 * scale * (cos.abs() + sin.abs());
    let rect = Rect::covering(dab.x - half, dab.y - half, dab.x + half, dab.y + half).intersect(&bounds);
    if rect.is_empty() {
        return None;
    }

    let inv = 1.0 / scale;
    let center = n * 0.5;
    let opacity = dab.opacity.clamp(0.0, 1.0);
    let mut pixels = Vec::with_capacity(rect.width() as usize * rect.height() as usize);
    for y in rect.top..rect.bottom {
        let dy = y as f32 + 0.5 - dab.y;
        for x in rect.left..rect.right {
            let dx = x as f32 + 0.5 - dab.x;
            let u = (dx * cos + dy * sin) * inv + center;
            let v = (-dx * sin + dy * cos) * inv + center;
            let s = sample_bilinear(stamp, u - 0.5, v - 0.5);
            pixels.push([s[0] * opacity, s[1] * opacity, s[2] * opacity, s[3] * opacity]);
        }
    }
    Some(DabPatch { rect, pixels })
}

/// Solid antialiased ellipse straight from the geometry, for small ink dabs.
pub fn render_ellipse(color: Color, roundness: f32, dab: &Dab, bounds: Rect) -> Option<DabPatch> {
    if !dab.x.is_finite() || !dab.y.is_finite() {
        return None;
    }
    let rx = dab.size.max(1.0) / 2.0;
    let mask = EllipseMask::new(rx, rx * roundness.clamp(0.05, 1.0), dab.angle);
    let (hx, hy) = mask.half_extent();
    let rect = Rect::covering(dab.x - hx - 1.0, dab.y - hy - 1.0, dab.x + hx + 1.0, dab.y + hy + 1.0)
        .intersect(&bounds);
    if rect.is_empty() {
        return None;
    }
    let base = to_f32(color.premultiplied());
    let opacity = dab.opacity.clamp(0.0, 1.0);
    let mut row = vec![0.0f32; rect.width() as usize];
    let mut pixels = Vec::with_capacity(rect.width() as usize * rect.height() as usize);
    for y in rect.top..rect.bottom {
        mask.fill_row(&mut row, y as f32, rect.left as f32, dab.x, dab.y);
        pixels.extend(row.iter().map(|&c| {
            let k = c * opacity;
            [base[0] * k, base[1] * k, base[2] * k, base[3] * k]
        }));
    }
    Some(DabPatch { rect, pixels })
}

/// How a dab pixel combines with the layer pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DabWrite {
    /// Blend the source over the layer
    Over(BlendMode),
    /// Destination-out by the source alpha
    Erase,
    /// The source already is the new layer pixel
    Replace,
}

/// Keep the old alpha, rescaling the new color to it.
#[inline]
pub(crate) fn preserve_alpha(old: [f32; 4], new: [f32; 4]) -> [f32; 4] {
    if old[3] <= 0.0 {
        return old;
    }
    if new[3] <= 1e-6 {
        return [0.0, 0.0, 0.0, old[3]];
    }
    let k = old[3] / new[3];
    [new[0] * k, new[1] * k, new[2] * k, old[3]]
}

/// A layer image wrapped with the per-pixel write gates
pub struct DabTarget<'a> {
    image: &'a mut PixelBuffer,
    alpha_lock: bool,
    selection: Option<&'a GrayImage>,
}

impl<'a> DabTarget<'a> {
    pub fn new(image: &'a mut PixelBuffer, alpha_lock: bool, selection: Option<&'a GrayImage>) -> Self {
        Self {
            image,
            alpha_lock,
            selection,
        }
    }

    pub fn image(&self) -> &PixelBuffer {
        &*self.image
    }

    #[inline]
    pub fn read(&self, x: i32, y: i32) -> [f32; 4] {
        self.image
            .get(x as i64, y as i64)
            .map_or([0.0; 4], to_f32)
    }

    /// Selection coverage at a pixel (1.0 without a selection).
    #[inline]
    fn mask_at(&self, x: i32, y: i32) -> f32 {
        match self.selection {
            None => 1.0,
            Some(mask) => {
                if x < 0 || y < 0 || x as u32 >= mask.width() || y as u32 >= mask.height() {
                    return 0.0;
                }
                mask.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
            }
        }
    }

    /// Write one pixel. Returns whether the stored value changed.
    pub fn write(&mut self, x: i32, y: i32, src: [f32; 4], op: DabWrite) -> bool {
        let Some(old_px) = self.image.get(x as i64, y as i64) else {
            return false;
        };
        let m = self.mask_at(x, y);
        if m <= 0.0 {
            return false;
        }
        let old = to_f32(old_px);
        let mut new = match op {
            DabWrite::Over(BlendMode::Normal) if self.alpha_lock => CompositeOp::SourceAtop.apply(old, src),
            DabWrite::Over(mode) => blend_premul(mode, old, src),
            // erasing under alpha lock would change alpha
            DabWrite::Erase if self.alpha_lock => return false,
            DabWrite::Erase => CompositeOp::DestinationOut.apply(old, src),
            DabWrite::Replace => src,
        };
        if self.alpha_lock {
            new = preserve_alpha(old, new);
        }
        if m < 1.0 {
            new = lerp_f32(old, new, m);
        }
        let px = from_f32(new);
        if px == old_px {
            return false;
        }
        self.image.put_pixel(x as u32, y as u32, px);
        true
    }

    /// Write every pixel of a patch. Returns the number of changed pixels.
    pub fn write_patch(&mut self, patch: &DabPatch, op: DabWrite) -> usize {
        let mut changed = 0;
        for (x, y, src) in patch.iter() {
            if src[3] <= 0.0 && op != DabWrite::Replace {
                continue;
            }
            if self.write(x, y, src, op) {
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    fn dab(x: f32, y: f32, size: f32) -> Dab {
        Dab {
            x,
            y,
            size,
            angle: 0.0,
            opacity: 1.0,
            pressure: 1.0,
        }
    }

    #[test]
    fn test_stamp_blit_keeps_center_opaque() {
        let stamp = PixelBuffer::filled(6, 6, [0, 0, 0, 255]);
        let patch = render_stamp(&stamp, 4.0, &dab(10.0, 10.0, 4.0), Rect::new(0, 0, 20, 20)).unwrap();
        let center = patch.get(9, 9);
        assert!((center[3] - 1.0).abs() < 1e-5);
        assert!(patch.get(0, 0)[3] == 0.0);
    }

    #[test]
    fn test_patch_clipped_to_bounds() {
        let stamp = PixelBuffer::filled(6, 6, [0, 0, 0, 255]);
        let bounds = Rect::new(0, 0, 20, 20);
        assert!(render_stamp(&stamp, 4.0, &dab(-50.0, 5.0, 4.0), bounds).is_none());
        let patch = render_stamp(&stamp, 4.0, &dab(0.0, 0.0, 4.0), bounds).unwrap();
        assert_eq!(patch.rect().left, 0);
        assert_eq!(patch.rect().top, 0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "does not match base size"))]
    fn test_mismatched_stamp_is_skipped() {
        let stamp = PixelBuffer::filled(9, 9, [0, 0, 0, 255]);
        assert!(render_stamp(&stamp, 4.0, &dab(5.0, 5.0, 4.0), Rect::new(0, 0, 10, 10)).is_none());
    }

    #[test]
    fn test_small_ellipse_center() {
        let patch = render_ellipse(Color::BLACK, 1.0, &dab(5.0, 5.0, 4.0), Rect::new(0, 0, 10, 10)).unwrap();
        assert_eq!(from_f32(patch.get(5, 5)), [0, 0, 0, 255]);
        assert_eq!(patch.get(5, 9)[3], 0.0);
    }

    #[test]
    fn test_alpha_lock_keeps_transparent_pixels() {
        let mut image = PixelBuffer::new(2, 1);
        image.put_pixel(1, 0, [100, 0, 0, 200]);
        let mut target = DabTarget::new(&mut image, true, None);
        let red = [1.0, 0.0, 0.0, 1.0];
        assert!(!target.write(0, 0, red, DabWrite::Over(BlendMode::Normal)));
        assert!(target.write(1, 0, red, DabWrite::Over(BlendMode::Normal)));
        assert!(!target.write(1, 0, red, DabWrite::Erase));
        assert!(!target.write(0, 0, [0.5, 0.5, 0.5, 0.5], DabWrite::Replace));
        assert_eq!(image.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(image.pixel(1, 0), [200, 0, 0, 200]);
    }

    #[test]
    fn test_selection_blocks_and_feathers() {
        let mut image = PixelBuffer::new(3, 1);
        let mut mask = GrayImage::new(3, 1);
        mask.put_pixel(1, 0, Luma([128]));
        mask.put_pixel(2, 0, Luma([255]));
        let mut target = DabTarget::new(&mut image, false, Some(&mask));
        let black = [0.0, 0.0, 0.0, 1.0];
        for x in 0..3 {
            target.write(x, 0, black, DabWrite::Over(BlendMode::Normal));
        }
        assert_eq!(image.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(image.pixel(1, 0)[3], 128);
        assert_eq!(image.pixel(2, 0)[3], 255);
    }

    #[test]
    fn test_erase_clears() {
        let mut image = PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        let mut target = DabTarget::new(&mut image, false, None);
        assert!(target.write(0, 0, [0.0, 0.0, 0.0, 1.0], DabWrite::Erase));
        assert_eq!(image.pixel(0, 0), [0, 0, 0, 0]);
    }
}
