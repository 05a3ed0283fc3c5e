use image::GrayImage;

use super::stamp_extent;
use crate::core::errors::EngineError;
use crate::layer::pixel::Color;
use crate::layer::{CompositeOp, PixelBuffer};

/// Scale a grayscale mask to `size`, center it, tint with source-in.
///
/// Mask values are coverage: 255 paints, 0 leaves the pixel empty.
pub fn synthesize(mask: &GrayImage, size: f32, color: Color) -> Result<PixelBuffer, EngineError> {
    let (mw, mh) = mask.dimensions();
    if mw == 0 || mh == 0 {
        return Err(EngineError::StampSynthesisFailed(
            "imported tip is empty".to_string(),
        ));
    }
    let n = stamp_extent(size);
    let scale = size.max(1.0) / mw.max(mh) as f32;
    let (tw, th) = (mw as f32 * scale, mh as f32 * scale);
    let center = n as f32 / 2.0;
    let (ox, oy) = (center - tw / 2.0, center - th / 2.0);

    let sample = |sx: f32, sy: f32| -> f32 {
        let fx = sx - 0.5;
        let fy = sy - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let (tx, ty) = (fx - x0, fy - y0);
        let texel = |x: f32, y: f32| -> f32 {
            let xi = (x as i64).clamp(0, mw as i64 - 1) as u32;
            let yi = (y as i64).clamp(0, mh as i64 - 1) as u32;
            mask.get_pixel(xi, yi).0[0] as f32 / 255.0
        };
        let top = texel(x0, y0) * (1.0 - tx) + texel(x0 + 1.0, y0) * tx;
        let bottom = texel(x0, y0 + 1.0) * (1.0 - tx) + texel(x0 + 1.0, y0 + 1.0) * tx;
        top * (1.0 - ty) + bottom * ty
    };

    // coverage layer first, then the color goes in with source-in
    let mut coverage = PixelBuffer::new(n, n);
    for y in 0..n {
        for x in 0..n {
            let px = x as f32 + 0.5 - ox;
            let py = y as f32 + 0.5 - oy;
            if px < 0.0 || py < 0.0 || px > tw || py > th {
                continue;
            }
            let a = sample(px / scale, py / scale);
            let v = crate::layer::pixel::unit_to_u8(a);
            coverage.put_pixel(x, y, [v, v, v, v]);
        }
    }
    let tint = color.premultiplied();
    let mut stamp = PixelBuffer::new(n, n);
    for y in 0..n {
        for x in 0..n {
            let dst = coverage.pixel(x, y);
            if dst[3] > 0 {
                stamp.put_pixel(x, y, CompositeOp::SourceIn.apply_u8(dst, tint));
            }
        }
    }
    Ok(stamp)
}
