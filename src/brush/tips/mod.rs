//! Procedural stamp synthesis, one routine per brush family
//!
//! Every routine is a pure function of the descriptor and color: randomness is
//! drawn from an RNG seeded with [`BrushDescriptor::seed`], so equal inputs
//! give bit-identical stamps.

mod airbrush;
mod imported;
mod inking;
mod oil;
mod pencil;
mod watercolor;

pub use airbrush::soft_disk;

use super::{BrushDescriptor, BrushFamily, TipLibrary};
use crate::core::errors::EngineError;
use crate::layer::pixel::{from_f32, Color};
use crate::layer::PixelBuffer;

/// Largest stamp edge produced by synthesis.
pub const MAX_STAMP_SIZE: f32 = 2048.0;

/// Edge length of the square stamp for a brush diameter (1px margin per side).
pub fn stamp_extent(size: f32) -> u32 {
    (size.max(1.0).ceil() as u32 + 2).max(3)
}

/// Build the stamp for `brush` in `color`.
pub fn synthesize(
    brush: &BrushDescriptor,
    color: Color,
    tips: &TipLibrary,
) -> Result<PixelBuffer, EngineError> {
    if !brush.size.is_finite() || brush.size > MAX_STAMP_SIZE {
        return Err(EngineError::StampSynthesisFailed(format!(
            "unsupported size {}",
            brush.size
        )));
    }
    let stamp = match brush.family {
        BrushFamily::Inking => inking::synthesize(brush, color),
        BrushFamily::Pencil => pencil::synthesize(brush, color),
        BrushFamily::Airbrush | BrushFamily::Eraser => {
            airbrush::synthesize(brush.size, brush.hardness, brush.roundness, color)
        }
        BrushFamily::Oil | BrushFamily::Acrylic => oil::synthesize(brush, color),
        BrushFamily::Watercolor => watercolor::synthesize(brush, color),
        BrushFamily::Imported => {
            let name = brush.custom_tip.as_deref().unwrap_or(brush.name.as_str());
            let tip = tips.get(name).ok_or_else(|| {
                EngineError::StampSynthesisFailed(format!("unknown tip '{}'", name))
            })?;
            imported::synthesize(&tip.mask, brush.size, color)?
        }
    };
    Ok(ensure_coverage(stamp, color))
}

/// Color a straight alpha map and store it premultiplied.
fn from_alpha(n: u32, alpha: &[f32], color: Color) -> PixelBuffer {
    let rgb = color.rgb_f32();
    let base_alpha = color.a as f32 / 255.0;
    let mut stamp = PixelBuffer::new(n, n);
    for (i, px) in stamp.as_raw_mut().chunks_exact_mut(4).enumerate() {
        let a = alpha[i].clamp(0.0, 1.0) * base_alpha;
        px.copy_from_slice(&from_f32([rgb[0] * a, rgb[1] * a, rgb[2] * a, a]));
    }
    stamp
}

/// Guarantee at least one painted pixel (1px brushes with sparse noise).
fn ensure_coverage(mut stamp: PixelBuffer, color: Color) -> PixelBuffer {
    if !stamp.has_coverage() && color.a > 0 {
        let c = stamp.width() / 2;
        stamp.put_pixel(c, c, color.premultiplied());
    }
    stamp
}
