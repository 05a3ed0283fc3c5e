//! Layer blend modes and Porter-Duff composition operators
//!
//! All functions work on premultiplied float pixels in 0..1. Separable blend
//! modes follow the W3C compositing formulas:
//! `co = cs·(1 - ab) + cb·(1 - as) + as·ab·B(Cb, Cs)`.

use serde::{Deserialize, Serialize};

use super::pixel::{from_f32, to_f32};

/// Blend modes for layer compositing and dab writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    PlusAdd,
    SoftLight,
    HardLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub const ALL: [BlendMode; 13] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::PlusAdd,
        BlendMode::SoftLight,
        BlendMode::HardLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
    ];

    /// Persisted name (kebab-case).
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::PlusAdd => "plus-add",
            BlendMode::SoftLight => "soft-light",
            BlendMode::HardLight => "hard-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
        }
    }

    /// Parse a mode name; accepts kebab, snake and camel spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let mode = match key.as_str() {
            "normal" | "sourceover" => BlendMode::Normal,
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            "colordodge" => BlendMode::ColorDodge,
            "colorburn" => BlendMode::ColorBurn,
            "plusadd" | "add" | "plus" | "lineardodge" => BlendMode::PlusAdd,
            "softlight" => BlendMode::SoftLight,
            "hardlight" => BlendMode::HardLight,
            "difference" => BlendMode::Difference,
            "exclusion" => BlendMode::Exclusion,
            _ => return None,
        };
        Some(mode)
    }
}

/// Separable blend function `B(cb, cs)` on straight channels.
#[inline]
fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Normal | BlendMode::PlusAdd => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => blend_channel(BlendMode::HardLight, cs, cb),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::ColorDodge => {
            if cb <= 0.0 {
                0.0
            } else if cs >= 1.0 {
                1.0
            } else {
                (cb / (1.0 - cs)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if cb >= 1.0 {
                1.0
            } else if cs <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - cb) / cs).min(1.0)
            }
        }
        BlendMode::HardLight => {
            if cs <= 0.5 {
                cb * 2.0 * cs
            } else {
                let s = 2.0 * cs - 1.0;
                cb + s - cb * s
            }
        }
        BlendMode::SoftLight => {
            if cs <= 0.5 {
                cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
            } else {
                let d = if cb <= 0.25 {
                    ((16.0 * cb - 12.0) * cb + 4.0) * cb
                } else {
                    cb.sqrt()
                };
                cb + (2.0 * cs - 1.0) * (d - cb)
            }
        }
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
    }
}

/// Blend a premultiplied source over a premultiplied backdrop.
///
/// `src` must already carry the layer or dab opacity.
#[inline]
pub fn blend_premul(mode: BlendMode, dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let sa = src[3];
    let da = dst[3];
    if sa <= 0.0 {
        return dst;
    }
    match mode {
        BlendMode::Normal => [
            src[0] + dst[0] * (1.0 - sa),
            src[1] + dst[1] * (1.0 - sa),
            src[2] + dst[2] * (1.0 - sa),
            sa + da * (1.0 - sa),
        ],
        BlendMode::PlusAdd => [
            (src[0] + dst[0]).min(1.0),
            (src[1] + dst[1]).min(1.0),
            (src[2] + dst[2]).min(1.0),
            (sa + da).min(1.0),
        ],
        _ => {
            let out_a = sa + da - sa * da;
            let mut out = [0.0, 0.0, 0.0, out_a];
            for c in 0..3 {
                let cs = src[c] / sa;
                let cb = if da > 0.0 { dst[c] / da } else { 0.0 };
                let b = blend_channel(mode, cb.clamp(0.0, 1.0), cs.clamp(0.0, 1.0));
                out[c] = src[c] * (1.0 - da) + dst[c] * (1.0 - sa) + sa * da * b;
            }
            out
        }
    }
}

/// Blend a premultiplied RGBA8 source pixel into a backdrop pixel at `opacity`.
#[inline]
pub fn blend_pixel(mode: BlendMode, dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    if src[3] == 0 || opacity <= 0.0 {
        return dst;
    }
    let opacity = opacity.min(1.0);
    if mode == BlendMode::Normal && opacity >= 1.0 {
        if src[3] == 255 {
            return src;
        }
        if dst[3] == 0 {
            return src;
        }
    }
    let s = to_f32(src);
    let s = [s[0] * opacity, s[1] * opacity, s[2] * opacity, s[3] * opacity];
    from_f32(blend_premul(mode, to_f32(dst), s))
}

/// Blend a whole row of RGBA8 bytes.
pub fn blend_row(mode: BlendMode, dst: &mut [u8], src: &[u8], opacity: f32) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = blend_pixel(mode, [d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
}

/// Porter-Duff operators used when writing dabs and clipping groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    SourceOver,
    DestinationOut,
    SourceAtop,
    DestinationIn,
    SourceIn,
}

impl CompositeOp {
    /// Apply the operator to premultiplied float pixels.
    #[inline]
    pub fn apply(self, dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
        let sa = src[3];
        let da = dst[3];
        match self {
            CompositeOp::SourceOver => [
                src[0] + dst[0] * (1.0 - sa),
                src[1] + dst[1] * (1.0 - sa),
                src[2] + dst[2] * (1.0 - sa),
                sa + da * (1.0 - sa),
            ],
            CompositeOp::DestinationOut => {
                let k = 1.0 - sa;
                [dst[0] * k, dst[1] * k, dst[2] * k, da * k]
            }
            CompositeOp::SourceAtop => [
                src[0] * da + dst[0] * (1.0 - sa),
                src[1] * da + dst[1] * (1.0 - sa),
                src[2] * da + dst[2] * (1.0 - sa),
                da,
            ],
            CompositeOp::DestinationIn => [dst[0] * sa, dst[1] * sa, dst[2] * sa, da * sa],
            CompositeOp::SourceIn => [src[0] * da, src[1] * da, src[2] * da, sa * da],
        }
    }

    #[inline]
    pub fn apply_u8(self, dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
        from_f32(self.apply(to_f32(dst), to_f32(src)))
    }
}
