//! Color values and premultiplied-alpha conversions

use serde::{Deserialize, Serialize};

/// Straight-alpha RGBA color as supplied by the shell (color picker, presets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Premultiplied RGBA8 representation.
    pub fn premultiplied(self) -> [u8; 4] {
        premultiply([self.r, self.g, self.b, self.a])
    }

    /// Straight RGBA normalized to 0..1.
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Straight RGB normalized to 0..1.
    pub fn rgb_f32(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    pub fn from_rgb_f32(rgb: [f32; 3], a: u8) -> Self {
        Self {
            r: unit_to_u8(rgb[0]),
            g: unit_to_u8(rgb[1]),
            b: unit_to_u8(rgb[2]),
            a,
        }
    }

    /// Recover a straight color from a premultiplied pixel.
    pub fn from_premultiplied(p: [u8; 4]) -> Self {
        let s = unpremultiply(p);
        Self::rgba(s[0], s[1], s[2], s[3])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[inline]
fn mul_div_255(a: u32, b: u32) -> u8 {
    ((a * b + 127) / 255).min(255) as u8
}

#[inline]
pub fn unit_to_u8(v: f32) -> u8 {
    if !v.is_finite() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Straight RGBA8 -> premultiplied RGBA8.
#[inline]
pub fn premultiply(p: [u8; 4]) -> [u8; 4] {
    let a = p[3] as u32;
    [
        mul_div_255(p[0] as u32, a),
        mul_div_255(p[1] as u32, a),
        mul_div_255(p[2] as u32, a),
        p[3],
    ]
}

/// Premultiplied RGBA8 -> straight RGBA8.
#[inline]
pub fn unpremultiply(p: [u8; 4]) -> [u8; 4] {
    let a = p[3] as u32;
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((c as u32 * 255 + a / 2) / a).min(255) as u8;
    [un(p[0]), un(p[1]), un(p[2]), p[3]]
}

/// Premultiplied RGBA8 -> premultiplied float 0..1.
#[inline]
pub fn to_f32(p: [u8; 4]) -> [f32; 4] {
    [
        p[0] as f32 / 255.0,
        p[1] as f32 / 255.0,
        p[2] as f32 / 255.0,
        p[3] as f32 / 255.0,
    ]
}

/// Premultiplied float -> premultiplied RGBA8.
///
/// Color channels are clamped to alpha after rounding so the stored pixel
/// always satisfies `c <= a`.
#[inline]
pub fn from_f32(p: [f32; 4]) -> [u8; 4] {
    let a = unit_to_u8(p[3]);
    [
        unit_to_u8(p[0]).min(a),
        unit_to_u8(p[1]).min(a),
        unit_to_u8(p[2]).min(a),
        a,
    ]
}

/// Straight RGB of a premultiplied float pixel (0 for transparent).
#[inline]
pub fn straight_rgb(p: [f32; 4]) -> [f32; 3] {
    if p[3] <= 1e-6 {
        return [0.0; 3];
    }
    let inv = 1.0 / p[3];
    [
        (p[0] * inv).clamp(0.0, 1.0),
        (p[1] * inv).clamp(0.0, 1.0),
        (p[2] * inv).clamp(0.0, 1.0),
    ]
}

/// Linear interpolation of premultiplied float pixels.
#[inline]
pub fn lerp_f32(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}
