//! Per-family pressure dynamics and the stroke jitter RNG

use rand::rngs::StdRng;
use rand::Rng;

use super::BrushFamily;
use crate::pattern::noise::seeded_rng;

/// How pressure and randomness shape each dab of a family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilyDynamics {
    /// Size-from-pressure strength `k_s`
    pub size_k: f32,
    /// Opacity-from-pressure strength `k_o`
    pub opacity_k: f32,
    /// Uniform ±fraction applied to dab size
    pub size_jitter: f32,
    /// Uniform ±fraction applied to dab opacity
    pub opacity_jitter: f32,
    /// Position jitter as a fraction of the dab width
    pub scatter: f32,
    /// Uniform ±degrees added to the dab angle
    pub rotation_jitter_deg: f32,
    /// Each dab gets a uniformly random rotation
    pub random_rotation: bool,
    /// Rotation follows the stroke tangent
    pub follow_tangent: bool,
}

impl Default for FamilyDynamics {
    fn default() -> Self {
        Self {
            size_k: 0.5,
            opacity_k: 0.5,
            size_jitter: 0.0,
            opacity_jitter: 0.0,
            scatter: 0.0,
            rotation_jitter_deg: 0.0,
            random_rotation: false,
            follow_tangent: false,
        }
    }
}

impl FamilyDynamics {
    pub fn for_family(family: BrushFamily) -> Self {
        let base = Self::default();
        match family {
            BrushFamily::Inking => Self {
                size_k: 0.6,
                opacity_k: 0.0,
                ..base
            },
            BrushFamily::Pencil => Self {
                size_k: 0.2,
                opacity_k: 0.7,
                opacity_jitter: 0.1,
                scatter: 0.05,
                random_rotation: true,
                ..base
            },
            // pressure drives opacity, not size
            BrushFamily::Airbrush => Self {
                size_k: 0.0,
                opacity_k: 1.0,
                ..base
            },
            BrushFamily::Watercolor => Self {
                size_k: 0.3,
                opacity_k: 0.5,
                size_jitter: 0.05,
                ..base
            },
            BrushFamily::Oil | BrushFamily::Acrylic => Self {
                size_k: 0.4,
                opacity_k: 0.3,
                rotation_jitter_deg: 5.0,
                follow_tangent: true,
                ..base
            },
            BrushFamily::Eraser => Self {
                size_k: 0.3,
                opacity_k: 0.5,
                ..base
            },
            BrushFamily::Imported => base,
        }
    }

    /// `width · (1 - k_s·(1 - p²))`, at least 1px.
    #[inline]
    pub fn size(&self, width: f32, pressure: f32) -> f32 {
        let p = pressure.clamp(0.0, 1.0);
        (width * (1.0 - self.size_k * (1.0 - p * p))).max(1.0)
    }

    /// `opacity · (1 - k_o·(1 - p²))`.
    #[inline]
    pub fn opacity(&self, opacity: f32, pressure: f32) -> f32 {
        let p = pressure.clamp(0.0, 1.0);
        (opacity * (1.0 - self.opacity_k * (1.0 - p * p))).clamp(0.0, 1.0)
    }
}

/// Seeded jitter source, reseeded from the brush at every press so equal
/// strokes render equally.
#[derive(Debug, Clone)]
pub struct StrokeRng {
    rng: StdRng,
}

impl StrokeRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: seeded_rng(seed),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = seeded_rng(seed);
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Uniform in `[-amount, amount]`; no draw when `amount` is zero.
    #[inline]
    pub fn symmetric(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        (self.unit() * 2.0 - 1.0) * amount
    }
}

impl Default for StrokeRng {
    fn default() -> Self {
        Self::new(0)
    }
}
