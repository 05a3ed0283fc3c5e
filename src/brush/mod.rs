//! Brush engine module - descriptors, procedural stamps and the stroke walker

mod cache;
mod dab;
mod dynamics;
mod ellipse;
mod engine;
mod interpolation;
pub mod tips;

pub use cache::{StampCache, StampKey, TipLibrary};
pub use dab::{render_ellipse, render_stamp, Dab, DabPatch, DabTarget, DabWrite};
pub(crate) use dab::preserve_alpha;
pub use dynamics::{FamilyDynamics, StrokeRng};
pub use engine::{StrokeContext, StrokeEngine, StrokeStats};
pub use interpolation::{path_length, quadratic_bezier_points};

use serde::{Deserialize, Serialize};

use crate::layer::BlendMode;

/// Brush families, each with its own stamp synthesis and write strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrushFamily {
    Pencil,
    #[default]
    Inking,
    Airbrush,
    Watercolor,
    Oil,
    Acrylic,
    Eraser,
    Imported,
}

impl BrushFamily {
    pub fn is_oil(self) -> bool {
        matches!(self, BrushFamily::Oil | BrushFamily::Acrylic)
    }
}

/// Pressure response curve
///
/// A cubic Bezier from `(0,0)` to `(1,1)` with two interior control points,
/// evaluated with `t ≈ raw pressure` (x≈t). `Constant` ignores pressure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PressureCurve {
    Bezier { c1: [f32; 2], c2: [f32; 2] },
    Constant,
}

impl Default for PressureCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl PressureCurve {
    /// Identity mapping.
    pub fn linear() -> Self {
        Self::from_points([1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0])
    }

    /// More sensitive at low pressure.
    pub fn soft() -> Self {
        Self::from_points([0.1, 0.6, 0.4, 1.0])
    }

    /// Less sensitive at low pressure.
    pub fn hard() -> Self {
        Self::from_points([0.6, 0.0, 0.9, 0.4])
    }

    /// Build from `[c1x, c1y, c2x, c2y]`; values are clamped to `[0, 1]`.
    pub fn from_points(points: [f32; 4]) -> Self {
        let c = points.map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 });
        Self::Bezier {
            c1: [c[0], c[1]],
            c2: [c[2], c[3]],
        }
    }

    /// Inking curve selected from the brush name (hard, soft, constant).
    pub fn for_brush_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.contains("constant") || name.contains("technical") {
            Some(Self::Constant)
        } else if name.contains("soft") {
            Some(Self::soft())
        } else if name.contains("hard") {
            Some(Self::hard())
        } else {
            None
        }
    }

    /// Apply the curve to a raw pressure value.
    pub fn apply(&self, pressure: f32) -> f32 {
        let t = if pressure.is_finite() {
            pressure.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match self {
            PressureCurve::Constant => 1.0,
            PressureCurve::Bezier { c1, c2 } => {
                let u = 1.0 - t;
                let y = 3.0 * u * u * t * c1[1] + 3.0 * u * t * t * c2[1] + t * t * t;
                y.clamp(0.0, 1.0)
            }
        }
    }
}

/// Full parameter record of a brush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrushDescriptor {
    pub name: String,
    pub family: BrushFamily,
    /// Diameter in pixels (>= 1)
    pub size: f32,
    pub opacity: f32,
    /// Falloff exponent `h` of the soft profile; near 0 is hard, 1 is a cone
    pub hardness: f32,
    /// Minor/major axis ratio of the tip
    pub roundness: f32,
    /// Tip angle in degrees
    pub angle: f32,
    /// Rotate the tip along the stroke tangent
    pub dynamic_angle: bool,
    /// Dab-to-dab distance as a fraction of size
    pub spacing: f32,
    pub grain: f32,
    pub granulation: f32,
    pub diffusion: f32,
    pub pressure_curve: PressureCurve,
    /// Blend mode used when writing dabs into the layer
    pub blend: BlendMode,
    /// Name of an imported tip in the [`TipLibrary`]
    pub custom_tip: Option<String>,
    /// Watercolor brush that only moves existing paint
    pub blend_only: bool,
    /// Stabilizer window (0..=50 samples)
    pub stabilization: usize,
}

impl Default for BrushDescriptor {
    fn default() -> Self {
        Self {
            name: "Ink Pen".to_string(),
            family: BrushFamily::Inking,
            size: 8.0,
            opacity: 1.0,
            hardness: 1.0,
            roundness: 1.0,
            angle: 0.0,
            dynamic_angle: false,
            spacing: 0.1,
            grain: 0.0,
            granulation: 0.0,
            diffusion: 0.0,
            pressure_curve: PressureCurve::linear(),
            blend: BlendMode::Normal,
            custom_tip: None,
            blend_only: false,
            stabilization: 0,
        }
    }
}

impl BrushDescriptor {
    /// Default descriptor for a family.
    pub fn for_family(family: BrushFamily) -> Self {
        let base = Self::default();
        match family {
            BrushFamily::Inking => base,
            BrushFamily::Pencil => Self {
                name: "HB Pencil".into(),
                family,
                size: 6.0,
                opacity: 0.8,
                spacing: 0.15,
                grain: 0.6,
                ..base
            },
            BrushFamily::Airbrush => Self {
                name: "Airbrush".into(),
                family,
                size: 40.0,
                opacity: 0.3,
                hardness: 0.8,
                spacing: 0.05,
                ..base
            },
            BrushFamily::Watercolor => Self {
                name: "Watercolor Round".into(),
                family,
                size: 40.0,
                opacity: 0.5,
                hardness: 0.5,
                spacing: 0.1,
                granulation: 0.4,
                diffusion: 0.3,
                ..base
            },
            BrushFamily::Oil | BrushFamily::Acrylic => Self {
                name: if family == BrushFamily::Oil {
                    "Oil Flat".into()
                } else {
                    "Acrylic Round".into()
                },
                family,
                size: 30.0,
                opacity: 0.9,
                hardness: 0.8,
                spacing: 0.05,
                dynamic_angle: true,
                ..base
            },
            BrushFamily::Eraser => Self {
                name: "Eraser".into(),
                family,
                size: 20.0,
                hardness: 0.05,
                spacing: 0.1,
                ..base
            },
            BrushFamily::Imported => Self {
                name: "Imported Tip".into(),
                family,
                size: 30.0,
                spacing: 0.25,
                ..base
            },
        }
    }

    /// Whether the watercolor write path applies.
    pub fn is_wet(&self) -> bool {
        self.family == BrushFamily::Watercolor || self.diffusion > 0.1
    }

    /// Clamp every parameter into its supported range.
    pub fn sanitized(mut self) -> Self {
        let unit = |v: f32, fallback: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback };
        self.size = if self.size.is_finite() {
            self.size.clamp(1.0, 2048.0)
        } else {
            1.0
        };
        self.opacity = unit(self.opacity, 1.0);
        self.hardness = unit(self.hardness, 1.0);
        self.roundness = if self.roundness.is_finite() {
            self.roundness.clamp(0.05, 1.0)
        } else {
            1.0
        };
        self.angle = if self.angle.is_finite() {
            self.angle.rem_euclid(360.0)
        } else {
            0.0
        };
        self.spacing = if self.spacing.is_finite() {
            self.spacing.clamp(0.01, 10.0)
        } else {
            0.1
        };
        self.grain = unit(self.grain, 0.0);
        self.granulation = unit(self.granulation, 0.0);
        self.diffusion = unit(self.diffusion, 0.0);
        self.stabilization = self.stabilization.min(50);
        self
    }

    /// Seed for stamp synthesis and jitter, derived from name and size.
    pub fn seed(&self) -> u64 {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.size.to_bits().to_le_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Pressure curve after the inking per-name override.
    pub fn effective_pressure_curve(&self) -> PressureCurve {
        if self.family == BrushFamily::Inking {
            if let Some(curve) = PressureCurve::for_brush_name(&self.name) {
                return curve;
            }
        }
        self.pressure_curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_curve_linear() {
        let curve = PressureCurve::linear();
        assert!(curve.apply(0.0).abs() < 1e-6);
        assert!((curve.apply(0.5) - 0.5).abs() < 1e-5);
        assert!((curve.apply(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pressure_curve_soft() {
        let curve = PressureCurve::soft();
        assert!(curve.apply(0.0).abs() < 1e-6);
        assert!((curve.apply(1.0) - 1.0).abs() < 1e-6);
        // Soft curve should give higher output for mid pressure
        assert!(curve.apply(0.5) > 0.5);
    }

    #[test]
    fn test_pressure_curve_hard() {
        let curve = PressureCurve::hard();
        assert!((curve.apply(1.0) - 1.0).abs() < 1e-6);
        // Hard curve should give lower output for mid pressure
        assert!(curve.apply(0.5) < 0.5);
    }

    #[test]
    fn test_pressure_clamping() {
        let curve = PressureCurve::linear();
        assert_eq!(curve.apply(-0.5), 0.0);
        assert!((curve.apply(1.5) - 1.0).abs() < 1e-6);
        assert_eq!(curve.apply(f32::NAN), 0.0);
        assert_eq!(PressureCurve::Constant.apply(0.1), 1.0);
    }

    #[test]
    fn test_inking_curve_by_name() {
        let brush = BrushDescriptor {
            name: "Technical Pen".into(),
            ..BrushDescriptor::default()
        };
        assert_eq!(brush.effective_pressure_curve(), PressureCurve::Constant);
        let pencil = BrushDescriptor {
            name: "Soft pencil".into(),
            ..BrushDescriptor::for_family(BrushFamily::Pencil)
        };
        assert_eq!(pencil.effective_pressure_curve(), pencil.pressure_curve);
    }

    #[test]
    fn test_sanitized_clamps_size() {
        let brush = BrushDescriptor {
            size: 0.0,
            opacity: 7.0,
            angle: -90.0,
            ..BrushDescriptor::default()
        }
        .sanitized();
        assert_eq!(brush.size, 1.0);
        assert_eq!(brush.opacity, 1.0);
        assert_eq!(brush.angle, 270.0);
    }

    #[test]
    fn test_seed_depends_on_name_and_size() {
        let a = BrushDescriptor::default();
        let mut b = a.clone();
        assert_eq!(a.seed(), b.seed());
        b.size = 9.0;
        assert_ne!(a.seed(), b.seed());
    }
}
