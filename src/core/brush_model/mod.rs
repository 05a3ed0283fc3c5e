//! Brush preset contract as handed over by the preset loader.

use serde::{Deserialize, Serialize};

use crate::brush::{BrushDescriptor, BrushFamily, PressureCurve};
use crate::core::errors::EngineError;
use crate::layer::BlendMode;

/// Stabilizer window reached at `smoothing = 1`.
pub const MAX_SMOOTHING_WINDOW: f32 = 50.0;

/// Raw preset mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrushPreset {
    #[serde(default)]
    pub name: Option<String>,
    pub family: BrushFamily,
    pub size: u32,
    pub opacity: f32,
    pub hardness: f32,
    #[serde(default)]
    pub smoothing: f32,
    #[serde(default = "default_blend")]
    pub blend: String,
    #[serde(default)]
    pub grain: f32,
    #[serde(default)]
    pub granulation: f32,
    #[serde(default)]
    pub diffusion: f32,
    #[serde(default)]
    pub spacing: Option<f32>,
    #[serde(default)]
    pub roundness: Option<f32>,
    #[serde(default)]
    pub angle: Option<f32>,
    #[serde(default)]
    pub dynamic_angle: Option<bool>,
    #[serde(default, alias = "pressure_curve")]
    pub pressure_curve: Option<[f32; 4]>,
    #[serde(default)]
    pub custom_tip: Option<String>,
    #[serde(default)]
    pub blend_only: bool,
}

fn default_blend() -> String {
    "normal".to_string()
}

fn check_unit(name: &str, value: f32) -> Result<(), EngineError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(EngineError::InvalidPreset(format!("{} must be in [0, 1], got {}", name, value)));
    }
    Ok(())
}

impl BrushPreset {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.size == 0 {
            return Err(EngineError::InvalidPreset("size must be at least 1".to_string()));
        }
        check_unit("opacity", self.opacity)?;
        check_unit("hardness", self.hardness)?;
        check_unit("smoothing", self.smoothing)?;
        check_unit("grain", self.grain)?;
        check_unit("granulation", self.granulation)?;
        check_unit("diffusion", self.diffusion)?;
        if let Some(spacing) = self.spacing {
            if !spacing.is_finite() || spacing <= 0.0 {
                return Err(EngineError::InvalidPreset(format!("spacing must be positive, got {}", spacing)));
            }
        }
        if let Some(roundness) = self.roundness {
            if !roundness.is_finite() || roundness <= 0.0 || roundness > 1.0 {
                return Err(EngineError::InvalidPreset(format!("roundness must be in (0, 1], got {}", roundness)));
            }
        }
        if self.angle.is_some_and(|a| !a.is_finite()) {
            return Err(EngineError::InvalidPreset("angle must be finite".to_string()));
        }
        if let Some(points) = self.pressure_curve {
            if points.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::InvalidPreset("pressure curve must be finite".to_string()));
            }
        }
        if BlendMode::from_name(&self.blend).is_none() {
            return Err(EngineError::UnknownBlendMode(self.blend.clone()));
        }
        Ok(())
    }

    /// Validate and convert into a descriptor, starting from the family defaults.
    pub fn into_descriptor(self) -> Result<BrushDescriptor, EngineError> {
        self.validate()?;
        let base = BrushDescriptor::for_family(self.family);
        let descriptor = BrushDescriptor {
            name: self.name.unwrap_or(base.name),
            family: self.family,
            size: self.size as f32,
            opacity: self.opacity,
            hardness: self.hardness,
            roundness: self.roundness.unwrap_or(base.roundness),
            angle: self.angle.unwrap_or(base.angle),
            dynamic_angle: self.dynamic_angle.unwrap_or(base.dynamic_angle),
            spacing: self.spacing.unwrap_or(base.spacing),
            grain: self.grain,
            granulation: self.granulation,
            diffusion: self.diffusion,
            pressure_curve: self
                .pressure_curve
                .map_or(base.pressure_curve, PressureCurve::from_points),
            blend: BlendMode::from_name(&self.blend).unwrap_or_default(),
            custom_tip: self.custom_tip,
            blend_only: self.blend_only,
            stabilization: (self.smoothing * MAX_SMOOTHING_WINDOW).round() as usize,
        };
        Ok(descriptor.sanitized())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PENCIL: &str = r#"{
        "name": "6B",
        "family": "pencil",
        "size": 12,
        "opacity": 0.5,
        "hardness": 0.9,
        "smoothing": 0.3,
        "blend": "multiply",
        "grain": 0.7,
        "granulation": 0,
        "diffusion": 0,
        "pressureCurve": [0.2, 0.4, 0.6, 0.8]
    }"#;

    #[test]
    fn test_preset_into_descriptor() {
        let brush = BrushPreset::from_json(PENCIL).unwrap().into_descriptor().unwrap();
        assert_eq!(brush.name, "6B");
        assert_eq!(brush.family, BrushFamily::Pencil);
        assert_eq!(brush.size, 12.0);
        assert_eq!(brush.blend, BlendMode::Multiply);
        assert_eq!(brush.stabilization, 15);
        // family default fills the missing spacing
        assert_eq!(brush.spacing, BrushDescriptor::for_family(BrushFamily::Pencil).spacing);
    }

    #[test]
    fn test_preset_validation() {
        let mut preset = BrushPreset::from_json(PENCIL).unwrap();
        preset.opacity = 1.5;
        assert!(matches!(preset.validate(), Err(EngineError::InvalidPreset(_))));

        let mut preset = BrushPreset::from_json(PENCIL).unwrap();
        preset.size = 0;
        assert!(preset.into_descriptor().is_err());

        let mut preset = BrushPreset::from_json(PENCIL).unwrap();
        preset.blend = "glow".into();
        assert!(matches!(preset.validate(), Err(EngineError::UnknownBlendMode(_))));
    }
}
