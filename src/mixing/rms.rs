//! RMS-subtractive pigment mix
//!
//! Colors are mixed in complement space under a squared norm, which keeps
//! saturated pigments from going gray the way a linear alpha blend does.

use crate::layer::pixel::straight_rgb;

/// Inputs shared by every pixel of one dab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsParams {
    pub opacity: f32,
    pub pressure: f32,
    pub granulation: f32,
    pub diffusion: f32,
}

impl Default for RmsParams {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            pressure: 1.0,
            granulation: 0.0,
            diffusion: 0.0,
        }
    }
}

/// Paint acceptance for a paper height `paper` and noise sample in `[0, 1]`.
///
/// Paper peaks reject paint, valleys accept it. 1.0 without granulation.
#[inline]
pub fn flow_mask(paper: f32, noise: f32, granulation: f32) -> f32 {
    if granulation <= 0.0 {
        return 1.0;
    }
    ((1.0 - paper * granulation * 0.8) * (1.0 - noise * granulation * 0.4)).clamp(0.0, 1.0)
}

/// Mix a straight foreground color at alpha `fg_alpha` into a premultiplied
/// background pixel. Returns the premultiplied result.
#[inline]
pub fn rms_mix(background: [f32; 4], fg_rgb: [f32; 3], fg_alpha: f32, flow: f32, params: &RmsParams) -> [f32; 4] {
    if fg_alpha <= 0.0 {
        return background;
    }
    let ba = background[3].clamp(0.0, 1.0);
    let b = straight_rgb(background);
    let density = (fg_alpha * params.opacity * flow * params.pressure).clamp(0.0, 1.0);
    let out_a = (ba + fg_alpha * flow * params.opacity).clamp(0.0, 1.0);

    let mut out = [0.0, 0.0, 0.0, out_a];
    for c in 0..3 {
        // transparent background reads as white paper
        let b_eff = b[c] * ba + (1.0 - ba);
        let f = fg_rgb[c].clamp(0.0, 1.0);
        let inv2 = (1.0 - b_eff).powi(2) * (1.0 - density) + (1.0 - f).powi(2) * density;
        let mut mixed = 1.0 - inv2.max(0.0).sqrt();
        if params.diffusion > 0.05 {
            let t = density * params.diffusion * 0.4;
            mixed += (f - mixed) * t;
        }
        out[c] = mixed.clamp(0.0, 1.0) * out_a;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_mask_without_granulation() {
        assert_eq!(flow_mask(1.0, 1.0, 0.0), 1.0);
        assert!(flow_mask(1.0, 0.0, 1.0) < flow_mask(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_transparent_foreground_is_noop() {
        let bg = [0.2, 0.1, 0.0, 0.5];
        assert_eq!(rms_mix(bg, [1.0, 0.0, 0.0], 0.0, 1.0, &RmsParams::default()), bg);
    }

    #[test]
    fn test_full_density_gives_foreground() {
        let out = rms_mix([1.0, 1.0, 1.0, 1.0], [0.0, 0.0, 1.0], 1.0, 1.0, &RmsParams::default());
        assert!(out[0].abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn test_same_pigment_is_stable() {
        let params = RmsParams {
            opacity: 0.5,
            ..RmsParams::default()
        };
        let out = rms_mix([0.6, 0.2, 0.2, 1.0], [0.6, 0.2, 0.2], 1.0, 1.0, &params);
        assert!((out[0] - 0.6).abs() < 1e-5);
        assert!((out[1] - 0.2).abs() < 1e-5);
        assert!(out.iter().all(|c| c.is_finite() && *c <= out[3] + 1e-6));
    }

    #[test]
    fn test_transparent_background_reads_as_white() {
        let params = RmsParams {
            opacity: 0.5,
            ..RmsParams::default()
        };
        let out = rms_mix([0.0; 4], [0.0, 0.0, 0.0], 1.0, 1.0, &params);
        assert_eq!(out[3], 0.5);
        // half density black over white paper lands in the middle
        let straight = out[0] / out[3];
        assert!(straight > 0.2 && straight < 0.8);
    }
}
