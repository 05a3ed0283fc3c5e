//! Saturation-preserving color mix for thick paint

const SATURATION_BOOST: f32 = 1.1;

/// RGB in `[0, 1]` -> `(h in [0, 360), s, v)`.
pub fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|c| c.clamp(0.0, 1.0));
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };
    [h, s, max]
}

pub fn hsv_to_rgb(hsv: [f32; 3]) -> [f32; 3] {
    let h = hsv[0].rem_euclid(360.0);
    let s = hsv[1].clamp(0.0, 1.0);
    let v = hsv[2].clamp(0.0, 1.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [r + m, g + m, b + m]
}

/// Linear RGB mix of `a` toward `b` by `t`, then saturation ×1.1.
pub fn mix_saturated(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    if t <= 0.0 {
        return a;
    }
    let linear = [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ];
    let mut hsv = rgb_to_hsv(linear);
    hsv[1] = (hsv[1] * SATURATION_BOOST).min(1.0);
    hsv_to_rgb(hsv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn test_hsv_round_trip() {
        for rgb in [
            [1.0, 0.0, 0.0],
            [0.2, 0.6, 0.4],
            [0.9, 0.9, 0.1],
            [0.5, 0.5, 0.5],
            [0.1, 0.2, 0.8],
        ] {
            assert!(close(hsv_to_rgb(rgb_to_hsv(rgb)), rgb), "{:?}", rgb);
        }
    }

    #[test]
    fn test_zero_mix_is_identity() {
        assert_eq!(mix_saturated([0.3, 0.4, 0.5], [1.0, 0.0, 0.0], 0.0), [0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_mix_is_more_saturated_than_linear() {
        let a = [0.9, 0.2, 0.1];
        let b = [0.1, 0.3, 0.9];
        let mixed = mix_saturated(a, b, 0.5);
        let linear = [0.5, 0.25, 0.5];
        assert!(rgb_to_hsv(mixed)[1] > rgb_to_hsv(linear)[1]);
    }

    #[test]
    fn test_gray_stays_gray() {
        let mixed = mix_saturated([0.2, 0.2, 0.2], [0.8, 0.8, 0.8], 0.5);
        assert!(close(mixed, [0.5, 0.5, 0.5]));
    }
}
