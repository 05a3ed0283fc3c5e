//! Seeded noise grids and the float-grid filters shared by paper and tip synthesis

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic RNG for a seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Standard normal sample (Box-Muller).
pub fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// `w x h` grid of normal samples around `mean`.
pub fn gaussian_grid(rng: &mut StdRng, w: usize, h: usize, mean: f32, sigma: f32) -> Vec<f32> {
    (0..w * h).map(|_| mean + gaussian(rng) * sigma).collect()
}

/// Uniform white noise in `[0, 1)`.
pub fn white_noise(rng: &mut StdRng, w: usize, h: usize) -> Vec<f32> {
    (0..w * h).map(|_| rng.gen::<f32>()).collect()
}

/// Stateless lattice hash in `[0, 1)`.
#[inline]
pub fn hash2(x: i64, y: i64, seed: u64) -> f32 {
    let mut h = seed ^ (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    (h >> 40) as f32 / (1u64 << 24) as f32
}

/// Normalized 1-D Gaussian kernel (radius = ceil(3σ)).
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let sigma = sigma.max(0.01);
    let radius = (sigma * 3.0).ceil() as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Indices wrap modulo the grid size (tileable)
    Wrap,
    /// Indices clamp to the border
    Clamp,
}

impl Edge {
    #[inline]
    fn index(self, i: i64, n: usize) -> usize {
        match self {
            Edge::Wrap => i.rem_euclid(n as i64) as usize,
            Edge::Clamp => i.clamp(0, n as i64 - 1) as usize,
        }
    }
}

/// Separable Gaussian blur of a float grid.
pub fn blur(grid: &[f32], w: usize, h: usize, sigma: f32, edge: Edge) -> Vec<f32> {
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let mut tmp = vec![0.0; w * h];
    for y in 0..h {
        let row = &grid[y * w..(y + 1) * w];
        for x in 0..w {
            tmp[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * row[edge.index(x as i64 + k as i64 - radius, w)])
                .sum();
        }
    }
    let mut out = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    weight * tmp[edge.index(y as i64 + k as i64 - radius, h) * w + x]
                })
                .sum();
        }
    }
    out
}

/// Horizontal box filter of length `len` (clamped edges).
pub fn box_blur_horizontal(grid: &[f32], w: usize, h: usize, len: usize) -> Vec<f32> {
    let len = len.max(1);
    let half = (len / 2) as i64;
    let mut out = vec![0.0; w * h];
    for y in 0..h {
        let row = &grid[y * w..(y + 1) * w];
        for x in 0..w {
            let mut sum = 0.0;
            for k in 0..len as i64 {
                sum += row[Edge::Clamp.index(x as i64 + k - half, w)];
            }
            out[y * w + x] = sum / len as f32;
        }
    }
    out
}

#[inline]
fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Bicubic (Catmull-Rom) resample of a `sw x sh` grid to `dw x dh`.
pub fn cubic_resample(
    src: &[f32],
    sw: usize,
    sh: usize,
    dw: usize,
    dh: usize,
    edge: Edge,
) -> Vec<f32> {
    if sw == 0 || sh == 0 {
        return vec![0.0; dw * dh];
    }
    let sx_scale = sw as f32 / dw.max(1) as f32;
    let sy_scale = sh as f32 / dh.max(1) as f32;
    let at = |x: i64, y: i64| src[edge.index(y, sh) * sw + edge.index(x, sw)];
    let mut out = vec![0.0; dw * dh];
    for y in 0..dh {
        let fy = (y as f32 + 0.5) * sy_scale - 0.5;
        let iy = fy.floor() as i64;
        let ty = fy - iy as f32;
        for x in 0..dw {
            let fx = (x as f32 + 0.5) * sx_scale - 0.5;
            let ix = fx.floor() as i64;
            let tx = fx - ix as f32;
            let mut col = [0.0; 4];
            for (j, c) in col.iter_mut().enumerate() {
                let yy = iy + j as i64 - 1;
                *c = catmull_rom(
                    at(ix - 1, yy),
                    at(ix, yy),
                    at(ix + 1, yy),
                    at(ix + 2, yy),
                    tx,
                );
            }
            out[y * dw + x] = catmull_rom(col[0], col[1], col[2], col[3], ty);
        }
    }
    out
}

/// Linearly rescale a grid so its range maps onto `[0, 1]`.
pub fn normalize(grid: &mut [f32]) {
    let (min, max) = grid
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        grid.fill(0.5);
        return;
    }
    for v in grid.iter_mut() {
        *v = (*v - min) / range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_grids_are_reproducible() {
        let a = gaussian_grid(&mut seeded_rng(7), 8, 8, 0.5, 0.15);
        let b = gaussian_grid(&mut seeded_rng(7), 8, 8, 0.5, 0.15);
        assert_eq!(a, b);
        let c = gaussian_grid(&mut seeded_rng(8), 8, 8, 0.5, 0.15);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_range_and_determinism() {
        for i in -50..50 {
            let v = hash2(i, i * 3, 11);
            assert!((0.0..1.0).contains(&v));
            assert_eq!(v, hash2(i, i * 3, 11));
        }
    }

    #[test]
    fn test_kernel_is_normalized() {
        let kernel = gaussian_kernel(2.0);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(kernel.len(), 13);
    }

    #[test]
    fn test_wrapped_blur_of_constant_is_constant() {
        let grid = vec![0.25; 16 * 16];
        let out = blur(&grid, 16, 16, 3.0, Edge::Wrap);
        assert!(out.iter().all(|v| (v - 0.25).abs() < 1e-5));
    }

    #[test]
    fn test_cubic_resample_constant() {
        let grid = vec![0.75; 4 * 4];
        let out = cubic_resample(&grid, 4, 4, 13, 9, Edge::Clamp);
        assert_eq!(out.len(), 13 * 9);
        assert!(out.iter().all(|v| (v - 0.75).abs() < 1e-5));
    }

    #[test]
    fn test_normalize_range() {
        let mut grid = vec![2.0, 4.0, 3.0];
        normalize(&mut grid);
        assert_eq!(grid, vec![0.0, 1.0, 0.5]);
    }
}
