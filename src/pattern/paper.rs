//! Tileable paper height-field

use super::noise::{blur, cubic_resample, gaussian_grid, normalize, seeded_rng, white_noise, Edge};

/// Grid size of the coarse fiber noise at the reference texture size.
const COARSE_GRID: usize = 64;
const REFERENCE_SIZE: usize = 1024;

/// Seamless grayscale height-field in `[0, 1]`, sampled modulo its size.
#[derive(Debug, Clone)]
pub struct PaperTexture {
    size: usize,
    data: Vec<f32>,
}

impl PaperTexture {
    /// Synthesize a `size x size` texture.
    ///
    /// Coarse white noise is cubic-upsampled and blurred (σ≈5 at 1024),
    /// multiplied with a fine blurred grain and contrast-stretched. All
    /// filters wrap, so the result tiles.
    pub fn generate(size: usize, seed: u64) -> Self {
        let size = size.max(4);
        let scale = size as f32 / REFERENCE_SIZE as f32;
        let coarse_n = ((COARSE_GRID as f32 * scale).round() as usize).clamp(4, COARSE_GRID);
        let mut rng = seeded_rng(seed);

        let coarse = gaussian_grid(&mut rng, coarse_n, coarse_n, 0.5, 0.25);
        let fibers = cubic_resample(&coarse, coarse_n, coarse_n, size, size, Edge::Wrap);
        let fibers = blur(&fibers, size, size, (5.0 * scale).max(0.75), Edge::Wrap);

        let grain = white_noise(&mut rng, size, size);
        let grain = blur(&grain, size, size, 1.0, Edge::Wrap);

        let mut data: Vec<f32> = fibers.iter().zip(&grain).map(|(f, g)| f * g).collect();
        normalize(&mut data);
        tracing::debug!("Generated paper texture {}x{} (seed {:#x})", size, size, seed);
        Self { size, data }
    }

    /// Edge length `T`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Height at `(x, y)`, both axes wrapped modulo `T`.
    #[inline]
    pub fn sample(&self, x: i64, y: i64) -> f32 {
        let n = self.size as i64;
        let xi = x.rem_euclid(n) as usize;
        let yi = y.rem_euclid(n) as usize;
        self.data[yi * self.size + xi]
    }

    /// `w x h` slice starting at `(x, y)` with wrap-around.
    pub fn patch(&self, x: i64, y: i64, w: usize, h: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(w * h);
        for dy in 0..h as i64 {
            for dx in 0..w as i64 {
                out.push(self.sample(x + dx, y + dy));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_range() {
        let paper = PaperTexture::generate(64, 3);
        assert_eq!(paper.size(), 64);
        let patch = paper.patch(0, 0, 64, 64);
        assert!(patch.iter().all(|v| (0.0..=1.0).contains(v)));
        let min = patch.iter().cloned().fold(f32::MAX, f32::min);
        let max = patch.iter().cloned().fold(f32::MIN, f32::max);
        assert!(min < 0.05 && max > 0.95);
    }

    #[test]
    fn test_patch_is_tileable() {
        let paper = PaperTexture::generate(32, 9);
        let t = paper.size() as i64;
        let base = paper.patch(5, 7, 20, 11);
        assert_eq!(base, paper.patch(5 + t, 7, 20, 11));
        assert_eq!(base, paper.patch(5, 7 + t, 20, 11));
        assert_eq!(base, paper.patch(5 - t, 7 - 2 * t, 20, 11));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = PaperTexture::generate(32, 1);
        let b = PaperTexture::generate(32, 1);
        assert_eq!(a.patch(0, 0, 32, 32), b.patch(0, 0, 32, 32));
    }
}
