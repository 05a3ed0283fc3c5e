//! Wet and pigment maps
//!
//! Canvas-sized float maps filled by watercolor dabs. Wetness widens the
//! local diffusion blur of later dabs; both maps dry out on a timer.

use crate::layer::Rect;

/// Fraction of wetness kept per drying step.
const WET_DECAY: f32 = 0.5;
/// Fraction of loose pigment kept per drying step.
const PIGMENT_DECAY: f32 = 0.8;

#[derive(Debug, Clone, Default)]
pub struct WetMaps {
    width: u32,
    height: u32,
    wet: Vec<f32>,
    pigment: Vec<f32>,
}

impl WetMaps {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            wet: vec![0.0; n],
            pigment: vec![0.0; n],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Wetness at `(x, y)`, 0 outside the canvas.
    #[inline]
    pub fn wetness(&self, x: i32, y: i32) -> f32 {
        self.index(x, y).map_or(0.0, |i| self.wet[i])
    }

    #[inline]
    pub fn pigment(&self, x: i32, y: i32) -> f32 {
        self.index(x, y).map_or(0.0, |i| self.pigment[i])
    }

    /// Highest wetness inside `rect`.
    pub fn max_wetness(&self, rect: Rect) -> f32 {
        let rect = rect.clamp_to(self.width, self.height);
        let mut max = 0.0f32;
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                max = max.max(self.wetness(x, y));
            }
        }
        max
    }

    /// Add water and pigment at one pixel; both saturate at 1.
    #[inline]
    pub fn deposit(&mut self, x: i32, y: i32, water: f32, pigment: f32) {
        if let Some(i) = self.index(x, y) {
            self.wet[i] = (self.wet[i] + water.max(0.0)).min(1.0);
            self.pigment[i] = (self.pigment[i] + pigment.max(0.0)).min(1.0);
        }
    }

    /// One drying step. Returns whether anything is still wet.
    pub fn decay(&mut self) -> bool {
        let mut wet_left = false;
        for (w, p) in self.wet.iter_mut().zip(self.pigment.iter_mut()) {
            *w *= WET_DECAY;
            *p *= PIGMENT_DECAY;
            if *w < 1e-3 {
                *w = 0.0;
            }
            if *p < 1e-3 {
                *p = 0.0;
            }
            wet_left |= *w > 0.0;
        }
        wet_left
    }

    pub fn is_dry(&self) -> bool {
        self.wet.iter().all(|w| *w == 0.0)
    }

    pub fn clear(&mut self) {
        self.wet.fill(0.0);
        self.pigment.fill(0.0);
    }
}
