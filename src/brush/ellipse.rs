//! Antialiased ellipse coverage

/// Rotated ellipse described by its semi-axes.
#[derive(Debug, Clone, Copy)]
pub struct EllipseMask {
    rx: f32,
    ry: f32,
    cos: f32,
    sin: f32,
}

impl EllipseMask {
    /// `rx`/`ry` semi-axes in pixels, `angle` in radians.
    pub fn new(rx: f32, ry: f32, angle: f32) -> Self {
        let rx = rx.max(0.05);
        let ry = ry.max(0.05);
        Self {
            rx,
            ry,
            cos: angle.cos(),
            sin: angle.sin(),
        }
    }

    pub fn circle(radius: f32) -> Self {
        Self::new(radius, radius, 0.0)
    }

    /// Half extent of the axis-aligned bounding box.
    pub fn half_extent(&self) -> (f32, f32) {
        let hx = ((self.rx * self.cos).powi(2) + (self.ry * self.sin).powi(2)).sqrt();
        let hy = ((self.rx * self.sin).powi(2) + (self.ry * self.cos).powi(2)).sqrt();
        (hx, hy)
    }

    /// Normalized radial distance (1.0 on the outline).
    #[inline]
    pub fn normalized_distance(&self, dx: f32, dy: f32) -> f32 {
        let u = dx * self.cos + dy * self.sin;
        let v = -dx * self.sin + dy * self.cos;
        ((u / self.rx).powi(2) + (v / self.ry).powi(2)).sqrt()
    }

    /// Pixel coverage for an offset from the center, 1px antialiased edge.
    #[inline]
    pub fn coverage(&self, dx: f32, dy: f32) -> f32 {
        let q = self.normalized_distance(dx, dy);
        if q < 1e-6 {
            return 1.0;
        }
        // distance to the outline along the ray through the pixel
        let signed = (q - 1.0) * (dx * dx + dy * dy).sqrt() / q;
        (0.5 - signed).clamp(0.0, 1.0)
    }

    /// Fill `row` with coverage values for pixel centers of one scanline.
    pub fn fill_row(&self, row: &mut [f32], row_y: f32, origin_x: f32, center_x: f32, center_y: f32) {
        let dy = row_y + 0.5 - center_y;
        for (col, value) in row.iter_mut().enumerate() {
            let dx = origin_x + col as f32 + 0.5 - center_x;
            *value = self.coverage(dx, dy);
        }
    }
}
