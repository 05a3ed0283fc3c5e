//! Premultiplied RGBA8 pixel buffer

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::pixel::{premultiply, unpremultiply, Color};

/// Axis-aligned rectangle, inclusive `left/top`, exclusive `right/bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width as i32, y + height as i32)
    }

    /// An inverted rectangle that any `union` replaces.
    pub fn empty() -> Self {
        Self {
            left: i32::MAX,
            top: i32::MAX,
            right: i32::MIN,
            bottom: i32::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    pub fn union(&mut self, other: &Rect) {
        if other.is_empty() {
            return;
        }
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        self.intersect(&Rect::new(0, 0, width as i32, height as i32))
    }

    /// Smallest integer rectangle covering a float box.
    pub fn covering(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Rect {
        Rect {
            left: min_x.floor() as i32,
            top: min_y.floor() as i32,
            right: max_x.ceil() as i32,
            bottom: max_y.ceil() as i32,
        }
    }
}

/// Rectangular premultiplied RGBA8 image.
///
/// Every writer must keep `r, g, b <= a`; see [`PixelBuffer::is_premultiplied`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Create a buffer filled with a premultiplied pixel.
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let mut buffer = Self::new(width, height);
        buffer.fill_premultiplied(pixel);
        buffer
    }

    /// Wrap raw premultiplied RGBA bytes. Returns `None` on a size mismatch.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Pixel at `(x, y)`; transparent when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = self.index(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Signed lookup, `None` outside the buffer.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.pixel(x as u32, y as u32))
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&pixel);
    }

    /// One row of raw RGBA bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Set every pixel to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Premultiply `color` and write it to every pixel.
    pub fn fill(&mut self, color: Color) {
        self.fill_premultiplied(color.premultiplied());
    }

    pub fn fill_premultiplied(&mut self, pixel: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&pixel);
        }
    }

    /// Copy a rectangle (clipped to the buffer) into a new buffer.
    pub fn copy_region(&self, rect: Rect) -> PixelBuffer {
        let clipped = rect.clamp_to(self.width, self.height);
        if clipped.is_empty() {
            return PixelBuffer::new(0, 0);
        }
        let mut out = PixelBuffer::new(clipped.width(), clipped.height());
        let row_bytes = clipped.width() as usize * 4;
        for (dy, y) in (clipped.top..clipped.bottom).enumerate() {
            let src = self.index(clipped.left as u32, y as u32);
            let dst = dy * row_bytes;
            out.data[dst..dst + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
        }
        out
    }

    /// Copy `src` over this buffer with its top-left at `(dst_x, dst_y)`.
    pub fn blit(&mut self, src: &PixelBuffer, dst_x: i32, dst_y: i32) {
        let target = Rect::from_xywh(dst_x, dst_y, src.width, src.height)
            .clamp_to(self.width, self.height);
        if target.is_empty() {
            return;
        }
        let row_bytes = target.width() as usize * 4;
        for y in target.top..target.bottom {
            let sx = (target.left - dst_x) as u32;
            let sy = (y - dst_y) as u32;
            let s = src.index(sx, sy);
            let d = self.index(target.left as u32, y as u32);
            self.data[d..d + row_bytes].copy_from_slice(&src.data[s..s + row_bytes]);
        }
    }

    /// Nearest-neighbor downscale fitting inside a `max_dim` square.
    ///
    /// The aspect ratio is kept, so only the longer side reaches `max_dim`;
    /// the output is not padded to a square. Buffers already inside the box
    /// are returned as a copy.
    pub fn thumbnail(&self, max_dim: u32) -> PixelBuffer {
        let max_dim = max_dim.max(1);
        if self.width <= max_dim && self.height <= max_dim {
            return self.clone();
        }
        let scale = max_dim as f64 / self.width.max(self.height) as f64;
        let tw = ((self.width as f64 * scale).round() as u32).clamp(1, max_dim);
        let th = ((self.height as f64 * scale).round() as u32).clamp(1, max_dim);
        let mut out = PixelBuffer::new(tw, th);
        for y in 0..th {
            let sy = ((y as u64 * self.height as u64) / th as u64) as u32;
            for x in 0..tw {
                let sx = ((x as u64 * self.width as u64) / tw as u64) as u32;
                out.put_pixel(x, y, self.pixel(sx, sy));
            }
        }
        out
    }

    /// New buffer of a different size with this content anchored top-left.
    pub fn resized_canvas(&self, width: u32, height: u32, fill: [u8; 4]) -> PixelBuffer {
        let mut out = PixelBuffer::filled(width, height, fill);
        out.blit(self, 0, 0);
        out
    }

    /// Check the premultiplication invariant on every pixel.
    pub fn is_premultiplied(&self) -> bool {
        self.data
            .chunks_exact(4)
            .all(|p| p[0] <= p[3] && p[1] <= p[3] && p[2] <= p[3])
    }

    /// Whether any pixel has non-zero alpha.
    pub fn has_coverage(&self) -> bool {
        self.data.chunks_exact(4).any(|p| p[3] > 0)
    }

    /// Straight-alpha copy for encoders.
    pub fn to_straight_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width, self.height);
        for (dst, src) in img.pixels_mut().zip(self.data.chunks_exact(4)) {
            *dst = Rgba(unpremultiply([src[0], src[1], src[2], src[3]]));
        }
        img
    }

    /// Premultiplied buffer from a straight-alpha image.
    pub fn from_straight_image(img: &RgbaImage) -> Self {
        let mut out = PixelBuffer::new(img.width(), img.height());
        for (dst, src) in out.data.chunks_exact_mut(4).zip(img.pixels()) {
            dst.copy_from_slice(&premultiply(src.0));
        }
        out
    }
}
