//! Canvas-wide selection mask
//!
//! 0 blocks writes, 255 lets them through, values in between feather them.
//! No mask at all means the whole canvas is open.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::core::errors::EngineError;
use crate::fill::{flood_region, polygon_mask};
use crate::input::Point;
use crate::layer::{PixelBuffer, Rect};

/// Lasso selections are antialiased with this many samples per axis.
const LASSO_SUPERSAMPLE: u32 = 4;

/// How a new shape combines with the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionOp {
    #[default]
    Replace,
    Add,
    Subtract,
    Intersect,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    width: u32,
    height: u32,
    mask: Option<GrayImage>,
}

impl Selection {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mask: None,
        }
    }

    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.mask.is_some()
    }

    /// Coverage at a pixel; 255 everywhere without a selection.
    pub fn value(&self, x: u32, y: u32) -> u8 {
        match &self.mask {
            None => 255,
            Some(mask) if x < mask.width() && y < mask.height() => mask.get_pixel(x, y)[0],
            Some(_) => 0,
        }
    }

    pub fn clear(&mut self) {
        self.mask = None;
    }

    /// Drop the selection and adopt new canvas dimensions.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.mask = None;
    }

    /// Hard-edged rectangle.
    pub fn select_rect(&mut self, rect: Rect, op: SelectionOp) {
        let clipped = rect.clamp_to(self.width, self.height);
        let mut shape = GrayImage::new(self.width, self.height);
        for y in clipped.top.max(0)..clipped.bottom {
            for x in clipped.left.max(0)..clipped.right {
                shape.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
        self.combine(shape, op);
    }

    /// Antialiased polygon. Fewer than three distinct points select nothing
    /// and leave the selection untouched.
    pub fn select_lasso(&mut self, points: &[Point], op: SelectionOp) -> bool {
        match polygon_mask(self.width, self.height, points, LASSO_SUPERSAMPLE) {
            Some(shape) => {
                self.combine(shape, op);
                true
            }
            None => false,
        }
    }

    /// Magic wand on `image`: the tolerance region around `(x, y)`.
    pub fn select_wand(
        &mut self,
        image: &PixelBuffer,
        x: i64,
        y: i64,
        tolerance: u8,
        op: SelectionOp,
    ) -> Result<(), EngineError> {
        if image.get(x, y).is_none() {
            return Err(EngineError::OutOfBounds { x, y });
        }
        if let Some(shape) = flood_region(image, x as u32, y as u32, tolerance, 0, None) {
            self.combine(shape, op);
        }
        Ok(())
    }

    /// Swap selected and unselected; inverting nothing selects nothing.
    pub fn invert(&mut self) {
        let Some(mask) = self.mask.take() else {
            return;
        };
        let mut inverted = mask;
        for px in inverted.pixels_mut() {
            px[0] = 255 - px[0];
        }
        self.set(inverted);
    }

    fn combine(&mut self, shape: GrayImage, op: SelectionOp) {
        let result = match (op, self.mask.take()) {
            (SelectionOp::Replace, _) | (SelectionOp::Add, None) => shape,
            // nothing selected means everything is open; keep it that way
            (SelectionOp::Subtract | SelectionOp::Intersect, None) => {
                tracing::debug!("{:?} without a selection ignored", op);
                return;
            }
            (op, Some(mut current)) => {
                for (c, s) in current.pixels_mut().zip(shape.pixels()) {
                    c[0] = match op {
                        SelectionOp::Add => c[0].max(s[0]),
                        SelectionOp::Subtract => c[0].min(255 - s[0]),
                        _ => c[0].min(s[0]),
                    };
                }
                current
            }
        };
        self.set(result);
    }

    /// Store a mask; an all-zero mask clears the selection.
    fn set(&mut self, mask: GrayImage) {
        if mask.pixels().any(|p| p[0] > 0) {
            self.mask = Some(mask);
        } else {
            self.mask = None;
        }
    }
}
