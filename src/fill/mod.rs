//! Fill tools - bucket flood fill and polygonal lasso fill

mod flood;
mod lasso;

pub use flood::{flood_region, paint_region};
pub use lasso::{coalesce, polygon_mask};

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::core::errors::EngineError;
use crate::input::Point;
use crate::layer::{Color, PixelBuffer};

/// Bucket fill parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketOptions {
    /// Per-channel tolerance (0..=255)
    pub tolerance: u8,
    /// Gap-closing radius in pixels, 0 disables
    pub expand: u32,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            tolerance: 32,
            expand: 0,
        }
    }
}

/// Flood fill from `(x, y)` on `image`, clipped to the selection.
///
/// Returns the number of changed pixels.
pub fn bucket_fill(
    image: &mut PixelBuffer,
    x: i64,
    y: i64,
    color: Color,
    options: BucketOptions,
    selection: Option<&GrayImage>,
) -> Result<usize, EngineError> {
    if image.get(x, y).is_none() {
        return Err(EngineError::OutOfBounds { x, y });
    }
    let Some(region) = flood_region(
        image,
        x as u32,
        y as u32,
        options.tolerance,
        options.expand,
        selection,
    ) else {
        return Ok(0);
    };
    Ok(paint_region(image, &region, color, selection))
}

/// Fill the polygon `points` with `color`, clipped to the selection.
///
/// Fewer than three distinct points fill nothing.
pub fn lasso_fill(
    image: &mut PixelBuffer,
    points: &[Point],
    color: Color,
    selection: Option<&GrayImage>,
) -> usize {
    let Some(region) = polygon_mask(image.width(), image.height(), points, 1) else {
        tracing::debug!("Lasso fill ignored: fewer than 3 distinct points");
        return 0;
    };
    paint_region(image, &region, color, selection)
}
