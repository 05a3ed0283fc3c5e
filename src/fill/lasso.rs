//! Polygon rasterization for lasso fill and lasso selection

use image::{GrayImage, Luma};

use crate::input::Point;

/// Drop consecutive duplicate points (and a closing point equal to the first).
pub fn coalesce(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points.iter().filter(|p| p.is_finite()) {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Even-odd crossings of the polygon with the horizontal line `y`, sorted.
fn crossings(points: &[Point], y: f32, out: &mut Vec<f32>) {
    out.clear();
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if (a.y <= y && b.y > y) || (b.y <= y && a.y > y) {
            let t = (y - a.y) / (b.y - a.y);
            out.push(a.x + (b.x - a.x) * t);
        }
    }
    out.sort_by(f32::total_cmp);
}

/// Coverage mask of a polygon, `samples x samples` points per pixel.
///
/// Returns `None` for fewer than 3 distinct points.
pub fn polygon_mask(width: u32, height: u32, points: &[Point], samples: u32) -> Option<GrayImage> {
    let points = coalesce(points);
    if points.len() < 3 {
        return None;
    }
    let samples = samples.clamp(1, 16);
    let total = (samples * samples) as f32;
    let mut mask = GrayImage::new(width, height);
    let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let y0 = (min_y.floor().max(0.0) as u32).min(height);
    let y1 = (max_y.ceil().max(0.0) as u32).min(height);

    let mut counts = vec![0u32; width as usize];
    let mut xs = Vec::new();
    for y in y0..y1 {
        counts.fill(0);
        for j in 0..samples {
            let sy = y as f32 + (j as f32 + 0.5) / samples as f32;
            crossings(&points, sy, &mut xs);
            for span in xs.chunks_exact(2) {
                let (left, right) = (span[0], span[1]);
                let px0 = left.floor().max(0.0) as u32;
                let px1 = (right.ceil().max(0.0) as u32).min(width);
                for px in px0..px1 {
                    for i in 0..samples {
                        let sx = px as f32 + (i as f32 + 0.5) / samples as f32;
                        if sx >= left && sx < right {
                            counts[px as usize] += 1;
                        }
                    }
                }
            }
        }
        for (x, &count) in counts.iter().enumerate() {
            if count > 0 {
                let v = (count as f32 / total * 255.0).round() as u8;
                mask.put_pixel(x as u32, y, Luma([v]));
            }
        }
    }
    Some(mask)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ]
    }

    #[test]
    fn test_coalesce_duplicates() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ];
        assert_eq!(coalesce(&pts).len(), 3);
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let pts = vec![Point::new(1.0, 1.0), Point::new(1.0, 1.0), Point::new(3.0, 3.0)];
        assert!(polygon_mask(8, 8, &pts, 1).is_none());
    }

    #[test]
    fn test_axis_aligned_square() {
        let mask = polygon_mask(8, 8, &square(), 1).unwrap();
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(5, 5)[0], 255);
        assert_eq!(mask.get_pixel(6, 6)[0], 0);
        assert_eq!(mask.get_pixel(1, 3)[0], 0);
    }

    #[test]
    fn test_supersampled_edge_is_soft() {
        let tri = vec![Point::new(0.0, 0.0), Point::new(8.0, 0.0), Point::new(0.0, 8.0)];
        let mask = polygon_mask(8, 8, &tri, 4).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        let diagonal = mask.get_pixel(3, 4)[0];
        assert!(diagonal > 0 && diagonal < 255);
        assert_eq!(mask.get_pixel(7, 7)[0], 0);
    }
}
