//! Curve sampling for smooth brush strokes

use crate::input::Point;

/// Distance between segments of the subdivided curve, in pixels.
const SUBDIVISION_LENGTH: f32 = 5.0;

/// Point on the quadratic Bezier `start -> end` with `control`.
#[inline]
pub fn quadratic_point(start: Point, control: Point, end: Point, t: f32) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * start.x + 2.0 * u * t * control.x + t * t * end.x,
        u * u * start.y + 2.0 * u * t * control.y + t * t * end.y,
    )
}

/// Subdivide a quadratic Bezier into `max(2, length / 5)` pieces.
///
/// Returns the parameter and position of every point after `start`, the last
/// one being `end` exactly.
pub fn quadratic_bezier_points(start: Point, control: Point, end: Point) -> Vec<(f32, Point)> {
    let approx = start.distance(control) + control.distance(end);
    let count = ((approx / SUBDIVISION_LENGTH).round() as usize).max(2);
    (1..=count)
        .map(|i| {
            let t = i as f32 / count as f32;
            let p = if i == count {
                end
            } else {
                quadratic_point(start, control, end, t)
            };
            (t, p)
        })
        .collect()
}

/// Total length of a polyline.
pub fn path_length(points: &[Point]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}
