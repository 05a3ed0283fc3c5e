//! Input processor - pressure response, position stabilizer and midpoint smoother

use std::collections::VecDeque;

use super::{DeviceKind, Point, StrokeSample};
use crate::brush::{quadratic_bezier_points, PressureCurve};

/// Largest stabilizer window.
pub const MAX_STABILIZATION: usize = 50;

/// Position stabilizer - moving average over the last `k` raw points.
///
/// A window of 0 passes points through unchanged.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    window_size: usize,
    points: VecDeque<Point>,
    sum_x: f64,
    sum_y: f64,
}

impl Stabilizer {
    pub fn new(window_size: usize) -> Self {
        let size = window_size.min(MAX_STABILIZATION);
        Self {
            window_size: size,
            points: VecDeque::with_capacity(size.max(1)),
            sum_x: 0.0,
            sum_y: 0.0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn set_window_size(&mut self, window_size: usize) {
        *self = Self::new(window_size);
    }

    /// Add a raw point and return the mean of the buffered points.
    pub fn push(&mut self, point: Point) -> Point {
        if self.window_size == 0 {
            return point;
        }
        self.points.push_back(point);
        self.sum_x += point.x as f64;
        self.sum_y += point.y as f64;

        // If buffer exceeds window size, remove oldest
        if self.points.len() > self.window_size {
            if let Some(old) = self.points.pop_front() {
                self.sum_x -= old.x as f64;
                self.sum_y -= old.y as f64;
            }
        }

        let n = self.points.len() as f64;
        Point::new((self.sum_x / n) as f32, (self.sum_y / n) as f32)
    }

    /// Whether the window has filled since the last reset.
    pub fn is_primed(&self) -> bool {
        self.points.len() >= self.window_size
    }

    pub fn reset(&mut self) {
        self.points.clear();
        self.sum_x = 0.0;
        self.sum_y = 0.0;
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Quadratic-Bezier midpoint smoother
///
/// Keeps the last accepted sample and the last midpoint; each new sample
/// emits the curve from the previous midpoint to the new midpoint with the
/// previous sample as control point.
#[derive(Debug, Clone, Default)]
pub struct QuadSmoother {
    prev: Option<StrokeSample>,
    last_mid: Option<StrokeSample>,
}

impl QuadSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, sample: StrokeSample) {
        self.prev = Some(sample);
        self.last_mid = Some(sample);
    }

    /// Accept a sample; returns the curve points to stroke through.
    pub fn push(&mut self, sample: StrokeSample) -> Vec<StrokeSample> {
        let (Some(prev), Some(last_mid)) = (self.prev, self.last_mid) else {
            self.begin(sample);
            return vec![sample];
        };
        if sample.position == prev.position {
            self.prev = Some(StrokeSample {
                pressure: sample.pressure,
                ..prev
            });
            return Vec::new();
        }
        let mid = prev.lerp(sample, 0.5);
        let points = quadratic_bezier_points(last_mid.position, prev.position, mid.position)
            .into_iter()
            .map(|(t, position)| StrokeSample {
                position,
                ..last_mid.lerp(mid, t)
            })
            .collect();
        self.last_mid = Some(mid);
        self.prev = Some(sample);
        points
    }

    /// Flush the tail from the last midpoint to the last sample and reset.
    pub fn finish(&mut self) -> Vec<StrokeSample> {
        let tail = match (self.prev, self.last_mid) {
            (Some(prev), Some(mid)) if prev.position != mid.position => vec![prev],
            _ => Vec::new(),
        };
        self.reset();
        tail
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.last_mid = None;
    }
}

/// Full input chain: pressure curve, stabilizer, midpoint smoother.
///
/// Positions must already be in canvas space.
#[derive(Debug, Clone)]
pub struct InputPipeline {
    curve: PressureCurve,
    device: DeviceKind,
    stabilizer: Stabilizer,
    smoother: QuadSmoother,
    last_pressure: f32,
    last_rotation: f32,
}

impl InputPipeline {
    pub fn new(stabilization: usize) -> Self {
        Self {
            curve: PressureCurve::default(),
            device: DeviceKind::default(),
            stabilizer: Stabilizer::new(stabilization),
            smoother: QuadSmoother::new(),
            last_pressure: 1.0,
            last_rotation: 0.0,
        }
    }

    pub fn set_curve(&mut self, curve: PressureCurve) {
        self.curve = curve;
    }

    pub fn set_stabilization(&mut self, window_size: usize) {
        if window_size.min(MAX_STABILIZATION) != self.stabilizer.window_size() {
            self.stabilizer.set_window_size(window_size);
        }
    }

    pub fn stabilizer(&self) -> &Stabilizer {
        &self.stabilizer
    }

    /// Raw pressure through the response curve; mouse input is always 1.0.
    pub fn map_pressure(&self, raw: f32) -> f32 {
        if !self.device.has_pressure() {
            return 1.0;
        }
        self.curve.apply(raw)
    }

    /// Start a stroke; the returned sample is the press dab.
    pub fn press(&mut self, position: Point, pressure: f32, rotation: f32, device: DeviceKind) -> StrokeSample {
        self.device = device;
        self.stabilizer.reset();
        self.smoother.reset();
        let sample = StrokeSample {
            position: self.stabilizer.push(position),
            pressure: self.map_pressure(pressure),
            rotation,
        };
        self.last_pressure = sample.pressure;
        self.last_rotation = rotation;
        self.smoother.begin(sample);
        sample
    }

    pub fn motion(&mut self, position: Point, pressure: f32, rotation: f32) -> Vec<StrokeSample> {
        let sample = StrokeSample {
            position: self.stabilizer.push(position),
            pressure: self.map_pressure(pressure),
            rotation,
        };
        self.last_pressure = sample.pressure;
        self.last_rotation = rotation;
        self.smoother.push(sample)
    }

    /// Finish the stroke at `position`, returning the remaining samples.
    pub fn release(&mut self, position: Point) -> Vec<StrokeSample> {
        let sample = StrokeSample {
            position: self.stabilizer.push(position),
            pressure: self.last_pressure,
            rotation: self.last_rotation,
        };
        let mut points = self.smoother.push(sample);
        points.extend(self.smoother.finish());
        self.stabilizer.reset();
        points
    }

    /// Drop the stroke without emitting more samples.
    pub fn cancel(&mut self) {
        self.stabilizer.reset();
        self.smoother.reset();
    }
}

impl Default for InputPipeline {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Stabilizer Tests =====

    #[test]
    fn test_stabilizer_passthrough() {
        let mut stabilizer = Stabilizer::new(0);
        assert_eq!(stabilizer.push(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
        assert!(stabilizer.is_primed());
    }

    #[test]
    fn test_stabilizer_sliding_window() {
        let mut stabilizer = Stabilizer::new(3);
        assert_eq!(stabilizer.push(Point::new(0.0, 0.0)), Point::new(0.0, 0.0));
        assert_eq!(stabilizer.push(Point::new(3.0, 0.0)), Point::new(1.5, 0.0));
        assert!(!stabilizer.is_primed());
        assert_eq!(stabilizer.push(Point::new(6.0, 3.0)), Point::new(3.0, 1.0));
        assert!(stabilizer.is_primed());
        // oldest point drops out: [3, 6, 9]
        assert_eq!(stabilizer.push(Point::new(9.0, 0.0)), Point::new(6.0, 1.0));
    }

    #[test]
    fn test_stabilizer_reset_and_clamp() {
        let mut stabilizer = Stabilizer::new(500);
        assert_eq!(stabilizer.window_size(), MAX_STABILIZATION);
        stabilizer.push(Point::new(10.0, 10.0));
        stabilizer.reset();
        assert_eq!(stabilizer.push(Point::new(2.0, 2.0)), Point::new(2.0, 2.0));
    }

    // ===== Smoother / pipeline Tests =====

    #[test]
    fn test_smoother_emits_midpoint_curve() {
        let mut smoother = QuadSmoother::new();
        smoother.begin(StrokeSample::new(0.0, 0.0, 1.0));
        let pts = smoother.push(StrokeSample::new(20.0, 0.0, 1.0));
        assert_eq!(pts.last().map(|s| s.position), Some(Point::new(10.0, 0.0)));
        let tail = smoother.finish();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].position, Point::new(20.0, 0.0));
    }

    #[test]
    fn test_smoother_zero_length_defers() {
        let mut smoother = QuadSmoother::new();
        smoother.begin(StrokeSample::new(5.0, 5.0, 0.5));
        assert!(smoother.push(StrokeSample::new(5.0, 5.0, 0.8)).is_empty());
        assert!(smoother.finish().is_empty());
    }

    #[test]
    fn test_mouse_pressure_forced() {
        let mut pipeline = InputPipeline::new(0);
        pipeline.set_curve(PressureCurve::hard());
        let press = pipeline.press(Point::new(0.0, 0.0), 0.2, 0.0, DeviceKind::Mouse);
        assert_eq!(press.pressure, 1.0);

        let press = pipeline.press(Point::new(0.0, 0.0), 0.5, 0.0, DeviceKind::Stylus);
        assert!(press.pressure < 0.5);
    }

    #[test]
    fn test_pipeline_covers_whole_line() {
        let mut pipeline = InputPipeline::new(0);
        pipeline.press(Point::new(10.0, 10.0), 1.0, 0.0, DeviceKind::Mouse);
        let mut pts = pipeline.motion(Point::new(90.0, 10.0), 1.0, 0.0);
        pts.extend(pipeline.release(Point::new(90.0, 10.0)));
        assert!(pts.iter().all(|s| (s.position.y - 10.0).abs() < 1e-4));
        assert_eq!(pts.last().map(|s| s.position), Some(Point::new(90.0, 10.0)));
    }
}
