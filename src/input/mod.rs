//! Input module - pointer events, pressure response and stroke smoothing

mod phase;
mod processor;

pub use phase::{PhaseOutput, StrokeMachine, StrokePhase};
pub use processor::{InputPipeline, QuadSmoother, Stabilizer};

use serde::{Deserialize, Serialize};

/// 2-D point in canvas or viewport space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    #[inline]
    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    #[inline]
    pub fn midpoint(self, other: Point) -> Point {
        self.lerp(other, 0.5)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Input device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Mouse,
    Stylus,
    Touch,
}

impl DeviceKind {
    /// Whether the device reports real pressure.
    pub fn has_pressure(self) -> bool {
        self == DeviceKind::Stylus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Press,
    Move,
    Release,
}

/// Pointer event as delivered by the shell (viewport coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub position: Point,
    /// Pressure value (0.0 - 1.0)
    #[serde(default = "default_pressure")]
    pub pressure: f32,
    /// Barrel rotation in degrees, 0 if unsupported
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub device: DeviceKind,
}

fn default_pressure() -> f32 {
    1.0
}

impl PointerEvent {
    pub fn press(x: f32, y: f32, pressure: f32, device: DeviceKind) -> Self {
        Self {
            phase: PointerPhase::Press,
            position: Point::new(x, y),
            pressure: pressure.clamp(0.0, 1.0),
            rotation: 0.0,
            device,
        }
    }

    pub fn moved(x: f32, y: f32, pressure: f32) -> Self {
        Self {
            phase: PointerPhase::Move,
            position: Point::new(x, y),
            pressure: pressure.clamp(0.0, 1.0),
            rotation: 0.0,
            device: DeviceKind::default(),
        }
    }

    pub fn release(x: f32, y: f32) -> Self {
        Self {
            phase: PointerPhase::Release,
            position: Point::new(x, y),
            pressure: 0.0,
            rotation: 0.0,
            device: DeviceKind::default(),
        }
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }
}

/// A smoothed, pressure-mapped stroke sample in canvas space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrokeSample {
    pub position: Point,
    /// Pressure after the response curve
    pub pressure: f32,
    /// Rotation in degrees
    pub rotation: f32,
}

impl StrokeSample {
    pub fn new(x: f32, y: f32, pressure: f32) -> Self {
        Self {
            position: Point::new(x, y),
            pressure,
            rotation: 0.0,
        }
    }

    pub fn lerp(self, other: StrokeSample, t: f32) -> StrokeSample {
        StrokeSample {
            position: self.position.lerp(other.position, t),
            pressure: self.pressure + (other.pressure - self.pressure) * t,
            rotation: self.rotation + (other.rotation - self.rotation) * t,
        }
    }
}
