//! Stroke phase state machine driven by the pointer-event stream

/// Phase of the current stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokePhase {
    #[default]
    Idle,
    /// Pressed, stabilizer window still filling
    Stabilizing,
    Stroking,
    /// Release or cancellation seen; residue flush pending
    Finalizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutput {
    pub stroke_id: u64,
    pub phase: StrokePhase,
}

#[derive(Debug)]
pub struct StrokeMachine {
    phase: StrokePhase,
    next_stroke_id: u64,
    stroke_id: u64,
    warmup: usize,
    samples: usize,
}

impl Default for StrokeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeMachine {
    pub fn new() -> Self {
        Self {
            phase: StrokePhase::Idle,
            next_stroke_id: 1,
            stroke_id: 0,
            warmup: 0,
            samples: 0,
        }
    }

    fn alloc_stroke_id(&mut self) -> u64 {
        let stroke_id = self.next_stroke_id;
        self.next_stroke_id = self.next_stroke_id.saturating_add(1);
        stroke_id
    }

    fn output(&self) -> PhaseOutput {
        PhaseOutput {
            stroke_id: self.stroke_id,
            phase: self.phase,
        }
    }

    pub fn phase(&self) -> StrokePhase {
        self.phase
    }

    pub fn stroke_id(&self) -> u64 {
        self.stroke_id
    }

    /// Pressed or moving (not idle, not finalizing).
    pub fn is_active(&self) -> bool {
        matches!(self.phase, StrokePhase::Stabilizing | StrokePhase::Stroking)
    }

    /// Start a new stroke; `warmup` is the stabilizer window.
    pub fn press(&mut self, warmup: usize) -> PhaseOutput {
        self.stroke_id = self.alloc_stroke_id();
        self.warmup = warmup;
        self.samples = 1;
        self.phase = if warmup > 1 {
            StrokePhase::Stabilizing
        } else {
            StrokePhase::Stroking
        };
        self.output()
    }

    /// A move event; `None` while idle (hover).
    pub fn motion(&mut self) -> Option<PhaseOutput> {
        if !self.is_active() {
            return None;
        }
        self.samples += 1;
        if self.phase == StrokePhase::Stabilizing && self.samples >= self.warmup {
            self.phase = StrokePhase::Stroking;
        }
        Some(self.output())
    }

    /// Release or cancellation; `None` if no stroke is in progress.
    pub fn release(&mut self) -> Option<PhaseOutput> {
        if !self.is_active() {
            return None;
        }
        self.phase = StrokePhase::Finalizing;
        Some(self.output())
    }

    /// Residue flushed and undo frame closed.
    pub fn finish(&mut self) {
        self.phase = StrokePhase::Idle;
        self.samples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_move_release_keeps_single_stroke() {
        let mut machine = StrokeMachine::new();
        assert!(machine.motion().is_none());

        let down = machine.press(0);
        assert_eq!(down.phase, StrokePhase::Stroking);

        let mv = machine.motion();
        assert_eq!(mv.map(|o| o.stroke_id), Some(down.stroke_id));

        let up = machine.release();
        assert_eq!(up.map(|o| o.phase), Some(StrokePhase::Finalizing));
        machine.finish();
        assert_eq!(machine.phase(), StrokePhase::Idle);
        assert!(machine.release().is_none());
    }

    #[test]
    fn stabilizing_until_window_fills() {
        let mut machine = StrokeMachine::new();
        assert_eq!(machine.press(3).phase, StrokePhase::Stabilizing);
        assert_eq!(machine.motion().map(|o| o.phase), Some(StrokePhase::Stabilizing));
        assert_eq!(machine.motion().map(|o| o.phase), Some(StrokePhase::Stroking));
    }

    #[test]
    fn strokes_get_fresh_ids() {
        let mut machine = StrokeMachine::new();
        let first = machine.press(0).stroke_id;
        machine.release();
        machine.finish();
        let second = machine.press(0).stroke_id;
        assert_ne!(first, second);
    }
}
