//! Fixed-timestep accumulator.
//!
//! Variable frame times are accumulated and consumed in fixed-size steps, so
//! a given input sequence over a given duration produces the same trajectory
//! no matter how the duration was split into frames.

use crate::config::ControllerConfig;

/// Accumulated time within this many seconds of a full step still counts as a step.
/// Keeps `0.05 + 0.05` and `5 × 0.02` producing the same number of steps.
const STEP_TOLERANCE: f64 = 1e-9;

/// Splits frame deltas into fixed steps.
#[derive(Clone, Debug)]
pub struct FixedStepper {
    step: f64,
    max_frame_delta: f64,
    max_substeps: u32,
    accumulator: f64,
    dropped: f64,
}

impl FixedStepper {
    /// Create a stepper. `step` must be positive.
    pub fn new(step: f64, max_frame_delta: f64, max_substeps: u32) -> Self {
        Self {
            step,
            max_frame_delta,
            max_substeps,
            accumulator: 0.0,
            dropped: 0.0,
        }
    }

    /// Create a stepper from a controller config.
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.fixed_step,
            config.max_frame_delta,
            config.max_substeps,
        )
    }

    /// The fixed step size in seconds.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Time carried over to the next frame, in seconds.
    pub fn accumulated(&self) -> f64 {
        self.accumulator
    }

    /// Total time discarded because the sub-step cap was hit.
    pub fn dropped_time(&self) -> f64 {
        self.dropped
    }

    /// Add a frame delta and return how many fixed steps to run now.
    ///
    /// Negative or non-finite deltas count as zero. When more than
    /// `max_substeps` steps are due, the excess is dropped rather than
    /// carried, so a slow frame never snowballs into slower frames.
    pub fn consume(&mut self, frame_delta: f64) -> u32 {
        let frame_delta = if frame_delta.is_finite() {
            frame_delta.clamp(0.0, self.max_frame_delta)
        } else {
            0.0
        };
        self.accumulator += frame_delta;

        let mut steps = 0;
        while self.accumulator + STEP_TOLERANCE >= self.step {
            if steps >= self.max_substeps {
                self.dropped += self.accumulator;
                self.accumulator = 0.0;
                break;
            }
            self.accumulator -= self.step;
            steps += 1;
        }
        self.accumulator = self.accumulator.max(0.0);

        steps
    }

    /// Forget any accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
