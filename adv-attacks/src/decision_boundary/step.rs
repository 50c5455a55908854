use adv_utils::success_rate;
use ndarray::Array1;

/// Below this success rate the step shrinks.
pub const SHRINK_BELOW: f32 = 0.2;
/// Above this success rate the step grows.
pub const GROW_ABOVE: f32 = 0.5;
/// Smallest step the controller will hand out.
pub const MIN_STEP: f32 = 1e-12;
/// Largest step the controller will hand out. Steps are relative to the
/// per-sample distance, so anything past this only overflows the norms.
pub const MAX_STEP: f32 = 1e6;

/// Adapts a single step size shared by the whole batch from the fraction of
/// samples that succeeded in the last trial.
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    step_adapt: f32,
}

impl StepController {
    pub fn new(step_adapt: f32) -> Self {
        Self { step_adapt }
    }

    /// Shrinks, grows or keeps `step`, then keeps it within
    /// `[MIN_STEP, MAX_STEP]`.
    pub fn adapt(&self, step: f32, success: &Array1<bool>) -> f32 {
        let rate = success_rate(success);
        let step = if rate < SHRINK_BELOW {
            step * self.step_adapt
        } else if rate > GROW_ABOVE {
            step / self.step_adapt
        } else {
            step
        };
        step.clamp(MIN_STEP, MAX_STEP)
    }
}
