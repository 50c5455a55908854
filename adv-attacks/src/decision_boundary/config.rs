use super::{MAX_STEP, MIN_STEP};
use crate::AttackError;
use adv_utils::{dejsonify, parse_hyperparameters};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DecisionBoundaryConfig {
    /// Starting scale of the orthogonal (tangent) step.
    pub initial_delta: f32,
    /// Starting scale of the step towards the original image.
    pub initial_epsilon: f32,
    pub max_delta_trials: usize,
    pub max_epsilon_trials: usize,
    pub max_iterations: usize,
    pub max_initialization_trials: usize,
    /// Step sizes are multiplied by this after a poor trial and divided by it
    /// after a good one. Must lie strictly between 0 and 1.
    pub step_adapt: f32,
    pub targeted: bool,
    pub early_stopping: bool,
    /// Minimum drop of the mean best distance over `early_stopping_patience`
    /// iterations for the attack to keep going.
    pub early_stopping_threshold: f32,
    pub early_stopping_patience: usize,
    /// Log progress at `info` instead of `debug`.
    pub verbose: bool,
    pub seed: u64,
}

impl Default for DecisionBoundaryConfig {
    fn default() -> Self {
        Self {
            initial_delta: 0.1,
            initial_epsilon: 0.1,
            max_delta_trials: 20,
            max_epsilon_trials: 20,
            max_iterations: 1000,
            max_initialization_trials: 100,
            step_adapt: 0.9,
            targeted: false,
            early_stopping: false,
            early_stopping_threshold: 1e-4,
            early_stopping_patience: 10,
            verbose: false,
            seed: 0,
        }
    }
}

impl DecisionBoundaryConfig {
    pub fn from_hyperparameters(hyperparameters: &Option<Map<String, Value>>) -> Result<Self> {
        let config: Self = parse_hyperparameters(hyperparameters)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json_str: &str) -> Result<Self> {
        let config: Self =
            dejsonify(json_str).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Upper bound on classifier queries for one attack invocation.
    pub fn query_budget(&self) -> usize {
        self.max_initialization_trials
            + self.max_iterations * (self.max_delta_trials + self.max_epsilon_trials)
    }

    pub fn validate(&self) -> Result<(), AttackError> {
        let invalid = |msg: String| Err(AttackError::InvalidConfig(msg));
        if !(self.step_adapt > 0.0 && self.step_adapt < 1.0) {
            return invalid(format!(
                "step_adapt must be in (0, 1), got {}",
                self.step_adapt
            ));
        }
        if !(MIN_STEP..=MAX_STEP).contains(&self.initial_delta) {
            return invalid(format!(
                "initial_delta must be in [{:e}, {:e}], got {}",
                MIN_STEP, MAX_STEP, self.initial_delta
            ));
        }
        if !(MIN_STEP..=MAX_STEP).contains(&self.initial_epsilon) {
            return invalid(format!(
                "initial_epsilon must be in [{:e}, {:e}], got {}",
                MIN_STEP, MAX_STEP, self.initial_epsilon
            ));
        }
        if self.early_stopping {
            if self.early_stopping_patience == 0 {
                return invalid("early_stopping_patience must be at least 1".to_string());
            }
            if !(self.early_stopping_threshold >= 0.0) {
                return invalid(format!(
                    "early_stopping_threshold must be non-negative, got {}",
                    self.early_stopping_threshold
                ));
            }
        }
        Ok(())
    }
}
