use thiserror::Error;

/// Invalid invocations of an attack. Classifier failures are not wrapped here;
/// they surface as the classifier's own error with stage context attached.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttackError {
    #[error("Target labels must be provided for a targeted attack")]
    MissingTargetLabels,
    #[error("Expected {expected} {which} labels, got {got}")]
    LabelCountMismatch {
        which: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Original images must lie in [0, 1], found values in [{min}, {max}]")]
    PixelRange { min: f32, max: f32 },
    #[error("Classifier returned {got} predictions for a batch of {expected}")]
    PredictionCountMismatch { expected: usize, got: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
