//! Query-only adversarial attacks against image classifiers.
//!
//! The only attack implemented is the Decision Boundary attack
//! (<https://arxiv.org/abs/1712.04248>), which needs nothing but the hard
//! label a [`Classifier`] predicts for each image.

pub mod classifier;
pub use classifier::{Classifier, FnClassifier, LinearClassifier};
pub mod decision_boundary;
pub use decision_boundary::{
    AttackOutcome, AttackReport, DecisionBoundary, DecisionBoundaryConfig, IterationSnapshot,
};
mod error;
pub use error::AttackError;

pub use adv_utils::{ImageBatch, Labels};
