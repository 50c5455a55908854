use crate::AttackError;
use adv_utils::Labels;
use ndarray::{Array1, Zip};

/// What counts as a successful adversarial prediction for each sample.
#[derive(Debug, Clone, Copy)]
pub enum Objective<'a> {
    /// Any label other than the true one.
    Untargeted { true_labels: &'a Labels },
    /// Exactly the requested label.
    Targeted { target_labels: &'a Labels },
}

impl<'a> Objective<'a> {
    pub fn new(
        targeted: bool,
        true_labels: &'a Labels,
        target_labels: Option<&'a Labels>,
    ) -> Result<Self, AttackError> {
        if targeted {
            target_labels
                .map(|target_labels| Objective::Targeted { target_labels })
                .ok_or(AttackError::MissingTargetLabels)
        } else {
            Ok(Objective::Untargeted { true_labels })
        }
    }

    pub fn labels(&self) -> &'a Labels {
        match *self {
            Objective::Untargeted { true_labels } => true_labels,
            Objective::Targeted { target_labels } => target_labels,
        }
    }

    pub fn is_targeted(&self) -> bool {
        matches!(self, Objective::Targeted { .. })
    }

    /// Per-sample success of `predictions` under this objective.
    pub fn evaluate(&self, predictions: &Labels) -> Array1<bool> {
        match *self {
            Objective::Untargeted { true_labels } => {
                Zip::from(predictions)
                    .and(true_labels)
                    .map_collect(|p, t| p != t)
            }
            Objective::Targeted { target_labels } => {
                Zip::from(predictions)
                    .and(target_labels)
                    .map_collect(|p, t| p == t)
            }
        }
    }
}
