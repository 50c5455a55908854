use crate::{AttackError, Classifier};
use adv_utils::{ImageBatch, Labels};
use anyhow::{Context, Result};
use std::fmt;

/// Which part of the attack issued a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialization,
    Orthogonal,
    Forward,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Initialization => write!(f, "initialization"),
            Stage::Orthogonal => write!(f, "orthogonal step"),
            Stage::Forward => write!(f, "forward step"),
        }
    }
}

/// Counts queries to a classifier and checks every answer covers the batch.
pub struct Oracle<'c, C: ?Sized> {
    classifier: &'c C,
    batch_size: usize,
    queries: usize,
}

impl<'c, C: Classifier + ?Sized> Oracle<'c, C> {
    pub fn new(classifier: &'c C, batch_size: usize) -> Self {
        Self {
            classifier,
            batch_size,
            queries: 0,
        }
    }

    pub fn query(&mut self, batch: &ImageBatch, stage: Stage) -> Result<Labels> {
        self.queries += 1;
        let predictions = self
            .classifier
            .predict(batch)
            .with_context(|| format!("Classifier query {} failed during {}", self.queries, stage))?;
        if predictions.len() != self.batch_size {
            return Err(AttackError::PredictionCountMismatch {
                expected: self.batch_size,
                got: predictions.len(),
            }
            .into());
        }
        Ok(predictions)
    }

    pub fn queries(&self) -> usize {
        self.queries
    }
}
