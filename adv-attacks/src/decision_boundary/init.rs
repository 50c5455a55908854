use super::{Objective, Oracle, Stage};
use crate::Classifier;
use adv_utils::{select_samples, uniform_batch, ImageBatch};
use anyhow::Result;
use ndarray::{Array1, Axis};
use rand::Rng;
use tracing::trace;

/// Starting point found by random search.
#[derive(Debug, Clone)]
pub struct Initialization {
    pub images: ImageBatch,
    /// Whether each sample met the objective on the last query.
    pub success: Array1<bool>,
    pub trials: usize,
}

/// Draws uniform random images for every sample that is not yet adversarial,
/// for at most `max_trials` rounds. Samples that never succeed keep their last
/// random draw (or the original image if no round ran).
pub fn initialize<C, R>(
    oracle: &mut Oracle<'_, C>,
    original: &ImageBatch,
    objective: &Objective<'_>,
    max_trials: usize,
    rng: &mut R,
) -> Result<Initialization>
where
    C: Classifier + ?Sized,
    R: Rng,
{
    let batch_size = original.len_of(Axis(0));
    let mut images = original.clone();
    let mut success = Array1::from_elem(batch_size, false);
    let mut trials = 0;

    while trials < max_trials && success.iter().any(|&s| !s) {
        let needs_update = success.mapv(|s| !s);
        let random = uniform_batch(original.dim(), rng);
        select_samples(&needs_update, &mut images, &random)?;

        let predictions = oracle.query(&images, Stage::Initialization)?;
        success = objective.evaluate(&predictions);
        trials += 1;
        trace!(
            "Initialization trial {}: {}/{} samples adversarial",
            trials,
            success.iter().filter(|&&s| s).count(),
            batch_size
        );
    }

    Ok(Initialization {
        images,
        success,
        trials,
    })
}
