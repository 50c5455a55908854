//! Decision Boundary attack (Brendel et al., <https://arxiv.org/abs/1712.04248>).
//!
//! ## Algorithm
//!
//! 1. **Initialization**: random search for a starting image that already
//!    fools the classifier
//! 2. **Orthogonal steps**: move along the sphere around the original image,
//!    adapting `delta` to the trial success rate
//! 3. **Forward steps**: move straight towards the original image, adapting
//!    `epsilon` the same way
//! 4. **Tracking**: keep the closest adversarial image per sample
//!
//! Steps 2-4 repeat for `max_iterations`, or until early stopping fires. Only
//! the predicted labels are ever used; no gradients or scores.

mod config;
pub use config::DecisionBoundaryConfig;
mod init;
pub use init::{initialize, Initialization};
mod objective;
pub use objective::Objective;
mod oracle;
pub use oracle::{Oracle, Stage};
pub mod perturb;
mod step;
pub use step::{StepController, GROW_ABOVE, MAX_STEP, MIN_STEP, SHRINK_BELOW};
mod tracker;
pub use tracker::{BestTracker, EarlyStopping};

use crate::{AttackError, Classifier};
use adv_utils::{clamp_unit, jsonify, mean_finite, select_samples, ImageBatch, Labels};
use anyhow::Result;
use ndarray::{Array1, Axis, Zip};
use perturb::{forward_perturbation, orthogonal_perturbation};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, trace};

macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Summary of one attack invocation.
///
/// Samples that never became adversarial have an infinite best distance,
/// which serializes as `null`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AttackReport {
    pub best_distances: Vec<f32>,
    /// Whether random initialization alone reached the objective.
    pub initialized: Vec<bool>,
    /// Samples with a finite best distance.
    pub num_successful: usize,
    pub num_queries: usize,
    pub iterations_run: usize,
    pub early_stopped: bool,
    pub final_delta: f32,
    pub final_epsilon: f32,
}

impl AttackReport {
    pub fn to_json(&self) -> Result<String> {
        jsonify(self)
    }
}

#[derive(Debug, Clone)]
pub struct AttackOutcome {
    /// Closest adversarial image per sample; the original where none was found.
    pub images: ImageBatch,
    pub report: AttackReport,
}

/// State after a completed outer iteration, handed to the observer of
/// [`DecisionBoundary::run_with_observer`].
#[derive(Debug)]
pub struct IterationSnapshot<'a> {
    pub iteration: usize,
    pub adv_images: &'a ImageBatch,
    pub best_distances: &'a Array1<f32>,
    pub delta: f32,
    pub epsilon: f32,
    pub num_queries: usize,
}

#[derive(Debug, Clone)]
pub struct DecisionBoundary {
    config: DecisionBoundaryConfig,
}

impl DecisionBoundary {
    pub fn new(config: DecisionBoundaryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecisionBoundaryConfig {
        &self.config
    }

    /// Returns the closest adversarial image found for every sample.
    ///
    /// `target_labels` is required when the attack is targeted and ignored
    /// otherwise.
    pub fn attack<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        original_images: &ImageBatch,
        true_labels: &Labels,
        target_labels: Option<&Labels>,
    ) -> Result<ImageBatch> {
        Ok(self
            .run(classifier, original_images, true_labels, target_labels)?
            .images)
    }

    pub fn run<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        original_images: &ImageBatch,
        true_labels: &Labels,
        target_labels: Option<&Labels>,
    ) -> Result<AttackOutcome> {
        self.run_with_observer(
            classifier,
            original_images,
            true_labels,
            target_labels,
            &mut |_: &IterationSnapshot<'_>| {},
        )
    }

    pub fn run_with_observer<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        original_images: &ImageBatch,
        true_labels: &Labels,
        target_labels: Option<&Labels>,
        observer: &mut dyn FnMut(&IterationSnapshot<'_>),
    ) -> Result<AttackOutcome> {
        let config = &self.config;
        let objective = check_inputs(config, original_images, true_labels, target_labels)?;
        let batch_size = original_images.len_of(Axis(0));
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut oracle = Oracle::new(classifier, batch_size);

        let init = initialize(
            &mut oracle,
            original_images,
            &objective,
            config.max_initialization_trials,
            &mut rng,
        )?;
        let initialized = init.success.clone();
        progress!(
            config.verbose,
            "Initialized {}/{} samples after {} trials",
            initialized.iter().filter(|&&s| s).count(),
            batch_size,
            init.trials
        );

        let mut tracker = BestTracker::new(original_images);
        tracker.update(&init.images, original_images, &init.success);
        let mut search = Search {
            oracle,
            objective,
            controller: StepController::new(config.step_adapt),
            original: original_images,
            adv_images: init.images,
            adversarial: init.success,
        };
        let mut early_stopping = config.early_stopping.then(|| {
            EarlyStopping::new(
                config.early_stopping_patience,
                config.early_stopping_threshold,
            )
        });

        let mut delta = config.initial_delta;
        let mut epsilon = config.initial_epsilon;
        let mut iterations_run = 0;
        let mut early_stopped = false;

        for iteration in 0..config.max_iterations {
            if batch_size == 0 {
                break;
            }
            delta = search.trials(
                Stage::Orthogonal,
                config.max_delta_trials,
                delta,
                |delta, current, original| {
                    orthogonal_perturbation(delta, current, original, &mut rng)
                },
            )?;
            epsilon = search.trials(
                Stage::Forward,
                config.max_epsilon_trials,
                epsilon,
                forward_perturbation,
            )?;
            let improved =
                tracker.update(&search.adv_images, original_images, &search.adversarial);
            iterations_run = iteration + 1;

            progress!(
                config.verbose,
                "Iteration {}: delta = {:.4e}, epsilon = {:.4e}, {} samples improved, mean best distance {:?}",
                iteration,
                delta,
                epsilon,
                improved,
                mean_finite(tracker.distances())
            );
            observer(&IterationSnapshot {
                iteration,
                adv_images: &search.adv_images,
                best_distances: tracker.distances(),
                delta,
                epsilon,
                num_queries: search.oracle.queries(),
            });

            if let Some(early_stopping) = early_stopping.as_mut() {
                if early_stopping.check(tracker.distances()) {
                    progress!(config.verbose, "Early stopping after iteration {}", iteration);
                    early_stopped = true;
                    break;
                }
            }
        }

        let num_queries = search.oracle.queries();
        let (images, distances) = tracker.into_parts();
        let num_successful = distances.iter().filter(|d| d.is_finite()).count();
        debug!(
            "Decision boundary attack finished: {}/{} samples adversarial, {} queries, {} iterations",
            num_successful, batch_size, num_queries, iterations_run
        );

        Ok(AttackOutcome {
            images,
            report: AttackReport {
                best_distances: distances.to_vec(),
                initialized: initialized.to_vec(),
                num_successful,
                num_queries,
                iterations_run,
                early_stopped,
                final_delta: delta,
                final_epsilon: epsilon,
            },
        })
    }
}

/// Rejects invalid invocations before the classifier is ever queried.
fn check_inputs<'a>(
    config: &DecisionBoundaryConfig,
    original_images: &ImageBatch,
    true_labels: &'a Labels,
    target_labels: Option<&'a Labels>,
) -> Result<Objective<'a>, AttackError> {
    let objective = Objective::new(config.targeted, true_labels, target_labels)?;
    let batch_size = original_images.len_of(Axis(0));
    if true_labels.len() != batch_size {
        return Err(AttackError::LabelCountMismatch {
            which: "true",
            expected: batch_size,
            got: true_labels.len(),
        });
    }
    if objective.is_targeted() && objective.labels().len() != batch_size {
        return Err(AttackError::LabelCountMismatch {
            which: "target",
            expected: batch_size,
            got: objective.labels().len(),
        });
    }
    let (min, max) = original_images
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if original_images.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(AttackError::PixelRange { min, max });
    }
    Ok(objective)
}

/// Mutable search state shared by the orthogonal and forward trial loops.
struct Search<'a, C: ?Sized> {
    oracle: Oracle<'a, C>,
    objective: Objective<'a>,
    controller: StepController,
    original: &'a ImageBatch,
    adv_images: ImageBatch,
    /// Samples whose current image meets the objective.
    adversarial: Array1<bool>,
}

impl<'a, C: Classifier + ?Sized> Search<'a, C> {
    /// Runs `trials` rounds of: perturb, clamp, query, adapt the step, and
    /// keep the trial image only for samples where it succeeded. Returns the
    /// adapted step size.
    fn trials<F>(
        &mut self,
        stage: Stage,
        trials: usize,
        mut step: f32,
        mut perturbation: F,
    ) -> Result<f32>
    where
        F: FnMut(f32, &ImageBatch, &ImageBatch) -> ImageBatch,
    {
        for trial in 0..trials {
            let mut trial_images =
                &self.adv_images + &perturbation(step, &self.adv_images, self.original);
            clamp_unit(&mut trial_images);

            let predictions = self.oracle.query(&trial_images, stage)?;
            let success = self.objective.evaluate(&predictions);
            step = self.controller.adapt(step, &success);
            let accepted = select_samples(&success, &mut self.adv_images, &trial_images)?;
            Zip::from(&mut self.adversarial)
                .and(&success)
                .for_each(|adversarial, &s| *adversarial |= s);
            trace!(
                "{} trial {}: {} accepted, step now {:.4e}",
                stage,
                trial,
                accepted,
                step
            );
        }
        Ok(step)
    }
}
