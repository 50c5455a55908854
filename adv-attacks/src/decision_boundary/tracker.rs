use adv_utils::{l2_distances, ImageBatch};
use ndarray::{Array1, Axis};
use std::collections::VecDeque;

/// Closest adversarial image seen so far for every sample.
///
/// Samples that never became adversarial keep the original image and an
/// infinite distance.
#[derive(Debug, Clone)]
pub struct BestTracker {
    images: ImageBatch,
    distances: Array1<f32>,
}

impl BestTracker {
    pub fn new(original: &ImageBatch) -> Self {
        Self {
            images: original.clone(),
            distances: Array1::from_elem(original.len_of(Axis(0)), f32::INFINITY),
        }
    }

    /// Records every eligible candidate strictly closer to its original than
    /// the stored best. Returns the number of samples that improved.
    pub fn update(
        &mut self,
        candidates: &ImageBatch,
        original: &ImageBatch,
        eligible: &Array1<bool>,
    ) -> usize {
        let distances = l2_distances(candidates, original);
        let mut improved = 0;
        for (i, (&distance, &ok)) in distances.iter().zip(eligible.iter()).enumerate() {
            if ok && distance < self.distances[i] {
                self.distances[i] = distance;
                self.images
                    .index_axis_mut(Axis(0), i)
                    .assign(&candidates.index_axis(Axis(0), i));
                improved += 1;
            }
        }
        improved
    }

    pub fn images(&self) -> &ImageBatch {
        &self.images
    }

    pub fn distances(&self) -> &Array1<f32> {
        &self.distances
    }

    pub fn into_parts(self) -> (ImageBatch, Array1<f32>) {
        (self.images, self.distances)
    }
}

/// Stops the attack once the best distances have improved by less than
/// `threshold` on average over the last `patience` iterations.
///
/// Improvement is the mean drop over samples that had a finite best distance
/// both `patience` iterations ago and now, so a sample found for the first
/// time never counts as a regression. Without such samples the check never
/// fires.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    threshold: f32,
    history: VecDeque<Array1<f32>>,
}

impl EarlyStopping {
    pub fn new(patience: usize, threshold: f32) -> Self {
        Self {
            patience,
            threshold,
            history: VecDeque::with_capacity(patience + 1),
        }
    }

    /// Call once per completed iteration. Returns `true` to stop.
    pub fn check(&mut self, best_distances: &Array1<f32>) -> bool {
        let stale = match self.history.front() {
            Some(oldest) if self.history.len() == self.patience => {
                mean_improvement(oldest, best_distances)
                    .map_or(false, |improvement| improvement < self.threshold)
            }
            _ => false,
        };
        self.history.push_back(best_distances.clone());
        if self.history.len() > self.patience {
            self.history.pop_front();
        }
        stale
    }
}

/// Mean of `before - after` over samples finite in both.
fn mean_improvement(before: &Array1<f32>, after: &Array1<f32>) -> Option<f32> {
    let (sum, count) = before
        .iter()
        .zip(after.iter())
        .filter(|(b, a)| b.is_finite() && a.is_finite())
        .fold((0.0f32, 0usize), |(s, c), (b, a)| (s + (b - a), c + 1));
    (count > 0).then(|| sum / count as f32)
}
