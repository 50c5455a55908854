use adv_utils::{ImageBatch, Labels};
use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2, Axis};

/// A hard-label oracle: one predicted class index per image in the batch.
///
/// Attacks treat the classifier as read-only and may call it thousands of
/// times, so `predict` should be deterministic for a fixed batch.
pub trait Classifier {
    fn predict(&self, batch: &ImageBatch) -> Result<Labels>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn predict(&self, batch: &ImageBatch) -> Result<Labels> {
        (**self).predict(batch)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&self, batch: &ImageBatch) -> Result<Labels> {
        (**self).predict(batch)
    }
}

/// Wraps a closure as a [`Classifier`].
pub struct FnClassifier<F>(F);

impl<F> FnClassifier<F>
where
    F: Fn(&ImageBatch) -> Result<Labels>,
{
    pub fn new(predict: F) -> Self {
        Self(predict)
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: Fn(&ImageBatch) -> Result<Labels>,
{
    fn predict(&self, batch: &ImageBatch) -> Result<Labels> {
        (self.0)(batch)
    }
}

/// Predicts `argmax(W · flatten(x) + b)` for every image `x`.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    /// `(num_classes, C * H * W)`
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearClassifier {
    pub fn new(weights: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weights.nrows() == 0 {
            return Err(anyhow!("Linear classifier needs at least one class"));
        }
        if weights.nrows() != bias.len() {
            return Err(anyhow!(
                "Weights have {} rows but bias has {} entries",
                weights.nrows(),
                bias.len()
            ));
        }
        Ok(Self { weights, bias })
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn logits(&self, batch: &ImageBatch) -> Result<Array2<f32>> {
        let n = batch.len_of(Axis(0));
        let features = if n == 0 { 0 } else { batch.len() / n };
        if n > 0 && features != self.num_features() {
            return Err(anyhow!(
                "Images have {} features, classifier expects {}",
                features,
                self.num_features()
            ));
        }
        let flat = Array2::from_shape_vec(
            (n, self.num_features()),
            batch.iter().copied().collect(),
        )?;
        Ok(flat.dot(&self.weights.t()) + &self.bias)
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, batch: &ImageBatch) -> Result<Labels> {
        let logits = self.logits(batch)?;
        Ok(logits.outer_iter().map(|row| argmax(row.iter())).collect())
    }
}

/// Index of the first maximum.
fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_idx, best), (idx, &v)| {
            if v > best {
                (idx, v)
            } else {
                (best_idx, best)
            }
        })
        .0
}
