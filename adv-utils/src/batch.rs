use anyhow::{anyhow, Result};
use ndarray::{Array, Array1, Array4, ArrayView4, Axis};
use rand::Rng;
use rand_distr::StandardNormal;

/// A batch of images laid out as `(N, C, H, W)`.
pub type ImageBatch = Array4<f32>;
/// One class index per sample.
pub type Labels = Array1<usize>;

/// L2 norm of every sample in the batch.
pub fn sample_norms(batch: &ArrayView4<f32>) -> Array1<f32> {
    batch
        .outer_iter()
        .map(|sample| sample.iter().map(|v| v * v).sum::<f32>().sqrt())
        .collect()
}

/// L2 distance between matching samples of two batches.
pub fn l2_distances(a: &ImageBatch, b: &ImageBatch) -> Array1<f32> {
    let diff = a - b;
    sample_norms(&diff.view())
}

/// Inner product between matching samples of two batches.
pub fn sample_dots(a: &ImageBatch, b: &ImageBatch) -> Array1<f32> {
    a.outer_iter()
        .zip(b.outer_iter())
        .map(|(x, y)| x.iter().zip(y.iter()).map(|(p, q)| p * q).sum::<f32>())
        .collect()
}

/// Multiplies each sample `i` by `factors[i]`.
pub fn scale_samples(batch: &ImageBatch, factors: &Array1<f32>) -> ImageBatch {
    let factors = factors
        .view()
        .insert_axis(Axis(1))
        .insert_axis(Axis(2))
        .insert_axis(Axis(3));
    batch * &factors
}

/// Per-sample norms with zeros replaced by one, safe to divide by.
pub fn safe_norms(batch: &ImageBatch) -> Array1<f32> {
    sample_norms(&batch.view()).mapv(|n| if n == 0.0 { 1.0 } else { n })
}

/// Rescales every sample to unit L2 norm. All-zero samples are left as zeros.
pub fn normalize_samples(batch: &ImageBatch) -> ImageBatch {
    let inv = safe_norms(batch).mapv(|n| 1.0 / n);
    scale_samples(batch, &inv)
}

/// Clamps every pixel into `[0, 1]`. NaN pixels become 0.
pub fn clamp_unit(batch: &mut ImageBatch) {
    batch.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
}

pub fn within_unit(batch: &ImageBatch) -> bool {
    batch.iter().all(|v| (0.0..=1.0).contains(v))
}

/// Copies sample `i` of `candidates` into `current` wherever `mask[i]` is set.
/// Returns how many samples were replaced.
pub fn select_samples(
    mask: &Array1<bool>,
    current: &mut ImageBatch,
    candidates: &ImageBatch,
) -> Result<usize> {
    if current.dim() != candidates.dim() {
        return Err(anyhow!(
            "Batch shapes differ: {:?} vs {:?}",
            current.dim(),
            candidates.dim()
        ));
    }
    if mask.len() != current.len_of(Axis(0)) {
        return Err(anyhow!(
            "Mask length ({}) does not match batch size ({})",
            mask.len(),
            current.len_of(Axis(0))
        ));
    }
    let mut replaced = 0;
    for (i, &m) in mask.iter().enumerate() {
        if m {
            current
                .index_axis_mut(Axis(0), i)
                .assign(&candidates.index_axis(Axis(0), i));
            replaced += 1;
        }
    }
    Ok(replaced)
}

/// Uniform samples in `[0, 1)` with the given `(N, C, H, W)` shape.
pub fn uniform_batch<R: Rng>(dim: (usize, usize, usize, usize), rng: &mut R) -> ImageBatch {
    Array::from_shape_fn(dim, |_| rng.gen::<f32>())
}

/// Standard normal samples with the given `(N, C, H, W)` shape.
pub fn normal_batch<R: Rng>(dim: (usize, usize, usize, usize), rng: &mut R) -> ImageBatch {
    Array::from_shape_fn(dim, |_| rng.sample::<f32, _>(StandardNormal))
}

/// Fraction of set entries. Empty masks have a rate of zero.
pub fn success_rate(mask: &Array1<bool>) -> f32 {
    if mask.is_empty() {
        return 0.0;
    }
    mask.iter().filter(|&&m| m).count() as f32 / mask.len() as f32
}

/// Mean over the finite entries, `None` when there are none.
pub fn mean_finite(values: &Array1<f32>) -> Option<f32> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}
