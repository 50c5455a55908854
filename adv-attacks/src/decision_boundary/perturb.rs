//! Step generators. Both work on whole batches; `current` is the adversarial
//! batch being refined and `original` the clean images it must stay close to.

use adv_utils::{
    normal_batch, normalize_samples, safe_norms, sample_dots, sample_norms, scale_samples,
    ImageBatch,
};
use rand::Rng;

/// Random step of length `delta * ‖original - current‖` with its component
/// along `original - current` removed, so it is tangent to the sphere around
/// each original image.
///
/// `noise` supplies the isotropic direction and must have the batch's shape.
pub fn tangent_perturbation(
    delta: f32,
    current: &ImageBatch,
    original: &ImageBatch,
    noise: &ImageBatch,
) -> ImageBatch {
    let diff = original - current;
    let diff_norms = sample_norms(&diff.view());
    let perturb = scale_samples(&normalize_samples(noise), &diff_norms.mapv(|n| n * delta));

    // A zero-length diff has no direction; the perturbation is already zero there.
    let direction = scale_samples(&diff, &safe_norms(&diff).mapv(|n| 1.0 / n));
    let along = sample_dots(&perturb, &direction);
    perturb - scale_samples(&direction, &along)
}

/// Blends a tangent step with `diff = original - current` so the moved point
/// stays at a controlled distance from the original:
/// `((1 - sqrt(1 + delta²)) * diff + tangent) / sqrt(1 + delta²)`.
pub fn hypotenuse_blend(
    delta: f32,
    current: &ImageBatch,
    original: &ImageBatch,
    tangent: &ImageBatch,
) -> ImageBatch {
    let hypotenuse = (1.0 + delta * delta).sqrt();
    let diff = original - current;
    (diff * (1.0 - hypotenuse) + tangent) / hypotenuse
}

/// Orthogonal step: a fresh Gaussian direction made tangent, then blended.
pub fn orthogonal_perturbation<R: Rng>(
    delta: f32,
    current: &ImageBatch,
    original: &ImageBatch,
    rng: &mut R,
) -> ImageBatch {
    let noise = normal_batch(current.dim(), rng);
    let tangent = tangent_perturbation(delta, current, original, &noise);
    hypotenuse_blend(delta, current, original, &tangent)
}

/// Forward step: `epsilon` along the unit direction from `current` to
/// `original`. Samples already at the original get a zero step.
pub fn forward_perturbation(
    epsilon: f32,
    current: &ImageBatch,
    original: &ImageBatch,
) -> ImageBatch {
    let direction = original - current;
    let inv = safe_norms(&direction).mapv(|n| epsilon / n);
    scale_samples(&direction, &inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adv_utils::{l2_distances, uniform_batch};
    use approx::assert_abs_diff_eq;
    use ndarray::{Array4, Axis};
    use rand::{rngs::StdRng, SeedableRng};

    fn batch_pair(seed: u64) -> (ImageBatch, ImageBatch) {
        let mut rng = StdRng::seed_from_u64(seed);
        let original = uniform_batch((3, 2, 4, 4), &mut rng);
        let current = uniform_batch((3, 2, 4, 4), &mut rng);
        (current, original)
    }

    #[test]
    fn test_tangent_has_requested_length() {
        let (current, original) = batch_pair(1);
        let noise = normal_batch(current.dim(), &mut StdRng::seed_from_u64(2));
        let tangent = tangent_perturbation(0.3, &current, &original, &noise);
        let tangent_norms = sample_norms(&tangent.view());
        let distances = l2_distances(&original, &current);
        for (t, d) in tangent_norms.iter().zip(distances.iter()) {
            // Removing the radial component can only shorten the step.
            assert!(*t <= 0.3 * d + 1e-5);
            assert!(*t > 0.0);
        }
    }

    #[test]
    fn test_blend_keeps_distance_for_small_delta() {
        let (current, original) = batch_pair(3);
        let mut rng = StdRng::seed_from_u64(4);
        let step = orthogonal_perturbation(0.01, &current, &original, &mut rng);
        let moved = &current + &step;
        let before = l2_distances(&original, &current);
        let after = l2_distances(&original, &moved);
        for (b, a) in before.iter().zip(after.iter()) {
            assert_abs_diff_eq!(a / b, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_orthogonal_step_is_zero_at_the_original() {
        let (_, original) = batch_pair(5);
        let mut rng = StdRng::seed_from_u64(6);
        let step = orthogonal_perturbation(0.5, &original, &original, &mut rng);
        assert!(step.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_forward_step_has_length_epsilon() {
        let (current, original) = batch_pair(7);
        let step = forward_perturbation(0.05, &current, &original);
        for norm in sample_norms(&step.view()).iter() {
            assert_abs_diff_eq!(*norm, 0.05, epsilon = 1e-6);
        }
        // It points from current towards original.
        let towards = sample_dots(&step, &(&original - &current));
        assert!(towards.iter().all(|&d| d > 0.0));
    }

    #[test]
    fn test_forward_step_guards_zero_direction() {
        let (current, mut original) = batch_pair(8);
        original
            .index_axis_mut(Axis(0), 1)
            .assign(&current.index_axis(Axis(0), 1));
        let step = forward_perturbation(0.1, &current, &original);
        assert!(step.iter().all(|v| v.is_finite()));
        assert!(step.index_axis(Axis(0), 1).iter().all(|&v| v == 0.0));
        let zeros = Array4::<f32>::zeros((1, 1, 2, 2));
        assert!(forward_perturbation(0.1, &zeros, &zeros)
            .iter()
            .all(|&v| v == 0.0));
    }
}
