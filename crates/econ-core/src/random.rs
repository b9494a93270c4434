//! Random Sampling Helpers
//!
//! Gaussian sampling and weighted selection shared by the action chooser,
//! need generation and the planners.

use rand::Rng;
use std::f32::consts::TAU;

/// Draws from a normal distribution using the Box-Muller transform.
///
/// A non-positive `std_dev` returns `mean`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return mean;
    }
    // 1 - gen() lies in (0, 1], keeping ln away from zero
    let u1: f32 = 1.0 - rng.gen::<f32>();
    let u2: f32 = rng.gen::<f32>();
    let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
    mean + z * std_dev
}

/// Picks an index with probability proportional to its weight.
///
/// Returns `None` when the slice is empty or every weight is non-positive.
pub fn weighted_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f32]) -> Option<usize> {
    let total: f32 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }

    let mut roll: f32 = rng.gen::<f32>() * total;
    let mut last_positive = None;
    for (i, weight) in weights.iter().enumerate() {
        if *weight <= 0.0 {
            continue;
        }
        last_positive = Some(i);
        roll -= weight;
        if roll <= 0.0 {
            return Some(i);
        }
    }

    // Rounding can leave a sliver of roll unconsumed
    last_positive
}

/// Picks a uniformly random element of a slice.
pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[rng.gen_range(0..items.len())])
    }
}
