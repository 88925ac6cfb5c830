use obe_core::RngHandle;

use crate::config::ResampleScheme;

impl ResampleScheme {
    /// Draws `count` ancestor indices proportionally to `weights`.
    ///
    /// `weights` must be non-negative and sum to one.
    pub fn ancestors(&self, weights: &[f64], count: usize, rng: &mut RngHandle) -> Vec<usize> {
        match self {
            ResampleScheme::Systematic => systematic(weights, count, rng),
            ResampleScheme::Multinomial => multinomial(weights, count, rng),
        }
    }
}

/// Systematic resampling: one uniform offset and `count` evenly spaced pointers.
pub fn systematic(weights: &[f64], count: usize, rng: &mut RngHandle) -> Vec<usize> {
    if weights.is_empty() || count == 0 {
        return Vec::new();
    }
    let step = 1.0 / count as f64;
    let offset = rng.unit() * step;
    let last = last_positive(weights);
    let mut ancestors = Vec::with_capacity(count);
    let mut cumulative = weights[0];
    let mut source = 0usize;
    for slot in 0..count {
        let pointer = offset + slot as f64 * step;
        while cumulative <= pointer && source < last {
            source += 1;
            cumulative += weights[source];
        }
        ancestors.push(source);
    }
    ancestors
}

/// Multinomial resampling: `count` independent categorical draws.
pub fn multinomial(weights: &[f64], count: usize, rng: &mut RngHandle) -> Vec<usize> {
    if weights.is_empty() || count == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_sum(weights);
    let last = last_positive(weights);
    (0..count)
        .map(|_| {
            let draw = rng.unit();
            cumulative.partition_point(|&c| c <= draw).min(last)
        })
        .collect()
}

/// Highest index carrying weight; rounding in the running sum must never
/// push a pointer past it onto a trailing zero-weight particle.
fn last_positive(weights: &[f64]) -> usize {
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
}

fn cumulative_sum(weights: &[f64]) -> Vec<f64> {
    let mut running = 0.0;
    weights
        .iter()
        .map(|w| {
            running += w;
            running
        })
        .collect()
}
