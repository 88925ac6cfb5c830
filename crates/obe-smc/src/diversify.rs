use nalgebra::{DMatrix, DVector};
use obe_core::RngHandle;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::KernelConfig;
use crate::prior::Bounds;
use crate::summary::{weighted_covariance, weighted_mean};

/// How the jitter scale was obtained for a diversification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KernelFactor {
    /// Cholesky factor of the weighted covariance.
    Cholesky,
    /// Cholesky factor after adding a diagonal ridge.
    Ridge,
    /// Per-parameter standard deviations only.
    Diagonal,
    /// Shrinkage of one: particles left untouched.
    Disabled,
}

/// Outcome of a diversification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelReport {
    /// Factorization used for the jitter.
    pub factor: KernelFactor,
    /// Number of coordinates reflected back into the prior bounds.
    pub reflected: usize,
}

/// Liu-West shrinkage kernel.
///
/// Each particle moves to `a x + (1 - a) mu + sqrt(1 - a^2) L z` with
/// `z ~ N(0, I)` and `L L^T` the weighted covariance, which keeps the cloud's
/// mean and covariance unchanged in expectation.
pub fn liu_west(
    particles: &mut [Vec<f64>],
    weights: &[f64],
    bounds: &[Bounds],
    config: &KernelConfig,
    rng: &mut RngHandle,
) -> KernelReport {
    let a = config.shrinkage;
    if a >= 1.0 || particles.is_empty() {
        return KernelReport {
            factor: KernelFactor::Disabled,
            reflected: 0,
        };
    }
    let mean = DVector::from_vec(weighted_mean(particles, weights));
    let covariance = weighted_covariance(particles, weights);
    let (factor, lower) = jitter_factor(covariance, config.ridge);
    let spread = (1.0 - a * a).sqrt();
    let dimension = mean.len();

    let mut reflected = 0usize;
    for row in particles.iter_mut() {
        let z = DVector::from_fn(dimension, |_, _| rng.standard_normal());
        let jitter = &lower * z;
        for (j, value) in row.iter_mut().enumerate() {
            let moved = a * *value + (1.0 - a) * mean[j] + spread * jitter[j];
            let bound = bounds.get(j).copied().unwrap_or_else(Bounds::unbounded);
            *value = if bound.contains(moved) {
                moved
            } else {
                reflected += 1;
                bound.reflect(moved)
            };
        }
    }
    KernelReport { factor, reflected }
}

fn jitter_factor(covariance: DMatrix<f64>, ridge: f64) -> (KernelFactor, DMatrix<f64>) {
    if let Some(cholesky) = covariance.clone().cholesky() {
        return (KernelFactor::Cholesky, cholesky.l());
    }
    let dimension = covariance.nrows();
    let scale = (covariance.trace() / dimension.max(1) as f64).abs();
    if scale > 0.0 {
        let regularized = &covariance + DMatrix::<f64>::identity(dimension, dimension) * (ridge * scale);
        if let Some(cholesky) = regularized.cholesky() {
            warn!(ridge = ridge * scale, "covariance not positive definite, added ridge");
            return (KernelFactor::Ridge, cholesky.l());
        }
    }
    warn!("covariance factorization failed, falling back to diagonal jitter");
    let diagonal = DMatrix::from_diagonal(&covariance.diagonal().map(|v| v.max(0.0).sqrt()));
    (KernelFactor::Diagonal, diagonal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_particles_fall_back_without_moving() {
        let mut particles = vec![vec![1.0, 2.0]; 10];
        let weights = vec![0.1; 10];
        let bounds = vec![Bounds::unbounded(); 2];
        let mut rng = RngHandle::from_seed(4);
        let report = liu_west(
            &mut particles,
            &weights,
            &bounds,
            &KernelConfig::default(),
            &mut rng,
        );
        assert_eq!(report.factor, KernelFactor::Diagonal);
        assert!(particles.iter().all(|row| row == &vec![1.0, 2.0]));
    }

    #[test]
    fn jitter_respects_bounds() {
        let mut rng = RngHandle::from_seed(8);
        let mut particles: Vec<Vec<f64>> = (0..500).map(|i| vec![(i % 2) as f64]).collect();
        let weights = vec![1.0 / 500.0; 500];
        let bounds = vec![Bounds::new(0.0, 1.0)];
        let config = KernelConfig {
            shrinkage: 0.5,
            ..KernelConfig::default()
        };
        let report = liu_west(&mut particles, &weights, &bounds, &config, &mut rng);
        assert_eq!(report.factor, KernelFactor::Cholesky);
        assert!(report.reflected > 0);
        assert!(particles.iter().all(|row| (0.0..=1.0).contains(&row[0])));
    }
}
