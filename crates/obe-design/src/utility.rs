use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::RngHandle;
use obe_smc::{NoiseModel, ResampleScheme};

use crate::evaluator::PredictionMatrix;

/// Expected information gain per candidate.
///
/// For candidate `t` the score is `sum_k 0.5 ln(1 + Var_w[y_tk] / s2_tk) /
/// cost_t`, where `Var_w` is the weighted variance of the predictions across
/// particles and `s2_tk` the weighted mean noise variance. The score grows
/// with prediction spread and shrinks with noise and cost.
pub fn score(
    predictions: &PredictionMatrix,
    weights: &[f64],
    noise: &NoiseModel,
    costs: Option<&[f64]>,
) -> Result<Vec<f64>, ObeError> {
    if weights.len() != predictions.particles() {
        return Err(ObeError::Configuration(
            ErrorInfo::new("weights-length", "one weight per predicted particle required")
                .with_context("particles", predictions.particles())
                .with_context("weights", weights.len()),
        ));
    }
    if let Some(costs) = costs {
        validate_costs(costs, predictions.settings())?;
    }

    let mut utilities = Vec::with_capacity(predictions.settings());
    for setting in 0..predictions.settings() {
        let mut gain = 0.0;
        for channel in 0..predictions.channels() {
            let mut mean = 0.0;
            let mut noise_variance = 0.0;
            for (particle, &w) in weights.iter().enumerate() {
                mean += w * predictions.value(particle, setting, channel);
                let sigma = noise.sigma(channel, predictions.noise(particle, setting, channel))?;
                noise_variance += w * sigma * sigma;
            }
            let variance: f64 = weights
                .iter()
                .enumerate()
                .map(|(particle, &w)| {
                    let d = predictions.value(particle, setting, channel) - mean;
                    w * d * d
                })
                .sum();
            gain += 0.5 * (variance / noise_variance).ln_1p();
        }
        let cost = costs.map_or(1.0, |costs| costs[setting]);
        utilities.push(gain / cost);
    }
    Ok(utilities)
}

/// Checks one finite, positive cost per candidate.
pub fn validate_costs(costs: &[f64], candidates: usize) -> Result<(), ObeError> {
    if costs.len() != candidates {
        return Err(ObeError::Configuration(
            ErrorInfo::new("costs-length", "one cost per candidate required")
                .with_context("candidates", candidates)
                .with_context("costs", costs.len()),
        ));
    }
    if let Some(index) = costs.iter().position(|c| !(c.is_finite() && *c > 0.0)) {
        return Err(ObeError::Configuration(
            ErrorInfo::new("costs-invalid", "costs must be finite and positive")
                .with_context("candidate", index)
                .with_context("cost", costs[index]),
        ));
    }
    Ok(())
}

/// Weight-proportional subsample of the cloud used to speed up scoring.
///
/// Returns the drawn particle rows with uniform weights. When `draws` is at
/// least the cloud size the full cloud is returned unchanged.
pub fn subsample(
    particles: &[Vec<f64>],
    weights: &[f64],
    draws: usize,
    rng: &mut RngHandle,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    if draws == 0 || draws >= particles.len() {
        return (particles.to_vec(), weights.to_vec());
    }
    let rows = ResampleScheme::Systematic
        .ancestors(weights, draws, rng)
        .into_iter()
        .map(|index| particles[index].clone())
        .collect();
    (rows, vec![1.0 / draws as f64; draws])
}
