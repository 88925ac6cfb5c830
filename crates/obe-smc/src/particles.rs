use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{Measurement, Prediction, RngHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SmcConfig;
use crate::diversify::{self, KernelReport};
use crate::likelihood::NoiseModel;
use crate::prior::{Bounds, Prior};
use crate::summary::{self, CredibleInterval, ParameterSummary};

/// Health of the particle cloud with respect to the resample threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionState {
    /// Effective sample size at or above the threshold.
    Ready,
    /// Effective sample size below the threshold; resampling is due.
    Degenerate,
}

/// Diagnostics returned by [`ParticleDistribution::update`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// `ln sum_i w_i L_i` for the absorbed measurement.
    pub log_evidence: f64,
    /// Effective sample size before the update.
    pub ess_before: f64,
    /// Effective sample size after the update.
    pub ess_after: f64,
}

/// Serializable copy of the particle state, sufficient to resume a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    /// Parameter names in order.
    pub names: Vec<String>,
    /// Support used for boundary reflection.
    pub bounds: Vec<Bounds>,
    /// Prior the cloud was drawn from, if any.
    #[serde(default)]
    pub prior: Option<Prior>,
    /// Particle rows (N x D).
    pub particles: Vec<Vec<f64>>,
    /// Normalized weights (N).
    pub weights: Vec<f64>,
}

/// Weighted particle approximation of the posterior over model parameters.
///
/// Particles and weights are parallel arrays; `particles.len() ==
/// weights.len()` and the weights sum to one after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleDistribution {
    names: Vec<String>,
    bounds: Vec<Bounds>,
    prior: Option<Prior>,
    particles: Vec<Vec<f64>>,
    weights: Vec<f64>,
    config: SmcConfig,
}

impl ParticleDistribution {
    /// Draws `config.particles` particles from `prior` with uniform weights.
    pub fn initialize(
        prior: Prior,
        config: &SmcConfig,
        rng: &mut RngHandle,
    ) -> Result<Self, ObeError> {
        config.validate()?;
        let count = config.particles;
        let particles = (0..count)
            .map(|_| prior.sample(rng))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            particles = count,
            dimension = prior.dimension(),
            "initialized particle cloud from prior"
        );
        Ok(Self {
            names: prior.names(),
            bounds: prior.bounds(),
            prior: Some(prior),
            particles,
            weights: vec![1.0 / count as f64; count],
            config: config.clone(),
        })
    }

    /// Uses caller supplied samples as the initial cloud with uniform weights.
    ///
    /// `config.particles` is ignored; the sample count defines N.
    pub fn from_samples(
        names: Vec<String>,
        samples: Vec<Vec<f64>>,
        bounds: Vec<Bounds>,
        config: &SmcConfig,
    ) -> Result<Self, ObeError> {
        let count = samples.len();
        let weights = vec![1.0 / count.max(1) as f64; count];
        Self::from_snapshot(
            DistributionSnapshot {
                names,
                bounds,
                prior: None,
                particles: samples,
                weights,
            },
            config,
        )
    }

    /// Rebuilds a distribution from a snapshot, validating every invariant.
    pub fn from_snapshot(
        snapshot: DistributionSnapshot,
        config: &SmcConfig,
    ) -> Result<Self, ObeError> {
        let mut config = config.clone();
        config.particles = snapshot.particles.len();
        config.validate()?;

        let dimension = snapshot.names.len();
        if dimension == 0 || snapshot.bounds.len() != dimension {
            return Err(ObeError::Configuration(
                ErrorInfo::new("dimension-mismatch", "names and bounds must share one dimension")
                    .with_context("names", dimension)
                    .with_context("bounds", snapshot.bounds.len()),
            ));
        }
        if let Some(prior) = &snapshot.prior {
            if prior.dimension() != dimension {
                return Err(ObeError::Configuration(
                    ErrorInfo::new("dimension-mismatch", "prior dimension differs from snapshot")
                        .with_context("prior", prior.dimension())
                        .with_context("snapshot", dimension),
                ));
            }
        }
        if snapshot.weights.len() != snapshot.particles.len() {
            return Err(ObeError::Configuration(
                ErrorInfo::new("weights-length", "one weight per particle required")
                    .with_context("particles", snapshot.particles.len())
                    .with_context("weights", snapshot.weights.len()),
            ));
        }
        for (index, row) in snapshot.particles.iter().enumerate() {
            if row.len() != dimension {
                return Err(ObeError::Configuration(
                    ErrorInfo::new("dimension-mismatch", "particle has wrong dimension")
                        .with_context("particle", index)
                        .with_context("expected", dimension)
                        .with_context("actual", row.len()),
                ));
            }
            for (value, bound) in row.iter().zip(&snapshot.bounds) {
                if !value.is_finite() || !bound.contains(*value) {
                    return Err(ObeError::Configuration(
                        ErrorInfo::new("particle-out-of-bounds", "particle outside its support")
                            .with_context("particle", index)
                            .with_context("value", value),
                    ));
                }
            }
        }
        let total: f64 = snapshot.weights.iter().sum();
        if snapshot.weights.iter().any(|w| !w.is_finite() || *w < 0.0) || !(total > 0.0) {
            return Err(ObeError::configuration(
                "weights-invalid",
                "weights must be finite, non-negative and not all zero",
            ));
        }
        // keep stored weights bit-exact when already normalized
        let weights = if (total - 1.0).abs() <= 1e-12 {
            snapshot.weights
        } else {
            snapshot.weights.iter().map(|w| w / total).collect()
        };
        Ok(Self {
            names: snapshot.names,
            bounds: snapshot.bounds,
            prior: snapshot.prior,
            particles: snapshot.particles,
            weights,
            config,
        })
    }

    /// Copies the state into a serializable snapshot.
    pub fn snapshot(&self) -> DistributionSnapshot {
        DistributionSnapshot {
            names: self.names.clone(),
            bounds: self.bounds.clone(),
            prior: self.prior.clone(),
            particles: self.particles.clone(),
            weights: self.weights.clone(),
        }
    }

    /// Number of particles (N).
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Returns `true` if the cloud holds no particles (never after construction).
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of parameters (D).
    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    /// Parameter names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Particle rows, read only.
    pub fn particles(&self) -> &[Vec<f64>] {
        &self.particles
    }

    /// Normalized weights, read only.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Per-parameter support.
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Prior the cloud was drawn from, if any.
    pub fn prior(&self) -> Option<&Prior> {
        self.prior.as_ref()
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SmcConfig {
        &self.config
    }

    /// `1 / sum(w_i^2)`.
    pub fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self.weights.iter().map(|w| w * w).sum();
        if sum_sq > 0.0 {
            1.0 / sum_sq
        } else {
            0.0
        }
    }

    /// Whether the cloud has degenerated below the resample threshold.
    pub fn state(&self) -> DistributionState {
        let threshold = self.config.resample_threshold * self.len() as f64;
        if self.effective_sample_size() < threshold {
            DistributionState::Degenerate
        } else {
            DistributionState::Ready
        }
    }

    /// Shorthand for `state() == Degenerate`.
    pub fn needs_resample(&self) -> bool {
        self.state() == DistributionState::Degenerate
    }

    /// Multiplies every weight by its likelihood and renormalizes.
    ///
    /// `log_likelihoods[i]` is `ln L_i` for particle `i`. The weights are
    /// only replaced when the update is numerically sound; on error the
    /// distribution is unchanged.
    pub fn update(&mut self, log_likelihoods: &[f64]) -> Result<UpdateReport, ObeError> {
        self.apply(log_likelihoods, None)
    }

    /// When `residuals` is given, the evidence floor is checked against
    /// `ln Σ w_i exp(residual_i)` so only the residual part can trip it.
    fn apply(
        &mut self,
        log_likelihoods: &[f64],
        residuals: Option<&[f64]>,
    ) -> Result<UpdateReport, ObeError> {
        if log_likelihoods.len() != self.len() {
            return Err(ObeError::Configuration(
                ErrorInfo::new("likelihood-length", "one likelihood per particle required")
                    .with_context("particles", self.len())
                    .with_context("likelihoods", log_likelihoods.len()),
            ));
        }
        if let Some(index) = log_likelihoods
            .iter()
            .position(|ll| ll.is_nan() || *ll == f64::INFINITY)
        {
            return Err(ObeError::NumericalDegeneracy(
                ErrorInfo::new("likelihood-invalid", "likelihood is NaN or infinite")
                    .with_context("particle", index),
            ));
        }

        let scratch: Vec<f64> = self
            .weights
            .iter()
            .zip(log_likelihoods)
            .map(|(&w, &ll)| if w > 0.0 { w.ln() + ll } else { f64::NEG_INFINITY })
            .collect();
        let peak = scratch.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if peak == f64::NEG_INFINITY {
            warn!("measurement has zero likelihood under every particle");
            return Err(ObeError::NumericalDegeneracy(
                ErrorInfo::new("weights-collapsed", "all particle weights collapsed to zero")
                    .with_hint("reset the distribution or skip this measurement"),
            ));
        }
        let log_evidence = log_sum_exp(&scratch, peak);
        let residual_evidence = match residuals {
            Some(residuals) => {
                let shifted: Vec<f64> = self
                    .weights
                    .iter()
                    .zip(residuals)
                    .map(|(&w, &r)| if w > 0.0 { w.ln() + r } else { f64::NEG_INFINITY })
                    .collect();
                let shifted_peak = shifted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                log_sum_exp(&shifted, shifted_peak)
            }
            None => log_evidence,
        };
        if !log_evidence.is_finite() || residual_evidence < self.config.evidence_floor {
            warn!(
                log_evidence,
                residual_evidence,
                floor = self.config.evidence_floor,
                "measurement rejected"
            );
            return Err(ObeError::NumericalDegeneracy(
                ErrorInfo::new(
                    "evidence-underflow",
                    "measurement is impossible under the current distribution",
                )
                .with_context("log_evidence", log_evidence)
                .with_context("residual_evidence", residual_evidence)
                .with_context("floor", self.config.evidence_floor)
                .with_hint("reset the distribution or skip this measurement"),
            ));
        }

        let ess_before = self.effective_sample_size();
        let mut weights: Vec<f64> = scratch.iter().map(|s| (s - log_evidence).exp()).collect();
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }
        self.weights = weights;
        let ess_after = self.effective_sample_size();
        Ok(UpdateReport {
            log_evidence,
            ess_before,
            ess_after,
        })
    }

    /// Weighs each particle's prediction of `measurement` under `noise` and
    /// applies the resulting likelihoods.
    ///
    /// `predictions[i]` is the model output for particle `i` at the
    /// measured setting.
    pub fn update_with(
        &mut self,
        predictions: &[Prediction],
        measurement: &Measurement,
        noise: &NoiseModel,
    ) -> Result<UpdateReport, ObeError> {
        let terms = noise.likelihood_terms(predictions, measurement)?;
        let log_likelihoods: Vec<f64> = terms.iter().map(|t| t.log_likelihood).collect();
        let residuals: Vec<f64> = terms.iter().map(|t| t.residual).collect();
        self.apply(&log_likelihoods, Some(&residuals))
    }

    /// Replaces the cloud with N draws proportional to the weights.
    ///
    /// Weights become exactly `1 / N`.
    pub fn resample(&mut self, rng: &mut RngHandle) {
        let count = self.len();
        let ancestors = self.config.scheme.ancestors(&self.weights, count, rng);
        self.particles = ancestors
            .into_iter()
            .map(|index| self.particles[index].clone())
            .collect();
        self.weights = vec![1.0 / count as f64; count];
    }

    /// Applies the Liu-West kernel to restore diversity after resampling.
    pub fn diversify(&mut self, rng: &mut RngHandle) -> KernelReport {
        diversify::liu_west(
            &mut self.particles,
            &self.weights,
            &self.bounds,
            &self.config.kernel,
            rng,
        )
    }

    /// Weighted mean per parameter.
    pub fn mean(&self) -> Vec<f64> {
        summary::weighted_mean(&self.particles, &self.weights)
    }

    /// Weighted covariance, row major.
    pub fn covariance(&self) -> Vec<Vec<f64>> {
        summary::matrix_rows(&summary::weighted_covariance(&self.particles, &self.weights))
    }

    /// Weighted standard deviation per parameter.
    pub fn std(&self) -> Vec<f64> {
        let covariance = summary::weighted_covariance(&self.particles, &self.weights);
        covariance
            .diagonal()
            .iter()
            .map(|v| v.max(0.0).sqrt())
            .collect()
    }

    /// Central credible interval per parameter.
    pub fn credible_intervals(&self, mass: f64) -> Vec<CredibleInterval> {
        (0..self.dimension())
            .map(|column| summary::credible_interval(&self.particles, &self.weights, column, mass))
            .collect()
    }

    /// Recomputes every point estimate.
    pub fn summary(&self) -> ParameterSummary {
        let covariance = summary::weighted_covariance(&self.particles, &self.weights);
        ParameterSummary {
            names: self.names.clone(),
            mean: self.mean(),
            std: covariance
                .diagonal()
                .iter()
                .map(|v| v.max(0.0).sqrt())
                .collect(),
            covariance: summary::matrix_rows(&covariance),
            credible_intervals: self.credible_intervals(self.config.credible_mass),
            effective_sample_size: self.effective_sample_size(),
            particles: self.len(),
        }
    }
}

fn log_sum_exp(values: &[f64], peak: f64) -> f64 {
    peak + values.iter().map(|v| (v - peak).exp()).sum::<f64>().ln()
}
