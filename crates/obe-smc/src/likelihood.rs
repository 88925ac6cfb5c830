use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{Measurement, Prediction};
use serde::{Deserialize, Serialize};

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Measurement noise assumed when weighing particles and scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NoiseModel {
    /// Homoskedastic Gaussian noise shared by every channel.
    Gaussian {
        /// Standard deviation.
        sigma: f64,
    },
    /// Homoskedastic Gaussian noise with one scale per channel.
    PerChannel {
        /// Standard deviation per channel.
        sigma: Vec<f64>,
    },
    /// Heteroskedastic noise taken from the model's own prediction.
    Predicted {
        /// Extra scale added in quadrature to the predicted noise.
        #[serde(default)]
        floor: f64,
    },
}

impl Default for NoiseModel {
    fn default() -> Self {
        NoiseModel::Gaussian { sigma: 1.0 }
    }
}

impl NoiseModel {
    /// Checks the noise description against the model's channel count.
    pub fn validate(&self, channels: usize) -> Result<(), ObeError> {
        let bad_scale = |sigma: f64| {
            ObeError::Configuration(
                ErrorInfo::new("noise-scale", "noise scale must be finite and positive")
                    .with_context("sigma", sigma),
            )
        };
        match self {
            NoiseModel::Gaussian { sigma } => {
                if !(sigma.is_finite() && *sigma > 0.0) {
                    return Err(bad_scale(*sigma));
                }
            }
            NoiseModel::PerChannel { sigma } => {
                if sigma.len() != channels {
                    return Err(ObeError::Configuration(
                        ErrorInfo::new("noise-channels", "one noise scale per channel required")
                            .with_context("expected", channels)
                            .with_context("actual", sigma.len()),
                    ));
                }
                if let Some(&bad) = sigma.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
                    return Err(bad_scale(bad));
                }
            }
            NoiseModel::Predicted { floor } => {
                if !(floor.is_finite() && *floor >= 0.0) {
                    return Err(bad_scale(*floor));
                }
            }
        }
        Ok(())
    }

    /// Noise standard deviation for `channel` given the model's predicted scale.
    pub fn sigma(&self, channel: usize, predicted: Option<f64>) -> Result<f64, ObeError> {
        match self {
            NoiseModel::Gaussian { sigma } => Ok(*sigma),
            NoiseModel::PerChannel { sigma } => sigma.get(channel).copied().ok_or_else(|| {
                ObeError::Configuration(
                    ErrorInfo::new("noise-channels", "no noise scale for channel")
                        .with_context("channel", channel),
                )
            }),
            NoiseModel::Predicted { floor } => match predicted {
                Some(scale) => Ok(scale.hypot(*floor)),
                None => Err(ObeError::ModelEvaluation(
                    ErrorInfo::new(
                        "noise-missing",
                        "noise model expects predicted noise but the model returned none",
                    )
                    .with_context("channel", channel),
                )),
            },
        }
    }

    /// Log likelihood of `measurement` for each particle prediction.
    ///
    /// A measurement uncertainty reported by the caller takes precedence over
    /// the configured noise.
    pub fn log_likelihoods(
        &self,
        predictions: &[Prediction],
        measurement: &Measurement,
    ) -> Result<Vec<f64>, ObeError> {
        Ok(self
            .likelihood_terms(predictions, measurement)?
            .into_iter()
            .map(|terms| terms.log_likelihood)
            .collect())
    }

    /// Per-particle log likelihoods alongside their residual part `Σ -z²/2`.
    pub fn likelihood_terms(
        &self,
        predictions: &[Prediction],
        measurement: &Measurement,
    ) -> Result<Vec<LikelihoodTerms>, ObeError> {
        validate_measurement(measurement)?;
        predictions
            .iter()
            .map(|prediction| self.log_likelihood(prediction, measurement))
            .collect()
    }

    fn log_likelihood(
        &self,
        prediction: &Prediction,
        measurement: &Measurement,
    ) -> Result<LikelihoodTerms, ObeError> {
        if prediction.values.len() != measurement.values.len() {
            return Err(ObeError::Configuration(
                ErrorInfo::new(
                    "measurement-channels",
                    "measurement and prediction channel counts differ",
                )
                .with_context("measured", measurement.values.len())
                .with_context("predicted", prediction.values.len()),
            ));
        }
        let mut terms = LikelihoodTerms::default();
        for (channel, (&observed, &expected)) in measurement
            .values
            .iter()
            .zip(&prediction.values)
            .enumerate()
        {
            let sigma = match &measurement.uncertainty {
                Some(reported) => reported[channel],
                None => {
                    let predicted = prediction
                        .noise
                        .as_ref()
                        .and_then(|noise| noise.get(channel).copied());
                    self.sigma(channel, predicted)?
                }
            };
            let z = (observed - expected) / sigma;
            terms.residual -= 0.5 * z * z;
            terms.log_likelihood += gaussian_log_pdf(observed, expected, sigma);
        }
        Ok(terms)
    }
}

/// Log likelihood of one particle together with its residual part, so that
/// degeneracy checks can ignore the units of the noise scale.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LikelihoodTerms {
    /// Full Gaussian log density summed over channels.
    pub log_likelihood: f64,
    /// `Σ_k -z_k²/2`, the same density without `Σ_k (ln σ_k + ln √(2π))`.
    pub residual: f64,
}

/// Log density of `N(mean, sigma^2)` at `x`.
pub fn gaussian_log_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
}

fn validate_measurement(measurement: &Measurement) -> Result<(), ObeError> {
    if measurement.values.is_empty() {
        return Err(ObeError::configuration(
            "measurement-empty",
            "measurement carries no values",
        ));
    }
    if let Some(bad) = measurement.values.iter().find(|v| !v.is_finite()) {
        return Err(ObeError::Configuration(
            ErrorInfo::new("measurement-non-finite", "measured value is not finite")
                .with_context("value", bad),
        ));
    }
    if let Some(reported) = &measurement.uncertainty {
        if reported.len() != measurement.values.len() {
            return Err(ObeError::Configuration(
                ErrorInfo::new(
                    "measurement-uncertainty",
                    "one uncertainty per measured channel required",
                )
                .with_context("values", measurement.values.len())
                .with_context("uncertainties", reported.len()),
            ));
        }
        if let Some(bad) = reported.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(ObeError::Configuration(
                ErrorInfo::new(
                    "measurement-uncertainty",
                    "uncertainty must be finite and positive",
                )
                .with_context("sigma", bad),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use obe_core::CandidateSetting;

    #[test]
    fn standard_normal_density_at_zero() {
        let expected = -(2.0 * std::f64::consts::PI).sqrt().ln();
        assert!((gaussian_log_pdf(0.0, 0.0, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn terms_split_the_gaussian_density() {
        let noise = NoiseModel::Gaussian { sigma: 2.5 };
        let measurement = Measurement::scalar(CandidateSetting::new(vec![0.0]), 1.0);
        let terms = noise
            .likelihood_terms(&[Prediction::scalar(4.0)], &measurement)
            .unwrap()[0];
        assert!((terms.residual + 0.5 * (3.0f64 / 2.5).powi(2)).abs() < 1e-12);
        assert_eq!(terms.log_likelihood, gaussian_log_pdf(1.0, 4.0, 2.5));
    }

    #[test]
    fn reported_uncertainty_overrides_configured_noise() {
        let noise = NoiseModel::Gaussian { sigma: 1.0 };
        let predictions = vec![Prediction::scalar(0.0)];
        let setting = CandidateSetting::new(vec![0.0]);
        let plain = Measurement::scalar(setting.clone(), 1.0);
        let precise = Measurement::scalar(setting, 1.0).with_uncertainty(vec![0.1]);
        let a = noise.log_likelihoods(&predictions, &plain).unwrap()[0];
        let b = noise.log_likelihoods(&predictions, &precise).unwrap()[0];
        assert!(b < a, "tighter uncertainty should penalise the residual more");
    }

    #[test]
    fn predicted_noise_requires_model_output() {
        let noise = NoiseModel::Predicted { floor: 0.0 };
        let measurement = Measurement::scalar(CandidateSetting::new(vec![0.0]), 0.0);
        let err = noise
            .log_likelihoods(&[Prediction::scalar(0.0)], &measurement)
            .unwrap_err();
        assert!(matches!(err, ObeError::ModelEvaluation(_)));

        let ok = noise
            .log_likelihoods(&[Prediction::scalar(0.0).with_noise(vec![2.0])], &measurement)
            .unwrap();
        assert!((ok[0] - gaussian_log_pdf(0.0, 0.0, 2.0)).abs() < 1e-12);
    }
}
