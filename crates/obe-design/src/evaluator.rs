use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{CandidateSetting, ModelFunction, Prediction};

/// Dense N x T x K block of model predictions.
///
/// Entry `(particle, setting, channel)` lives at
/// `(particle * T + setting) * K + channel`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionMatrix {
    particles: usize,
    settings: usize,
    channels: usize,
    values: Vec<f64>,
    noise: Option<Vec<f64>>,
}

impl PredictionMatrix {
    fn offset(&self, particle: usize, setting: usize, channel: usize) -> usize {
        (particle * self.settings + setting) * self.channels + channel
    }

    /// Number of particles (N).
    pub fn particles(&self) -> usize {
        self.particles
    }

    /// Number of candidate settings (T).
    pub fn settings(&self) -> usize {
        self.settings
    }

    /// Number of observable channels (K).
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Predicted observable.
    pub fn value(&self, particle: usize, setting: usize, channel: usize) -> f64 {
        self.values[self.offset(particle, setting, channel)]
    }

    /// Predicted noise scale, when the model reports one.
    pub fn noise(&self, particle: usize, setting: usize, channel: usize) -> Option<f64> {
        let offset = self.offset(particle, setting, channel);
        self.noise.as_ref().map(|noise| noise[offset])
    }

    /// Returns `true` when the model reported noise for every entry.
    pub fn has_noise(&self) -> bool {
        self.noise.is_some()
    }

    /// Per-particle predictions for one setting column.
    pub fn column(&self, setting: usize) -> Vec<Prediction> {
        (0..self.particles)
            .map(|particle| {
                let start = self.offset(particle, setting, 0);
                let range = start..start + self.channels;
                Prediction {
                    values: self.values[range.clone()].to_vec(),
                    noise: self.noise.as_ref().map(|noise| noise[range].to_vec()),
                }
            })
            .collect()
    }
}

/// Adapter invoking the model capability over particle/setting batches.
///
/// Every model output is checked for shape and finiteness before it reaches
/// the particle cloud, so a misbehaving model can never corrupt the weights.
#[derive(Clone, Copy)]
pub struct ModelEvaluator<'a> {
    model: &'a dyn ModelFunction,
}

impl std::fmt::Debug for ModelEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEvaluator")
            .field("model", &self.model.name())
            .finish()
    }
}

impl<'a> ModelEvaluator<'a> {
    /// Wraps a model capability.
    pub fn new(model: &'a dyn ModelFunction) -> Self {
        Self { model }
    }

    /// Evaluates the model for every particle at every candidate.
    pub fn evaluate(
        &self,
        particles: &[Vec<f64>],
        candidates: &[CandidateSetting],
    ) -> Result<PredictionMatrix, ObeError> {
        self.check_inputs(particles, candidates)?;
        let batch = self
            .model
            .predict_batch(particles, candidates)
            .map_err(|err| wrap_model_error(self.model.name(), err))?;
        self.assemble(batch, particles.len(), candidates.len())
    }

    /// Evaluates the model for every particle at one setting.
    pub fn evaluate_setting(
        &self,
        particles: &[Vec<f64>],
        setting: &CandidateSetting,
    ) -> Result<Vec<Prediction>, ObeError> {
        let matrix = self.evaluate(particles, std::slice::from_ref(setting))?;
        Ok(matrix.column(0))
    }

    fn check_inputs(
        &self,
        particles: &[Vec<f64>],
        candidates: &[CandidateSetting],
    ) -> Result<(), ObeError> {
        if candidates.is_empty() {
            return Err(ObeError::configuration(
                "candidates-empty",
                "no candidate settings to evaluate",
            ));
        }
        let setting_dim = self.model.setting_dim();
        if let Some(bad) = candidates.iter().find(|s| s.len() != setting_dim) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("setting-dimension", "setting length differs from the model")
                    .with_context("expected", setting_dim)
                    .with_context("actual", bad.len()),
            ));
        }
        let parameter_dim = self.model.parameter_dim();
        if let Some(bad) = particles.iter().find(|p| p.len() != parameter_dim) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("parameter-dimension", "particle length differs from the model")
                    .with_context("expected", parameter_dim)
                    .with_context("actual", bad.len()),
            ));
        }
        Ok(())
    }

    fn assemble(
        &self,
        batch: Vec<Vec<Prediction>>,
        particles: usize,
        settings: usize,
    ) -> Result<PredictionMatrix, ObeError> {
        let channels = self.model.observable_dim();
        let malformed = |message: &str| {
            ErrorInfo::new("model-output-shape", message.to_string())
                .with_context("model", self.model.name())
        };
        if batch.len() != particles {
            return Err(ObeError::ModelEvaluation(
                malformed("batch row count differs from particle count")
                    .with_context("expected", particles)
                    .with_context("actual", batch.len()),
            ));
        }
        let with_noise = batch
            .first()
            .and_then(|row| row.first())
            .map_or(false, |p| p.noise.is_some());

        let total = particles * settings * channels;
        let mut values = Vec::with_capacity(total);
        let mut noise = with_noise.then(|| Vec::with_capacity(total));
        for (particle, row) in batch.into_iter().enumerate() {
            if row.len() != settings {
                return Err(ObeError::ModelEvaluation(
                    malformed("batch row length differs from candidate count")
                        .with_context("particle", particle)
                        .with_context("expected", settings)
                        .with_context("actual", row.len()),
                ));
            }
            for (setting, prediction) in row.into_iter().enumerate() {
                if prediction.values.len() != channels {
                    return Err(ObeError::ModelEvaluation(
                        malformed("prediction has wrong channel count")
                            .with_context("particle", particle)
                            .with_context("setting", setting)
                            .with_context("expected", channels)
                            .with_context("actual", prediction.values.len()),
                    ));
                }
                if prediction.values.iter().any(|v| !v.is_finite()) {
                    return Err(ObeError::ModelEvaluation(
                        ErrorInfo::new("model-non-finite", "model returned a non-finite value")
                            .with_context("model", self.model.name())
                            .with_context("particle", particle)
                            .with_context("setting", setting),
                    ));
                }
                values.extend_from_slice(&prediction.values);
                match (noise.as_mut(), prediction.noise) {
                    (Some(buffer), Some(scales)) => {
                        if scales.len() != channels {
                            return Err(ObeError::ModelEvaluation(
                                malformed("noise has wrong channel count")
                                    .with_context("particle", particle)
                                    .with_context("setting", setting),
                            ));
                        }
                        if scales.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                            return Err(ObeError::ModelEvaluation(
                                ErrorInfo::new(
                                    "model-noise-invalid",
                                    "predicted noise must be finite and positive",
                                )
                                .with_context("model", self.model.name())
                                .with_context("particle", particle)
                                .with_context("setting", setting),
                            ));
                        }
                        buffer.extend_from_slice(&scales);
                    }
                    (None, None) => {}
                    _ => {
                        return Err(ObeError::ModelEvaluation(
                            malformed("noise reported for some predictions only")
                                .with_context("particle", particle)
                                .with_context("setting", setting),
                        ))
                    }
                }
            }
        }
        Ok(PredictionMatrix {
            particles,
            settings,
            channels,
            values,
            noise,
        })
    }
}

fn wrap_model_error(model: &str, err: ObeError) -> ObeError {
    match err {
        ObeError::ModelEvaluation(info) => {
            ObeError::ModelEvaluation(info.with_context("model", model))
        }
        other => ObeError::ModelEvaluation(
            ErrorInfo::new("model-failed", other.to_string()).with_context("model", model),
        ),
    }
}
