use std::fmt;

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{CandidateSetting, Measurement, ModelFunction, SettingSelector};
use obe_smc::{
    KernelReport, NoiseModel, ParameterSummary, ParticleDistribution, Prior, UpdateReport,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::candidates::CandidateSet;
use crate::checkpoint::{CheckpointPayload, CHECKPOINT_SCHEMA};
use crate::config::DesignConfig;
use crate::determinism::{stage_rng, Stage};
use crate::evaluator::ModelEvaluator;
use crate::selector::Greedy;
use crate::utility;

/// Outcome of absorbing one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Index of the completed cycle, counted from zero.
    pub cycle: usize,
    /// Setting that was measured.
    pub setting: CandidateSetting,
    /// Measured values.
    pub measured: Vec<f64>,
    /// Weight update diagnostics.
    pub update: UpdateReport,
    /// Whether the cloud was resampled and diversified.
    pub resampled: bool,
    /// Kernel diagnostics when resampled.
    pub kernel: Option<KernelReport>,
}

/// Sequential design engine: scores candidates, absorbs measurements and
/// reports the current parameter estimate.
///
/// Randomness is derived from the master seed per `(cycle, stage)`, so
/// scoring and selection are reproducible within a cycle and a resumed
/// engine replays the stream of an uninterrupted one.
pub struct DesignEngine {
    config: DesignConfig,
    model: Box<dyn ModelFunction>,
    selector: Box<dyn SettingSelector>,
    candidates: CandidateSet,
    costs: Option<Vec<f64>>,
    distribution: ParticleDistribution,
    cycle: usize,
    resets: usize,
}

impl fmt::Debug for DesignEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesignEngine")
            .field("model", &self.model.name())
            .field("selector", &self.selector.name())
            .field("candidates", &self.candidates.len())
            .field("particles", &self.distribution.len())
            .field("cycle", &self.cycle)
            .field("resets", &self.resets)
            .finish()
    }
}

impl DesignEngine {
    /// Draws the initial cloud from `prior` and prepares the configured selector.
    pub fn new(
        config: DesignConfig,
        prior: Prior,
        model: Box<dyn ModelFunction>,
        candidates: CandidateSet,
    ) -> Result<Self, ObeError> {
        config.validate(model.observable_dim())?;
        check_model(model.as_ref(), prior.dimension(), &candidates)?;
        let mut rng = stage_rng(config.seed_policy.master_seed, 0, Stage::Initialize);
        let distribution = ParticleDistribution::initialize(prior, &config.smc, &mut rng)?;
        Self::assemble(config, model, candidates, None, distribution, 0, 0)
    }

    /// Starts from an existing cloud, e.g. one built from stored samples.
    pub fn from_distribution(
        config: DesignConfig,
        distribution: ParticleDistribution,
        model: Box<dyn ModelFunction>,
        candidates: CandidateSet,
    ) -> Result<Self, ObeError> {
        config.validate(model.observable_dim())?;
        check_model(model.as_ref(), distribution.dimension(), &candidates)?;
        Self::assemble(config, model, candidates, None, distribution, 0, 0)
    }

    /// Rebuilds an engine from a checkpoint.
    pub fn resume(
        payload: CheckpointPayload,
        model: Box<dyn ModelFunction>,
    ) -> Result<Self, ObeError> {
        if !CHECKPOINT_SCHEMA.is_compatible_with(&payload.schema) {
            return Err(ObeError::Serde(ErrorInfo::new(
                "checkpoint-schema",
                "unsupported checkpoint schema",
            )));
        }
        if payload.model_name != model.name() {
            return Err(ObeError::Configuration(
                ErrorInfo::new("model-mismatch", "checkpoint was written for another model")
                    .with_context("checkpoint", &payload.model_name)
                    .with_context("model", model.name()),
            ));
        }
        let config = payload.config;
        config.validate(model.observable_dim())?;
        let distribution = ParticleDistribution::from_snapshot(payload.distribution, &config.smc)?;
        check_model(model.as_ref(), distribution.dimension(), &payload.candidates)?;
        info!(
            cycle = payload.cycle,
            model = model.name(),
            "resuming design run from checkpoint"
        );
        Self::assemble(
            config,
            model,
            payload.candidates,
            payload.costs,
            distribution,
            payload.cycle,
            payload.resets,
        )
    }

    fn assemble(
        config: DesignConfig,
        model: Box<dyn ModelFunction>,
        candidates: CandidateSet,
        costs: Option<Vec<f64>>,
        distribution: ParticleDistribution,
        cycle: usize,
        resets: usize,
    ) -> Result<Self, ObeError> {
        if let Some(costs) = &costs {
            utility::validate_costs(costs, candidates.len())?;
        }
        check_noise_model(model.as_ref(), &config.noise, &distribution, &candidates)?;
        let selector = config.selector.policy.build()?;
        debug!(
            model = model.name(),
            selector = selector.name(),
            particles = distribution.len(),
            candidates = candidates.len(),
            "design engine ready"
        );
        Ok(Self {
            config,
            model,
            selector,
            candidates,
            costs,
            distribution,
            cycle,
            resets,
        })
    }

    /// Replaces the configured selection policy.
    pub fn with_selector(mut self, selector: Box<dyn SettingSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Divides each candidate's utility by its measurement cost.
    pub fn with_costs(mut self, costs: Vec<f64>) -> Result<Self, ObeError> {
        utility::validate_costs(&costs, self.candidates.len())?;
        self.costs = Some(costs);
        Ok(self)
    }

    /// Expected information gain of every candidate for the current cloud.
    pub fn utilities(&self) -> Result<Vec<f64>, ObeError> {
        let evaluator = ModelEvaluator::new(self.model.as_ref());
        let settings = self.candidates.settings();
        let costs = self.costs.as_deref();
        match self.config.selector.utility_draws {
            Some(draws) if draws < self.distribution.len() => {
                let mut rng = self.rng(Stage::Utility);
                let (particles, weights) = utility::subsample(
                    self.distribution.particles(),
                    self.distribution.weights(),
                    draws,
                    &mut rng,
                );
                let matrix = evaluator.evaluate(&particles, settings)?;
                utility::score(&matrix, &weights, &self.config.noise, costs)
            }
            _ => {
                let matrix = evaluator.evaluate(self.distribution.particles(), settings)?;
                utility::score(
                    &matrix,
                    self.distribution.weights(),
                    &self.config.noise,
                    costs,
                )
            }
        }
    }

    /// Index of the next candidate under the configured selector.
    pub fn select_index(&self) -> Result<usize, ObeError> {
        let utilities = self.utilities()?;
        let index = self.selector.select(&utilities, &mut self.rng(Stage::Select))?;
        debug!(
            cycle = self.cycle,
            index,
            utility = utilities[index],
            selector = self.selector.name(),
            "selected setting"
        );
        Ok(index)
    }

    /// Next setting to measure under the configured selector.
    pub fn select_next_setting(&self) -> Result<CandidateSetting, ObeError> {
        let index = self.select_index()?;
        Ok(self.candidates.settings()[index].clone())
    }

    /// Setting with the highest utility, regardless of the configured selector.
    pub fn optimal_setting(&self) -> Result<CandidateSetting, ObeError> {
        let utilities = self.utilities()?;
        let index = Greedy.select(&utilities, &mut self.rng(Stage::Select))?;
        Ok(self.candidates.settings()[index].clone())
    }

    /// Absorbs a scalar measurement taken at `setting`.
    pub fn report_measurement(
        &mut self,
        setting: &CandidateSetting,
        value: f64,
    ) -> Result<CycleReport, ObeError> {
        self.report(Measurement::scalar(setting.clone(), value))
    }

    /// Absorbs a measurement, resampling and diversifying when the cloud
    /// degenerates.
    ///
    /// On error the particle cloud is unchanged and the cycle counter does
    /// not advance.
    pub fn report(&mut self, measurement: Measurement) -> Result<CycleReport, ObeError> {
        let predictions = ModelEvaluator::new(self.model.as_ref())
            .evaluate_setting(self.distribution.particles(), &measurement.setting)?;
        let update = self
            .distribution
            .update_with(&predictions, &measurement, &self.config.noise)?;

        let resampled = self.distribution.needs_resample();
        let kernel = if resampled {
            let mut rng = self.rng(Stage::Resample);
            self.distribution.resample(&mut rng);
            let mut rng = self.rng(Stage::Diversify);
            let kernel = self.distribution.diversify(&mut rng);
            info!(
                cycle = self.cycle,
                ess = update.ess_after,
                factor = ?kernel.factor,
                reflected = kernel.reflected,
                "resampled particle cloud"
            );
            Some(kernel)
        } else {
            None
        };

        debug!(
            cycle = self.cycle,
            log_evidence = update.log_evidence,
            ess = self.distribution.effective_sample_size(),
            "measurement absorbed"
        );
        let report = CycleReport {
            cycle: self.cycle,
            setting: measurement.setting,
            measured: measurement.values,
            update,
            resampled,
            kernel,
        };
        self.cycle += 1;
        Ok(report)
    }

    /// Selects a setting, obtains a measurement from `measure` and absorbs it.
    pub fn cycle<F>(&mut self, measure: F) -> Result<CycleReport, ObeError>
    where
        F: FnOnce(&CandidateSetting) -> Result<Measurement, ObeError>,
    {
        let setting = self.select_next_setting()?;
        let measurement = measure(&setting)?;
        self.report(measurement)
    }

    /// Current parameter estimate.
    pub fn current_estimate(&self) -> ParameterSummary {
        self.distribution.summary()
    }

    /// Discards the cloud and redraws it from `prior`.
    pub fn reset(&mut self, prior: Prior) -> Result<(), ObeError> {
        check_model(self.model.as_ref(), prior.dimension(), &self.candidates)?;
        let resets = self.resets + 1;
        let mut rng = stage_rng(self.config.seed_policy.master_seed, resets, Stage::Initialize);
        self.distribution = ParticleDistribution::initialize(prior, &self.config.smc, &mut rng)?;
        self.resets = resets;
        info!(resets, cycle = self.cycle, "particle cloud reset from prior");
        Ok(())
    }

    /// Serializable state sufficient to resume.
    pub fn checkpoint(&self) -> CheckpointPayload {
        CheckpointPayload {
            schema: CHECKPOINT_SCHEMA,
            cycle: self.cycle,
            resets: self.resets,
            config: self.config.clone(),
            model_name: self.model.name().to_string(),
            candidates: self.candidates.clone(),
            costs: self.costs.clone(),
            distribution: self.distribution.snapshot(),
        }
    }

    /// Particle rows.
    pub fn particles(&self) -> &[Vec<f64>] {
        self.distribution.particles()
    }

    /// Particle weights.
    pub fn weights(&self) -> &[f64] {
        self.distribution.weights()
    }

    /// Candidate settings.
    pub fn settings(&self) -> &[CandidateSetting] {
        self.candidates.settings()
    }

    /// Candidate set.
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Model constants.
    pub fn constants(&self) -> Vec<f64> {
        self.model.constants()
    }

    /// The particle cloud.
    pub fn distribution(&self) -> &ParticleDistribution {
        &self.distribution
    }

    /// Active configuration.
    pub fn config(&self) -> &DesignConfig {
        &self.config
    }

    /// The model capability.
    pub fn model(&self) -> &dyn ModelFunction {
        self.model.as_ref()
    }

    /// Name of the active selector.
    pub fn selector_name(&self) -> &str {
        self.selector.name()
    }

    /// Number of measurements absorbed so far.
    pub fn cycles_completed(&self) -> usize {
        self.cycle
    }

    fn rng(&self, stage: Stage) -> obe_core::RngHandle {
        stage_rng(self.config.seed_policy.master_seed, self.cycle, stage)
    }
}

fn check_model(
    model: &dyn ModelFunction,
    parameters: usize,
    candidates: &CandidateSet,
) -> Result<(), ObeError> {
    if model.parameter_dim() != parameters {
        return Err(ObeError::Configuration(
            ErrorInfo::new("parameter-dimension", "prior and model disagree on parameter count")
                .with_context("model", model.parameter_dim())
                .with_context("prior", parameters),
        ));
    }
    if model.setting_dim() != candidates.dimension() {
        return Err(ObeError::Configuration(
            ErrorInfo::new("setting-dimension", "candidates and model disagree on setting length")
                .with_context("model", model.setting_dim())
                .with_context("candidates", candidates.dimension()),
        ));
    }
    if model.observable_dim() == 0 {
        return Err(ObeError::configuration(
            "observable-dimension",
            "model must report at least one observable channel",
        ));
    }
    Ok(())
}

/// Rejects a model that reports its own noise when the configured noise
/// model would ignore it. Checked on one particle at the first candidate;
/// a model that fails there is left for the regular evaluation to report.
fn check_noise_model(
    model: &dyn ModelFunction,
    noise: &NoiseModel,
    distribution: &ParticleDistribution,
    candidates: &CandidateSet,
) -> Result<(), ObeError> {
    if matches!(noise, NoiseModel::Predicted { .. }) {
        return Ok(());
    }
    let (Some(particle), Some(setting)) = (distribution.particles().first(), candidates.get(0))
    else {
        return Ok(());
    };
    let predictions = match ModelEvaluator::new(model)
        .evaluate_setting(std::slice::from_ref(particle), setting)
    {
        Ok(predictions) => predictions,
        Err(err) => {
            debug!(error = %err, "skipping noise model check");
            return Ok(());
        }
    };
    if predictions.iter().any(|p| p.noise.is_some()) {
        return Err(ObeError::Configuration(
            ErrorInfo::new(
                "noise-model-mismatch",
                "model predicts its own noise but the noise model ignores it",
            )
            .with_context("model", model.name())
            .with_hint("use the `predicted` noise model"),
        ));
    }
    Ok(())
}
