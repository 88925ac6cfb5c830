use std::fmt;
use std::path::{Path, PathBuf};

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{CandidateSetting, Measurement, ModelFunction, RngHandle};
use obe_smc::ParameterSummary;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::checkpoint::{self, CheckpointPayload};
use crate::determinism::{stage_rng, Stage};
use crate::engine::DesignEngine;
use crate::manifest::{self, RunManifest};
use crate::metrics::{CycleRecord, CycleRecorder};

/// Source of measurements for a simulated campaign.
pub trait Simulator {
    /// Measures at `setting` using `rng` for any noise.
    fn measure(
        &self,
        setting: &CandidateSetting,
        rng: &mut RngHandle,
    ) -> Result<Measurement, ObeError>;
}

/// Simulates measurements from a model at known true parameters plus
/// Gaussian noise.
pub struct ModelSimulator {
    model: Box<dyn ModelFunction>,
    truth: Vec<f64>,
    noise: Normal<f64>,
}

impl ModelSimulator {
    /// Simulator for `model` at `truth` with noise standard deviation `sigma`.
    pub fn new(
        model: Box<dyn ModelFunction>,
        truth: Vec<f64>,
        sigma: f64,
    ) -> Result<Self, ObeError> {
        if truth.len() != model.parameter_dim() {
            return Err(ObeError::Configuration(
                ErrorInfo::new("parameter-dimension", "true parameters differ from the model")
                    .with_context("model", model.parameter_dim())
                    .with_context("truth", truth.len()),
            ));
        }
        let noise = Normal::new(0.0, sigma).map_err(|err| {
            ObeError::Configuration(
                ErrorInfo::new("noise-scale", err.to_string()).with_context("sigma", sigma),
            )
        })?;
        Ok(Self {
            model,
            truth,
            noise,
        })
    }
}

impl fmt::Debug for ModelSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSimulator")
            .field("model", &self.model.name())
            .field("truth", &self.truth)
            .field("noise", &self.noise)
            .finish()
    }
}

impl Simulator for ModelSimulator {
    fn measure(
        &self,
        setting: &CandidateSetting,
        rng: &mut RngHandle,
    ) -> Result<Measurement, ObeError> {
        let prediction = self.model.predict(&self.truth, setting.values())?;
        let values = prediction
            .values
            .iter()
            .map(|value| value + self.noise.sample(rng.inner_mut()))
            .collect();
        Ok(Measurement {
            setting: setting.clone(),
            values,
            uncertainty: None,
        })
    }
}

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Cycles completed by the engine, including any before a resume.
    pub cycles_completed: usize,
    /// Posterior summary at the end of the run.
    pub final_estimate: ParameterSummary,
    /// Per-cycle diagnostics recorded by this invocation.
    pub records: Vec<CycleRecord>,
    /// Metrics CSV written during the run.
    pub metrics_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
    /// Checkpoint files retained at the end of the run.
    pub checkpoints: Vec<PathBuf>,
}

/// Drives `engine` until it has completed `config.cycles` cycles.
///
/// Measurement noise for cycle `c` comes from the `(c, Simulate)` substream,
/// so a run resumed from a checkpoint observes the same measurements.
pub fn run<S: Simulator + ?Sized>(
    engine: &mut DesignEngine,
    simulator: &S,
) -> Result<RunSummary, ObeError> {
    let config = engine.config().clone();
    let seed = config.seed_policy.master_seed;
    let run_dir = config.output.run_directory.clone();
    let mut recorder = CycleRecorder::new();
    let mut checkpoints = Vec::new();

    while engine.cycles_completed() < config.cycles {
        let mut rng = stage_rng(seed, engine.cycles_completed(), Stage::Simulate);
        let report = engine.cycle(|setting| simulator.measure(setting, &mut rng))?;
        let distribution = engine.distribution();
        recorder.push(CycleRecord {
            cycle: report.cycle,
            setting: report.setting.into_inner(),
            measured: report.measured,
            log_evidence: report.update.log_evidence,
            ess_before: report.update.ess_before,
            ess_after: report.update.ess_after,
            resampled: report.resampled,
            mean: distribution.mean(),
            std: distribution.std(),
        });

        let completed = engine.cycles_completed();
        if let Some(dir) = &run_dir {
            if config.checkpoint.interval > 0 && completed % config.checkpoint.interval == 0 {
                let path =
                    checkpoint::checkpoint_path(&dir.join(&config.output.checkpoint_dir), completed);
                engine.checkpoint().store(&path)?;
                checkpoints.push(path);
                checkpoint::enforce_retention(&mut checkpoints, config.checkpoint.max_to_keep)?;
            }
        }
    }

    let final_estimate = engine.current_estimate();
    let metrics_path = match &run_dir {
        Some(dir) => {
            let path = dir.join(&config.output.metrics_file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    ObeError::Serde(
                        ErrorInfo::new("metrics-mkdir", err.to_string())
                            .with_context("path", parent.display()),
                    )
                })?;
            }
            recorder.write_csv(&path).map_err(|err| {
                ObeError::Serde(
                    ErrorInfo::new("metrics-write", err.to_string())
                        .with_context("path", path.display()),
                )
            })?;
            Some(path)
        }
        None => None,
    };

    let manifest_path = match &run_dir {
        Some(dir) => {
            let path = dir.join(&config.output.manifest_file);
            let manifest = RunManifest {
                schema: manifest::MANIFEST_SCHEMA,
                config: config.clone(),
                provenance: manifest::provenance(&config, engine.model().name())?,
                seed_label: config.seed_policy.label.clone(),
                cycles_completed: engine.cycles_completed(),
                resamples: recorder.resample_count(),
                final_estimate: final_estimate.clone(),
                metrics_file: relative(metrics_path.as_deref(), dir),
                checkpoints: checkpoints
                    .iter()
                    .filter_map(|path| relative(Some(path.as_path()), dir))
                    .collect(),
            };
            manifest.write(&path)?;
            Some(path)
        }
        None => None,
    };

    info!(
        cycles = engine.cycles_completed(),
        resamples = recorder.resample_count(),
        mean = ?final_estimate.mean,
        std = ?final_estimate.std,
        "design run complete"
    );
    Ok(RunSummary {
        cycles_completed: engine.cycles_completed(),
        final_estimate,
        records: recorder.records().to_vec(),
        metrics_path,
        manifest_path,
        checkpoints,
    })
}

/// Restores an engine from a checkpoint file and runs it to completion.
pub fn resume<S: Simulator + ?Sized>(
    path: &Path,
    model: Box<dyn ModelFunction>,
    simulator: &S,
) -> Result<(DesignEngine, RunSummary), ObeError> {
    let payload = CheckpointPayload::load(path)?;
    let mut engine = DesignEngine::resume(payload, model)?;
    let summary = run(&mut engine, simulator)?;
    Ok((engine, summary))
}

fn relative(path: Option<&Path>, root: &Path) -> Option<PathBuf> {
    path.and_then(|path| path.strip_prefix(root).ok())
        .map(Path::to_path_buf)
}
