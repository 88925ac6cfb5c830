use obe_core::{CandidateSetting, Measurement, ModelFunction, ObeError, Prediction};
use obe_design::{CandidateSet, DesignConfig, DesignEngine, FnModel, ModelEvaluator};
use obe_smc::{NoiseModel, Prior, SmcConfig};

fn config(noise: NoiseModel) -> DesignConfig {
    DesignConfig {
        cycles: 5,
        smc: SmcConfig {
            particles: 500,
            ..SmcConfig::default()
        },
        noise,
        ..DesignConfig::default()
    }
}

fn slope_prior() -> Prior {
    Prior::uniform(&[("slope", 0.0, 1.0)]).unwrap()
}

/// Slope model whose noise is tight at x = 1, loose at x = 2 and invalid
/// from x = 3 on.
fn heteroskedastic() -> FnModel {
    FnModel::new("heteroskedastic", 1, 1, |theta: &[f64], x: &[f64]| {
        let scale = if x[0] >= 3.0 {
            0.0
        } else if x[0] >= 2.0 {
            10.0
        } else {
            0.01
        };
        Ok(Prediction::scalar(theta[0] * x[0]).with_noise(vec![scale]))
    })
}

#[test]
fn predicted_noise_drives_scoring_and_updates() {
    let candidates = CandidateSet::grid(vec![vec![1.0, 2.0]]).unwrap();
    let mut engine = DesignEngine::new(
        config(NoiseModel::Predicted { floor: 0.0 }),
        slope_prior(),
        Box::new(heteroskedastic()),
        candidates,
    )
    .unwrap();

    let utilities = engine.utilities().unwrap();
    assert!(utilities.iter().all(|u| u.is_finite() && *u >= 0.0));
    // x = 2 has four times the spread but a thousandfold noisier readout
    assert!(utilities[0] > utilities[1], "{utilities:?}");
    assert_eq!(engine.select_index().unwrap(), 0);

    let setting = engine.select_next_setting().unwrap();
    let report = engine.report_measurement(&setting, 0.5).unwrap();
    assert!(report.update.log_evidence.is_finite());
    let estimate = engine.current_estimate();
    assert!((estimate.mean[0] - 0.5).abs() < 0.05, "mean {}", estimate.mean[0]);
    assert!(estimate.std[0] < 0.05);
}

#[test]
fn invalid_predicted_noise_leaves_state_intact() {
    let candidates = CandidateSet::grid(vec![vec![1.0, 2.0]]).unwrap();
    let mut engine = DesignEngine::new(
        config(NoiseModel::Predicted { floor: 0.0 }),
        slope_prior(),
        Box::new(heteroskedastic()),
        candidates,
    )
    .unwrap();
    let particles = engine.particles().to_vec();
    let weights = engine.weights().to_vec();

    let err = engine
        .report_measurement(&CandidateSetting::new(vec![3.0]), 1.0)
        .unwrap_err();
    assert!(matches!(err, ObeError::ModelEvaluation(_)));
    assert_eq!(err.info().code, "model-noise-invalid");

    assert_eq!(engine.particles(), particles.as_slice());
    assert_eq!(engine.weights(), weights.as_slice());
    assert_eq!(engine.cycles_completed(), 0);
}

#[test]
fn noise_reported_by_some_particles_only_is_malformed() {
    let model = FnModel::new("patchy", 1, 1, |theta: &[f64], x: &[f64]| {
        let prediction = Prediction::scalar(theta[0] * x[0]);
        if theta[0] > 0.5 {
            Ok(prediction.with_noise(vec![0.1]))
        } else {
            Ok(prediction)
        }
    });
    let candidates = CandidateSet::grid(vec![vec![1.0]]).unwrap();
    let engine = DesignEngine::new(
        config(NoiseModel::Predicted { floor: 0.0 }),
        slope_prior(),
        Box::new(model),
        candidates,
    )
    .unwrap();
    let err = engine.utilities().unwrap_err();
    assert!(matches!(err, ObeError::ModelEvaluation(_)));
    assert_eq!(err.info().code, "model-output-shape");
}

#[test]
fn model_noise_requires_the_predicted_noise_model() {
    let candidates = CandidateSet::grid(vec![vec![1.0, 2.0]]).unwrap();
    let err = DesignEngine::new(
        config(NoiseModel::Gaussian { sigma: 0.1 }),
        slope_prior(),
        Box::new(heteroskedastic()),
        candidates,
    )
    .unwrap_err();
    assert!(matches!(err, ObeError::Configuration(_)));
    assert_eq!(err.info().code, "noise-model-mismatch");
}

/// Model whose batch output is cut short in one of two ways.
struct Truncating {
    drop_row: bool,
}

impl ModelFunction for Truncating {
    fn name(&self) -> &str {
        "truncating"
    }

    fn parameter_dim(&self) -> usize {
        1
    }

    fn setting_dim(&self) -> usize {
        1
    }

    fn predict(&self, parameters: &[f64], setting: &[f64]) -> Result<Prediction, ObeError> {
        Ok(Prediction::scalar(parameters[0] + setting[0]))
    }

    fn predict_batch(
        &self,
        particles: &[Vec<f64>],
        settings: &[CandidateSetting],
    ) -> Result<Vec<Vec<Prediction>>, ObeError> {
        let mut rows: Vec<Vec<Prediction>> = particles
            .iter()
            .map(|theta| {
                settings
                    .iter()
                    .map(|s| Prediction::scalar(theta[0] + s.values()[0]))
                    .collect()
            })
            .collect();
        if self.drop_row {
            rows.pop();
        } else if let Some(row) = rows.last_mut() {
            row.pop();
        }
        Ok(rows)
    }
}

fn shape_inputs() -> (Vec<Vec<f64>>, Vec<CandidateSetting>) {
    let particles = vec![vec![0.1], vec![0.2], vec![0.3]];
    let settings = vec![CandidateSetting::new(vec![1.0]), CandidateSetting::new(vec![2.0])];
    (particles, settings)
}

#[test]
fn truncated_batches_are_model_errors() {
    let (particles, settings) = shape_inputs();
    for drop_row in [true, false] {
        let model = Truncating { drop_row };
        let err = ModelEvaluator::new(&model)
            .evaluate(&particles, &settings)
            .unwrap_err();
        assert!(matches!(err, ObeError::ModelEvaluation(_)), "drop_row {drop_row}");
        assert_eq!(err.info().code, "model-output-shape");
    }
}

#[test]
fn channel_counts_must_match_the_declared_observables() {
    let (particles, settings) = shape_inputs();

    let short = FnModel::new("short", 1, 1, |theta: &[f64], _x: &[f64]| {
        Ok(Prediction::scalar(theta[0]))
    })
    .with_channels(2);
    let err = ModelEvaluator::new(&short)
        .evaluate(&particles, &settings)
        .unwrap_err();
    assert_eq!(err.info().code, "model-output-shape");

    let thin_noise = FnModel::new("thin-noise", 1, 1, |theta: &[f64], _x: &[f64]| {
        Ok(Prediction::channels(vec![theta[0], -theta[0]]).with_noise(vec![0.1]))
    })
    .with_channels(2);
    let err = ModelEvaluator::new(&thin_noise)
        .evaluate(&particles, &settings)
        .unwrap_err();
    assert_eq!(err.info().code, "model-output-shape");
}

fn pair_model() -> FnModel {
    FnModel::new("pair", 1, 1, |theta: &[f64], x: &[f64]| {
        Ok(Prediction::channels(vec![theta[0] * x[0], theta[0] + x[0]]))
    })
    .with_channels(2)
}

#[test]
fn two_channel_model_runs_design_cycles() {
    let truth = 1.2;
    let prior = Prior::uniform(&[("theta", 0.0, 2.0)]).unwrap();
    let candidates = CandidateSet::grid(vec![vec![0.5, 1.0, 2.0]]).unwrap();
    let mut engine = DesignEngine::new(
        config(NoiseModel::PerChannel {
            sigma: vec![0.1, 0.2],
        }),
        prior,
        Box::new(pair_model()),
        candidates,
    )
    .unwrap();

    let utilities = engine.utilities().unwrap();
    assert_eq!(utilities.len(), 3);
    assert!(utilities.iter().all(|u| u.is_finite() && *u > 0.0));

    for cycle in 0..5 {
        let setting = engine.select_next_setting().unwrap();
        let x = setting.values()[0];
        let report = engine
            .report(Measurement {
                setting,
                values: vec![truth * x, truth + x],
                uncertainty: None,
            })
            .unwrap();
        assert_eq!(report.cycle, cycle);
        assert_eq!(report.measured.len(), 2);
    }
    assert_eq!(engine.cycles_completed(), 5);
    let estimate = engine.current_estimate();
    assert!((estimate.mean[0] - truth).abs() < 0.1, "mean {}", estimate.mean[0]);

    let err = engine
        .report(Measurement::scalar(CandidateSetting::new(vec![1.0]), truth))
        .unwrap_err();
    assert_eq!(err.info().code, "measurement-channels");
}

#[test]
fn per_channel_noise_must_cover_every_channel() {
    let prior = Prior::uniform(&[("theta", 0.0, 2.0)]).unwrap();
    let candidates = CandidateSet::grid(vec![vec![1.0]]).unwrap();
    let err = DesignEngine::new(
        config(NoiseModel::PerChannel { sigma: vec![0.1] }),
        prior,
        Box::new(pair_model()),
        candidates,
    )
    .unwrap_err();
    assert_eq!(err.info().code, "noise-channels");
}
