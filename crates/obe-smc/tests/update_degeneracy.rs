use obe_core::{CandidateSetting, Measurement, ObeError, Prediction, RngHandle};
use obe_smc::{DistributionState, NoiseModel, ParticleDistribution, Prior, SmcConfig};

fn distribution(particles: usize) -> ParticleDistribution {
    let config = SmcConfig {
        particles,
        ..SmcConfig::default()
    };
    let prior = Prior::uniform(&[("x", 0.0, 10.0)]).unwrap();
    ParticleDistribution::initialize(prior, &config, &mut RngHandle::from_seed(5)).unwrap()
}

fn identity(distribution: &ParticleDistribution) -> Vec<Prediction> {
    distribution
        .particles()
        .iter()
        .map(|row| Prediction::scalar(row[0]))
        .collect()
}

fn measurement(value: f64) -> Measurement {
    Measurement::scalar(CandidateSetting::new(vec![0.0]), value)
}

#[test]
fn ess_never_grows_under_repeated_measurements() {
    let mut distribution = distribution(500);
    let noise = NoiseModel::Gaussian { sigma: 1.0 };
    let predictions = identity(&distribution);
    let mut previous = distribution.effective_sample_size();
    assert!((previous - 500.0).abs() < 1e-6);
    for _ in 0..8 {
        let report = distribution
            .update_with(&predictions, &measurement(5.0), &noise)
            .unwrap();
        assert!(report.ess_after <= report.ess_before + 1e-9);
        assert!(report.ess_after <= previous + 1e-9);
        previous = report.ess_after;
    }
    assert_eq!(distribution.state(), DistributionState::Degenerate);
    assert!(distribution.needs_resample());
}

#[test]
fn impossible_measurement_leaves_state_untouched() {
    let mut distribution = distribution(200);
    let before = distribution.clone();
    let predictions = identity(&distribution);
    let err = distribution
        .update_with(
            &predictions,
            &measurement(1.0e6),
            &NoiseModel::Gaussian { sigma: 0.1 },
        )
        .unwrap_err();
    match err {
        ObeError::NumericalDegeneracy(info) => assert_eq!(info.code, "evidence-underflow"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(distribution, before);
}

#[test]
fn invalid_likelihoods_are_rejected() {
    let mut distribution = distribution(4);
    let before = distribution.clone();

    let err = distribution.update(&[0.0, f64::NAN, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, ObeError::NumericalDegeneracy(_)));

    let err = distribution.update(&[f64::NEG_INFINITY; 4]).unwrap_err();
    assert_eq!(err.info().code, "weights-collapsed");

    let err = distribution.update(&[0.0; 3]).unwrap_err();
    assert!(matches!(err, ObeError::Configuration(_)));

    assert_eq!(distribution, before);
}

#[test]
fn zero_likelihood_particles_drop_out() {
    let mut distribution = distribution(4);
    distribution
        .update(&[0.0, f64::NEG_INFINITY, 0.0, f64::NEG_INFINITY])
        .unwrap();
    let expected = [0.5, 0.0, 0.5, 0.0];
    for (w, e) in distribution.weights().iter().zip(expected) {
        assert!((w - e).abs() < 1e-12);
    }
    assert!((distribution.effective_sample_size() - 2.0).abs() < 1e-12);
}

#[test]
fn channel_mismatch_is_a_configuration_error() {
    let mut distribution = distribution(3);
    let predictions = identity(&distribution);
    let two_channels = Measurement {
        setting: CandidateSetting::new(vec![0.0]),
        values: vec![1.0, 2.0],
        uncertainty: None,
    };
    let err = distribution
        .update_with(&predictions, &two_channels, &NoiseModel::default())
        .unwrap_err();
    assert_eq!(err.info().code, "measurement-channels");
}

fn wide(distribution: &ParticleDistribution, channels: usize) -> Vec<Prediction> {
    distribution
        .particles()
        .iter()
        .map(|row| Prediction::channels(vec![row[0]; channels]))
        .collect()
}

#[test]
fn exact_hit_survives_many_channels_with_a_large_noise_scale() {
    let mut distribution = distribution(100);
    let predictions = wide(&distribution, 150);
    let observed = Measurement {
        setting: CandidateSetting::new(vec![0.0]),
        values: predictions[0].values.clone(),
        uncertainty: None,
    };

    for sigma in [1.0, 100.0] {
        let mut trial = distribution.clone();
        let report = trial
            .update_with(&predictions, &observed, &NoiseModel::Gaussian { sigma })
            .unwrap();
        // the full evidence carries 150 normalization terms
        assert!(report.log_evidence.is_finite());
        assert!((trial.weights().iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    let report = distribution
        .update_with(&predictions, &observed, &NoiseModel::Gaussian { sigma: 100.0 })
        .unwrap();
    assert!(report.log_evidence < distribution.config().evidence_floor);
}

#[test]
fn far_residuals_are_still_rejected_with_many_channels() {
    let mut distribution = distribution(100);
    let before = distribution.clone();
    let predictions = wide(&distribution, 150);
    let observed = Measurement {
        setting: CandidateSetting::new(vec![0.0]),
        values: vec![1.0e4; 150],
        uncertainty: None,
    };
    let err = distribution
        .update_with(&predictions, &observed, &NoiseModel::Gaussian { sigma: 100.0 })
        .unwrap_err();
    assert_eq!(err.info().code, "evidence-underflow");
    assert_eq!(distribution, before);
}
