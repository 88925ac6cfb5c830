use obe_core::{ObeError, RngHandle};
use obe_smc::{
    Bounds, DistributionSnapshot, NamedPrior, ParameterPrior, ParticleDistribution, Prior,
    ResampleScheme, SmcConfig,
};

fn config(particles: usize) -> SmcConfig {
    SmcConfig {
        particles,
        ..SmcConfig::default()
    }
}

#[test]
fn degenerate_priors_are_configuration_errors() {
    let cases = vec![
        ParameterPrior::Uniform { low: 1.0, high: 1.0 },
        ParameterPrior::Uniform {
            low: 0.0,
            high: f64::INFINITY,
        },
        ParameterPrior::LogUniform { low: 0.0, high: 1.0 },
        ParameterPrior::Normal {
            mean: 0.0,
            std: 0.0,
            low: None,
            high: None,
        },
        ParameterPrior::Normal {
            mean: 0.0,
            std: 1.0,
            low: Some(2.0),
            high: Some(1.0),
        },
    ];
    for prior in cases {
        let err = Prior::new(vec![NamedPrior {
            name: "x".into(),
            prior: prior.clone(),
        }])
        .unwrap_err();
        assert!(matches!(err, ObeError::Configuration(_)), "{prior:?}");
        assert_eq!(err.info().code, "prior-degenerate");
    }
    assert_eq!(Prior::new(Vec::new()).unwrap_err().info().code, "prior-empty");
    assert_eq!(
        Prior::uniform(&[("x", 0.0, 1.0), ("x", 0.0, 2.0)])
            .unwrap_err()
            .info()
            .code,
        "prior-duplicate"
    );
}

#[test]
fn too_few_particles_is_rejected() {
    let prior = Prior::uniform(&[("x", 0.0, 1.0)]).unwrap();
    let err = ParticleDistribution::initialize(prior, &config(1), &mut RngHandle::from_seed(0))
        .unwrap_err();
    assert_eq!(err.info().code, "particles-too-few");
}

#[test]
fn samples_respect_prior_support() {
    let prior: Prior = serde_yaml::from_str(
        r#"
- name: amplitude
  type: log-uniform
  low: 0.01
  high: 100.0
- name: centre
  type: normal
  mean: 1.0
  std: 5.0
  low: 0.0
- name: offset
  type: uniform
  low: -1.0
  high: 1.0
"#,
    )
    .unwrap();
    assert_eq!(prior.names(), vec!["amplitude", "centre", "offset"]);
    let distribution =
        ParticleDistribution::initialize(prior, &config(2000), &mut RngHandle::from_seed(3))
            .unwrap();
    for row in distribution.particles() {
        assert!((0.01..=100.0).contains(&row[0]));
        assert!(row[1] >= 0.0);
        assert!((-1.0..=1.0).contains(&row[2]));
    }
    // log-uniform: median near the geometric centre
    let mut amplitudes: Vec<f64> = distribution.particles().iter().map(|r| r[0]).collect();
    amplitudes.sort_by(f64::total_cmp);
    let median = amplitudes[amplitudes.len() / 2];
    assert!((0.5..2.0).contains(&median), "median {median}");
}

#[test]
fn same_seed_reproduces_every_stage() {
    let build = || {
        let prior = Prior::uniform(&[("a", 0.0, 1.0), ("b", 0.0, 5.0)]).unwrap();
        let mut rng = RngHandle::from_seed(99);
        let mut distribution = ParticleDistribution::initialize(prior, &config(300), &mut rng)
            .unwrap();
        let log_likelihoods: Vec<f64> = distribution
            .particles()
            .iter()
            .map(|row| -(row[0] - 0.3).powi(2) * 50.0)
            .collect();
        distribution.update(&log_likelihoods).unwrap();
        distribution.resample(&mut rng);
        distribution.diversify(&mut rng);
        distribution
    };
    assert_eq!(build(), build());
}

#[test]
fn snapshot_round_trips_through_json_with_unbounded_edges() {
    let prior = Prior::new(vec![NamedPrior {
        name: "x".into(),
        prior: ParameterPrior::Normal {
            mean: 0.0,
            std: 1.0,
            low: None,
            high: None,
        },
    }])
    .unwrap();
    let distribution =
        ParticleDistribution::initialize(prior, &config(16), &mut RngHandle::from_seed(1))
            .unwrap();
    let json = serde_json::to_string(&distribution.snapshot()).unwrap();
    assert!(json.contains("null"));
    let snapshot: DistributionSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(snapshot.bounds, vec![Bounds::unbounded()]);
    let restored = ParticleDistribution::from_snapshot(snapshot, &config(16)).unwrap();
    assert_eq!(restored, distribution);
}

#[test]
fn explicit_samples_are_validated() {
    let names = vec!["x".to_string()];
    let bounds = vec![Bounds::new(0.0, 1.0)];
    let ok = ParticleDistribution::from_samples(
        names.clone(),
        vec![vec![0.2], vec![0.4], vec![0.9]],
        bounds.clone(),
        &SmcConfig::default(),
    )
    .unwrap();
    assert_eq!(ok.len(), 3);
    assert!(ok.prior().is_none());
    assert!((ok.mean()[0] - 0.5).abs() < 1e-12);

    let err = ParticleDistribution::from_samples(
        names.clone(),
        vec![vec![0.2], vec![1.5]],
        bounds.clone(),
        &SmcConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "particle-out-of-bounds");

    let err = ParticleDistribution::from_samples(
        names,
        vec![vec![0.2, 0.1], vec![0.3, 0.1]],
        bounds,
        &SmcConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "dimension-mismatch");
}

#[test]
fn config_defaults_fill_missing_yaml_fields() {
    let config: SmcConfig = serde_yaml::from_str("particles: 250\nscheme: multinomial\n").unwrap();
    assert_eq!(config.particles, 250);
    assert_eq!(config.scheme, ResampleScheme::Multinomial);
    assert_eq!(config.resample_threshold, 0.5);
    assert_eq!(config.kernel.shrinkage, 0.98);
    assert_eq!(config.evidence_floor, f64::MIN_POSITIVE.ln());
    config.validate().unwrap();
}

#[test]
fn summary_reports_intervals_inside_support() {
    let prior = Prior::uniform(&[("x", 2.0, 4.0)]).unwrap();
    let distribution =
        ParticleDistribution::initialize(prior, &config(4000), &mut RngHandle::from_seed(8))
            .unwrap();
    let summary = distribution.summary();
    assert_eq!(summary.particles, 4000);
    assert!((summary.mean[0] - 3.0).abs() < 0.05);
    // uniform on width 2 has std 2 / sqrt(12)
    assert!((summary.std[0] - 2.0 / 12f64.sqrt()).abs() < 0.02);
    let interval = summary.credible_intervals[0];
    assert!(interval.low >= 2.0 && interval.low < 2.1);
    assert!(interval.high <= 4.0 && interval.high > 3.9);
    assert!((summary.covariance[0][0] - summary.std[0].powi(2)).abs() < 1e-12);
}
