use std::path::PathBuf;

use obe_design::{CandidateLayout, DesignConfig, ModelKind, SelectionPolicy};
use obe_smc::{NoiseModel, ResampleScheme};

#[test]
fn empty_yaml_uses_defaults() {
    let config: DesignConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config, DesignConfig::default());
    assert_eq!(config.cycles, 50);
    assert_eq!(config.smc.particles, 1000);
    assert_eq!(config.selector.policy, SelectionPolicy::Greedy);
    assert_eq!(config.selector.utility_draws, None);
    assert_eq!(config.checkpoint.interval, 0);
    assert_eq!(config.checkpoint.max_to_keep, 4);
    assert_eq!(config.output.metrics_file, PathBuf::from("metrics.csv"));
    assert!(config.output.run_directory.is_none());
    config.validate(1).unwrap();
}

#[test]
fn full_yaml_round_trips_through_validation() {
    let yaml = r#"
cycles: 12
smc:
  particles: 400
  resample_threshold: 0.4
  scheme: multinomial
selector:
  policy:
    type: pickiness
  utility_draws: 100
noise:
  type: per-channel
  sigma: [0.1, 0.3]
seed_policy:
  master_seed: 77
  label: sweep-a
checkpoint:
  interval: 3
output:
  run_directory: runs/a
"#;
    let config: DesignConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.cycles, 12);
    assert_eq!(config.smc.scheme, ResampleScheme::Multinomial);
    assert_eq!(config.selector.policy, SelectionPolicy::Pickiness { exponent: 15.0 });
    assert_eq!(config.noise, NoiseModel::PerChannel { sigma: vec![0.1, 0.3] });
    assert_eq!(config.seed_policy.master_seed, 77);
    assert_eq!(config.checkpoint.max_to_keep, 4);
    assert_eq!(config.output.run_directory, Some(PathBuf::from("runs/a")));
    config.validate(2).unwrap();
    assert_eq!(config.validate(1).unwrap_err().info().code, "noise-channels");
}

#[test]
fn zero_utility_draws_are_rejected() {
    let config: DesignConfig =
        serde_yaml::from_str("selector:\n  utility_draws: 0\n").unwrap();
    assert_eq!(config.validate(1).unwrap_err().info().code, "utility-draws");
}

#[test]
fn candidate_layouts_expand() {
    let grid: CandidateLayout = serde_yaml::from_str(
        "type: grid\naxes:\n  - {start: 0.0, stop: 1.0, count: 5}\n  - [10.0, 20.0]\n",
    )
    .unwrap();
    let set = grid.build().unwrap();
    assert_eq!(set.len(), 10);
    assert_eq!(set.dimension(), 2);
    assert_eq!(set.settings()[9].values(), &[1.0, 20.0]);

    let list: CandidateLayout =
        serde_yaml::from_str("type: list\nsettings: [[0.5], [1.5]]\n").unwrap();
    assert_eq!(list.build().unwrap().len(), 2);

    let empty: CandidateLayout = serde_yaml::from_str("type: list\nsettings: []\n").unwrap();
    assert_eq!(empty.build().unwrap_err().info().code, "candidates-empty");
}

#[test]
fn model_kinds_parse() {
    let kind: ModelKind = serde_yaml::from_str("type: linear\n").unwrap();
    assert_eq!(kind, ModelKind::Linear);
    assert_eq!(kind.build().parameter_dim(), 2);
}
