use std::path::PathBuf;

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::SettingSelector;
use obe_smc::{NoiseModel, SmcConfig};
use serde::{Deserialize, Serialize};

use crate::selector::{Greedy, Pickiness, Softmax};

/// YAML-configurable parameters governing a design campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    /// Number of measure/update cycles driven by [`crate::run::run`].
    #[serde(default = "default_cycles")]
    pub cycles: usize,
    /// Particle cloud settings.
    #[serde(default)]
    pub smc: SmcConfig,
    /// Setting selection policy and utility options.
    #[serde(default)]
    pub selector: SelectorConfig,
    /// Measurement noise assumed by the likelihood and utility.
    #[serde(default)]
    pub noise: NoiseModel,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_cycles() -> usize {
    50
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            smc: SmcConfig::default(),
            selector: SelectorConfig::default(),
            noise: NoiseModel::default(),
            seed_policy: SeedPolicy::default(),
            checkpoint: CheckpointConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl DesignConfig {
    /// Validates every section against a model with `channels` observables.
    pub fn validate(&self, channels: usize) -> Result<(), ObeError> {
        self.smc.validate()?;
        self.noise.validate(channels)?;
        self.selector.validate()
    }
}

/// Selection policy plus utility evaluation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectorConfig {
    /// Policy turning utilities into a setting.
    #[serde(default)]
    pub policy: SelectionPolicy,
    /// Score utilities on this many weight-proportional particle draws
    /// instead of the whole cloud. `None` uses every particle.
    #[serde(default)]
    pub utility_draws: Option<usize>,
}

impl SelectorConfig {
    fn validate(&self) -> Result<(), ObeError> {
        if self.utility_draws == Some(0) {
            return Err(ObeError::configuration(
                "utility-draws",
                "utility_draws must be positive when set",
            ));
        }
        self.policy.validate()
    }
}

/// Built-in selection policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Highest utility, first index on ties.
    #[default]
    Greedy,
    /// Draw proportional to `exp(U / temperature)`.
    Softmax {
        /// Softmax temperature; zero reduces to greedy.
        temperature: f64,
    },
    /// Draw proportional to `U ^ exponent`.
    Pickiness {
        /// Sharpness of the draw; large values approach greedy.
        #[serde(default = "default_pickiness")]
        exponent: f64,
    },
}

fn default_pickiness() -> f64 {
    15.0
}

impl SelectionPolicy {
    fn validate(&self) -> Result<(), ObeError> {
        let (name, value) = match self {
            SelectionPolicy::Greedy => return Ok(()),
            SelectionPolicy::Softmax { temperature } => ("temperature", *temperature),
            SelectionPolicy::Pickiness { exponent } => ("exponent", *exponent),
        };
        if !(value.is_finite() && value >= 0.0) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("selection-policy", "policy parameter must be finite and >= 0")
                    .with_context(name, value),
            ));
        }
        Ok(())
    }

    /// Instantiates the selector described by this policy.
    pub fn build(&self) -> Result<Box<dyn SettingSelector>, ObeError> {
        self.validate()?;
        Ok(match self {
            SelectionPolicy::Greedy => Box::new(Greedy),
            SelectionPolicy::Softmax { temperature } => Box::new(Softmax::new(*temperature)?),
            SelectionPolicy::Pickiness { exponent } => Box::new(Pickiness::new(*exponent)?),
        })
    }
}

/// Master seed from which every stage substream is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x0BE5_EED0_0BE5_EED0_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// How often engine state is persisted during [`crate::run::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in cycles between checkpoint writes (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Where run artefacts are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Nothing is written when unset.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Metrics filename relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Checkpoint subdirectory under `run_directory`.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}
