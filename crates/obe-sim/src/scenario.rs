//! Scenario files: a design configuration plus everything needed to
//! simulate the experiment it drives.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use obe_core::ObeError;
use obe_design::{CandidateLayout, DesignConfig, DesignEngine, ModelKind, ModelSimulator};
use obe_smc::Prior;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub design: DesignConfig,
    pub prior: Prior,
    pub candidates: CandidateLayout,
    pub model: ModelKind,
    /// Optional per-candidate measurement cost.
    #[serde(default)]
    pub costs: Option<Vec<f64>>,
    /// Parameters the simulator measures.
    pub truth: Vec<f64>,
    /// Standard deviation of the simulated measurement noise.
    #[serde(default = "default_measurement_noise")]
    pub measurement_noise: f64,
}

fn default_measurement_noise() -> f64 {
    0.1
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Applies command line overrides on top of the file.
    pub fn with_overrides(
        mut self,
        out: Option<&PathBuf>,
        cycles: Option<usize>,
        seed: Option<u64>,
    ) -> Self {
        if let Some(out) = out {
            self.design.output.run_directory = Some(out.clone());
        }
        if let Some(cycles) = cycles {
            self.design.cycles = cycles;
        }
        if let Some(seed) = seed {
            self.design.seed_policy.master_seed = seed;
        }
        self
    }

    pub fn engine(&self) -> Result<DesignEngine, ObeError> {
        let engine = DesignEngine::new(
            self.design.clone(),
            self.prior.clone(),
            self.model.build(),
            self.candidates.build()?,
        )?;
        match &self.costs {
            Some(costs) => engine.with_costs(costs.clone()),
            None => Ok(engine),
        }
    }

    pub fn simulator(&self) -> Result<ModelSimulator, ObeError> {
        ModelSimulator::new(self.model.build(), self.truth.clone(), self.measurement_noise)
    }
}
