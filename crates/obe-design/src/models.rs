//! Ready-made model functions for demos, tests and the simulator CLI.

use std::fmt;

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{ModelFunction, Prediction};
use serde::{Deserialize, Serialize};

/// Measures one parameter directly, whatever the setting: `y = theta`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl ModelFunction for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn parameter_dim(&self) -> usize {
        1
    }

    fn setting_dim(&self) -> usize {
        1
    }

    fn predict(&self, parameters: &[f64], _setting: &[f64]) -> Result<Prediction, ObeError> {
        Ok(Prediction::scalar(parameters[0]))
    }
}

/// Straight line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linear;

impl ModelFunction for Linear {
    fn name(&self) -> &str {
        "linear"
    }

    fn parameter_dim(&self) -> usize {
        2
    }

    fn setting_dim(&self) -> usize {
        1
    }

    fn predict(&self, parameters: &[f64], setting: &[f64]) -> Result<Prediction, ObeError> {
        Ok(Prediction::scalar(parameters[0] + parameters[1] * setting[0]))
    }
}

/// Lorentzian peak `A / (1 + (x - x0)^2 / dx^2)` with fixed height `A`.
///
/// Parameters are the centre `x0` and half width `dx`; the only setting is
/// the probe position `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lorentzian {
    amplitude: f64,
}

impl Lorentzian {
    /// Peak with height `amplitude`.
    pub fn new(amplitude: f64) -> Self {
        Self { amplitude }
    }
}

impl Default for Lorentzian {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ModelFunction for Lorentzian {
    fn name(&self) -> &str {
        "lorentzian"
    }

    fn parameter_dim(&self) -> usize {
        2
    }

    fn setting_dim(&self) -> usize {
        1
    }

    fn constants(&self) -> Vec<f64> {
        vec![self.amplitude]
    }

    fn predict(&self, parameters: &[f64], setting: &[f64]) -> Result<Prediction, ObeError> {
        let (x0, dx) = (parameters[0], parameters[1]);
        if dx == 0.0 {
            return Err(ObeError::ModelEvaluation(
                ErrorInfo::new("model-domain", "line width must be non-zero")
                    .with_context("dx", dx),
            ));
        }
        let offset = (setting[0] - x0) / dx;
        Ok(Prediction::scalar(self.amplitude / (1.0 + offset * offset)))
    }
}

type PredictFn = dyn Fn(&[f64], &[f64]) -> Result<Prediction, ObeError> + Send + Sync;

/// Model backed by a closure.
pub struct FnModel {
    name: String,
    parameter_dim: usize,
    setting_dim: usize,
    observable_dim: usize,
    constants: Vec<f64>,
    predict: Box<PredictFn>,
}

impl FnModel {
    /// Wraps `predict` as a single-channel model.
    pub fn new<F>(
        name: impl Into<String>,
        parameter_dim: usize,
        setting_dim: usize,
        predict: F,
    ) -> Self
    where
        F: Fn(&[f64], &[f64]) -> Result<Prediction, ObeError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameter_dim,
            setting_dim,
            observable_dim: 1,
            constants: Vec::new(),
            predict: Box::new(predict),
        }
    }

    /// Declares the number of observable channels.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.observable_dim = channels;
        self
    }

    /// Records model constants reported through [`ModelFunction::constants`].
    pub fn with_constants(mut self, constants: Vec<f64>) -> Self {
        self.constants = constants;
        self
    }
}

impl fmt::Debug for FnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("name", &self.name)
            .field("parameter_dim", &self.parameter_dim)
            .field("setting_dim", &self.setting_dim)
            .field("observable_dim", &self.observable_dim)
            .finish()
    }
}

impl ModelFunction for FnModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_dim(&self) -> usize {
        self.parameter_dim
    }

    fn setting_dim(&self) -> usize {
        self.setting_dim
    }

    fn observable_dim(&self) -> usize {
        self.observable_dim
    }

    fn constants(&self) -> Vec<f64> {
        self.constants.clone()
    }

    fn predict(&self, parameters: &[f64], setting: &[f64]) -> Result<Prediction, ObeError> {
        (self.predict)(parameters, setting)
    }
}

/// Serializable choice among the built-in models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModelKind {
    /// [`Identity`].
    Identity,
    /// [`Linear`].
    Linear,
    /// [`Lorentzian`].
    Lorentzian {
        /// Peak height.
        #[serde(default = "default_amplitude")]
        amplitude: f64,
    },
}

fn default_amplitude() -> f64 {
    1.0
}

impl ModelKind {
    /// Instantiates the model.
    pub fn build(&self) -> Box<dyn ModelFunction> {
        match self {
            ModelKind::Identity => Box::new(Identity),
            ModelKind::Linear => Box::new(Linear),
            ModelKind::Lorentzian { amplitude } => Box::new(Lorentzian::new(*amplitude)),
        }
    }
}
