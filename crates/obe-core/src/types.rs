use serde::{Deserialize, Serialize};

/// A vector of experimental control values (one entry per setting axis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CandidateSetting(Vec<f64>);

impl CandidateSetting {
    /// Wraps raw control values.
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Returns the control values.
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Number of control axes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the setting has no axes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the setting and returns the raw values.
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for CandidateSetting {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Model output for one `(parameters, setting)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted observable, one entry per channel.
    pub values: Vec<f64>,
    /// Predicted noise standard deviation per channel, for heteroskedastic models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<Vec<f64>>,
}

impl Prediction {
    /// Single-channel prediction without a noise estimate.
    pub fn scalar(value: f64) -> Self {
        Self {
            values: vec![value],
            noise: None,
        }
    }

    /// Multi-channel prediction without a noise estimate.
    pub fn channels(values: Vec<f64>) -> Self {
        Self {
            values,
            noise: None,
        }
    }

    /// Attaches a per-channel noise estimate.
    pub fn with_noise(mut self, noise: Vec<f64>) -> Self {
        self.noise = Some(noise);
        self
    }
}

/// An outcome reported by the caller after measuring at `setting`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Setting at which the measurement was taken.
    pub setting: CandidateSetting,
    /// Measured value per observable channel.
    pub values: Vec<f64>,
    /// Measurement standard deviation per channel, when the caller knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Vec<f64>>,
}

impl Measurement {
    /// Single-channel measurement without a reported uncertainty.
    pub fn scalar(setting: CandidateSetting, value: f64) -> Self {
        Self {
            setting,
            values: vec![value],
            uncertainty: None,
        }
    }

    /// Attaches a per-channel measurement uncertainty.
    pub fn with_uncertainty(mut self, sigma: Vec<f64>) -> Self {
        self.uncertainty = Some(sigma);
        self
    }
}
