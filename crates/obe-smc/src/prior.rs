use std::collections::BTreeSet;

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::RngHandle;
use serde::{Deserialize, Serialize};

/// Attempts allowed when drawing from a truncated normal before giving up.
const MAX_TRUNCATION_ATTEMPTS: usize = 10_000;

/// Sampling rule for a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ParameterPrior {
    /// Uniform on `[low, high]`.
    Uniform {
        /// Lower edge of the support.
        low: f64,
        /// Upper edge of the support.
        high: f64,
    },
    /// Uniform in `ln x` on `[low, high]`, `low > 0`.
    LogUniform {
        /// Lower edge of the support.
        low: f64,
        /// Upper edge of the support.
        high: f64,
    },
    /// Normal, optionally truncated to `[low, high]`.
    Normal {
        /// Location of the normal.
        mean: f64,
        /// Scale of the normal.
        std: f64,
        /// Optional lower truncation.
        #[serde(default)]
        low: Option<f64>,
        /// Optional upper truncation.
        #[serde(default)]
        high: Option<f64>,
    },
}

impl ParameterPrior {
    /// Support of the parameter, possibly unbounded.
    pub fn bounds(&self) -> Bounds {
        match self {
            ParameterPrior::Uniform { low, high } | ParameterPrior::LogUniform { low, high } => {
                Bounds::new(*low, *high)
            }
            ParameterPrior::Normal { low, high, .. } => Bounds::new(
                low.unwrap_or(f64::NEG_INFINITY),
                high.unwrap_or(f64::INFINITY),
            ),
        }
    }

    fn validate(&self, name: &str) -> Result<(), ObeError> {
        let degenerate = |reason: &str| {
            ObeError::Configuration(
                ErrorInfo::new("prior-degenerate", reason.to_string())
                    .with_context("parameter", name),
            )
        };
        match self {
            ParameterPrior::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(degenerate("uniform bounds must be finite"));
                }
                if high <= low {
                    return Err(degenerate("uniform range has zero or negative width"));
                }
            }
            ParameterPrior::LogUniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || *low <= 0.0 {
                    return Err(degenerate("log-uniform bounds must be finite and positive"));
                }
                if high <= low {
                    return Err(degenerate("log-uniform range has zero or negative width"));
                }
            }
            ParameterPrior::Normal { mean, std, .. } => {
                if !mean.is_finite() || !std.is_finite() || *std <= 0.0 {
                    return Err(degenerate("normal prior needs a finite mean and positive std"));
                }
                let bounds = self.bounds();
                if bounds.low.is_nan() || bounds.high.is_nan() || bounds.high <= bounds.low {
                    return Err(degenerate("normal truncation range has zero width"));
                }
            }
        }
        Ok(())
    }

    fn sample(&self, name: &str, rng: &mut RngHandle) -> Result<f64, ObeError> {
        match self {
            ParameterPrior::Uniform { low, high } => Ok(low + (high - low) * rng.unit()),
            ParameterPrior::LogUniform { low, high } => {
                let (ln_low, ln_high) = (low.ln(), high.ln());
                Ok((ln_low + (ln_high - ln_low) * rng.unit()).exp())
            }
            ParameterPrior::Normal { mean, std, .. } => {
                let bounds = self.bounds();
                for _ in 0..MAX_TRUNCATION_ATTEMPTS {
                    let draw = mean + std * rng.standard_normal();
                    if bounds.contains(draw) {
                        return Ok(draw);
                    }
                }
                Err(ObeError::Configuration(
                    ErrorInfo::new(
                        "prior-truncation",
                        "truncated normal rejected every draw",
                    )
                    .with_context("parameter", name)
                    .with_hint("widen the truncation range or move the mean inside it"),
                ))
            }
        }
    }
}

/// Closed interval bounding a parameter; infinite edges mean unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower edge.
    #[serde(with = "lower_edge")]
    pub low: f64,
    /// Upper edge.
    #[serde(with = "upper_edge")]
    pub high: f64,
}

// JSON has no infinities; unbounded edges travel as `null`.
fn serialize_edge<S: serde::Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(&value)
    } else {
        serializer.serialize_none()
    }
}

mod lower_edge {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize_edge(*value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

mod upper_edge {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize_edge(*value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

impl Bounds {
    /// Creates bounds from the two edges.
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Unbounded in both directions.
    pub const fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Returns `true` when `value` lies within the bounds.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Mirrors an out-of-range value back across the violated edge.
    ///
    /// Values that overshoot by more than the full width are clamped.
    pub fn reflect(&self, value: f64) -> f64 {
        let reflected = if value < self.low {
            2.0 * self.low - value
        } else if value > self.high {
            2.0 * self.high - value
        } else {
            return value;
        };
        reflected.clamp(self.low, self.high)
    }
}

/// A named parameter and its sampling rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPrior {
    /// Parameter name used in summaries and manifests.
    pub name: String,
    /// Sampling rule.
    #[serde(flatten)]
    pub prior: ParameterPrior,
}

/// Per-parameter prior over the full parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NamedPrior>", into = "Vec<NamedPrior>")]
pub struct Prior {
    parameters: Vec<NamedPrior>,
}

impl Prior {
    /// Builds and validates a prior.
    pub fn new(parameters: Vec<NamedPrior>) -> Result<Self, ObeError> {
        if parameters.is_empty() {
            return Err(ObeError::configuration(
                "prior-empty",
                "prior must describe at least one parameter",
            ));
        }
        let mut seen = BTreeSet::new();
        for parameter in &parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(ObeError::Configuration(
                    ErrorInfo::new("prior-duplicate", "parameter names must be unique")
                        .with_context("parameter", &parameter.name),
                ));
            }
            parameter.prior.validate(&parameter.name)?;
        }
        Ok(Self { parameters })
    }

    /// Convenience constructor for independent uniform parameters.
    pub fn uniform(ranges: &[(&str, f64, f64)]) -> Result<Self, ObeError> {
        Self::new(
            ranges
                .iter()
                .map(|(name, low, high)| NamedPrior {
                    name: (*name).to_string(),
                    prior: ParameterPrior::Uniform {
                        low: *low,
                        high: *high,
                    },
                })
                .collect(),
        )
    }

    /// Number of parameters (D).
    pub fn dimension(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter descriptors in order.
    pub fn parameters(&self) -> &[NamedPrior] {
        &self.parameters
    }

    /// Parameter names in order.
    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Per-parameter support.
    pub fn bounds(&self) -> Vec<Bounds> {
        self.parameters.iter().map(|p| p.prior.bounds()).collect()
    }

    /// Draws one parameter vector.
    pub fn sample(&self, rng: &mut RngHandle) -> Result<Vec<f64>, ObeError> {
        self.parameters
            .iter()
            .map(|p| p.prior.sample(&p.name, rng))
            .collect()
    }
}

impl TryFrom<Vec<NamedPrior>> for Prior {
    type Error = ObeError;

    fn try_from(parameters: Vec<NamedPrior>) -> Result<Self, Self::Error> {
        Prior::new(parameters)
    }
}

impl From<Prior> for Vec<NamedPrior> {
    fn from(prior: Prior) -> Self {
        prior.parameters
    }
}
