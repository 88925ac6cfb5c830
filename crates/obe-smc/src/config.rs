use serde::{Deserialize, Serialize};

use obe_core::errors::{ErrorInfo, ObeError};

/// YAML-configurable parameters governing the particle approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmcConfig {
    /// Number of particles drawn from the prior.
    #[serde(default = "default_particles")]
    pub particles: usize,
    /// Smallest particle count accepted at initialization.
    #[serde(default = "default_min_particles")]
    pub min_particles: usize,
    /// Resample when `ess < resample_threshold * particles`.
    #[serde(default = "default_resample_threshold")]
    pub resample_threshold: f64,
    /// Resampling scheme used when degeneracy is detected.
    #[serde(default)]
    pub scheme: ResampleScheme,
    /// Post-resample diversification kernel.
    #[serde(default)]
    pub kernel: KernelConfig,
    /// Lowest accepted log evidence for a single update.
    ///
    /// Measurements whose total log likelihood falls below this are treated
    /// as impossible under the current model and rejected.
    #[serde(default = "default_evidence_floor")]
    pub evidence_floor: f64,
    /// Probability mass of the central credible intervals in summaries.
    #[serde(default = "default_credible_mass")]
    pub credible_mass: f64,
}

fn default_particles() -> usize {
    1000
}

fn default_min_particles() -> usize {
    2
}

fn default_resample_threshold() -> f64 {
    0.5
}

fn default_evidence_floor() -> f64 {
    f64::MIN_POSITIVE.ln()
}

fn default_credible_mass() -> f64 {
    0.95
}

impl Default for SmcConfig {
    fn default() -> Self {
        Self {
            particles: default_particles(),
            min_particles: default_min_particles(),
            resample_threshold: default_resample_threshold(),
            scheme: ResampleScheme::default(),
            kernel: KernelConfig::default(),
            evidence_floor: default_evidence_floor(),
            credible_mass: default_credible_mass(),
        }
    }
}

impl SmcConfig {
    /// Checks ranges that cannot be expressed in the type system.
    pub fn validate(&self) -> Result<(), ObeError> {
        let floor = self.min_particles.max(1);
        if self.particles < floor {
            return Err(ObeError::Configuration(
                ErrorInfo::new("particles-too-few", "particle count below minimum")
                    .with_context("particles", self.particles)
                    .with_context("min_particles", floor)
                    .with_hint("increase `particles` in the smc configuration"),
            ));
        }
        if !(self.resample_threshold > 0.0 && self.resample_threshold <= 1.0) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("resample-threshold", "threshold must lie in (0, 1]")
                    .with_context("resample_threshold", self.resample_threshold),
            ));
        }
        if !(self.kernel.shrinkage > 0.0 && self.kernel.shrinkage <= 1.0) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("kernel-shrinkage", "Liu-West shrinkage must lie in (0, 1]")
                    .with_context("shrinkage", self.kernel.shrinkage),
            ));
        }
        if !(self.credible_mass > 0.0 && self.credible_mass < 1.0) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("credible-mass", "credible mass must lie in (0, 1)")
                    .with_context("credible_mass", self.credible_mass),
            ));
        }
        if self.evidence_floor.is_nan() {
            return Err(ObeError::configuration(
                "evidence-floor",
                "evidence floor must not be NaN",
            ));
        }
        Ok(())
    }
}

/// Resampling algorithm applied when the effective sample size drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleScheme {
    /// One uniform offset, N evenly spaced pointers (lowest variance).
    #[default]
    Systematic,
    /// N independent categorical draws.
    Multinomial,
}

/// Liu-West kernel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Shrinkage `a`: particles move to `a x + (1 - a) mean` before jitter of
    /// covariance `(1 - a^2) cov`. `1.0` disables diversification.
    #[serde(default = "default_shrinkage")]
    pub shrinkage: f64,
    /// Relative ridge added to the covariance diagonal when the Cholesky
    /// factorization fails.
    #[serde(default = "default_ridge")]
    pub ridge: f64,
}

fn default_shrinkage() -> f64 {
    0.98
}

fn default_ridge() -> f64 {
    1e-10
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            shrinkage: default_shrinkage(),
            ridge: default_ridge(),
        }
    }
}
