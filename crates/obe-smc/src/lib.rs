#![deny(missing_docs)]

//! Weighted particle approximation of a parameter posterior.
//!
//! A [`ParticleDistribution`] is drawn from a [`Prior`], reweighted in log
//! space as measurements arrive, and restored by resampling plus a Liu-West
//! shrinkage kernel once its effective sample size collapses.

/// Particle cloud configuration and defaults.
pub mod config;
/// Liu-West diversification kernel.
pub mod diversify;
/// Noise models and Gaussian log likelihoods.
pub mod likelihood;
/// The particle distribution itself.
pub mod particles;
/// Per-parameter priors and support bounds.
pub mod prior;
/// Systematic and multinomial resampling.
pub mod resample;
/// Weighted statistics and point estimates.
pub mod summary;

pub use config::{KernelConfig, ResampleScheme, SmcConfig};
pub use diversify::{KernelFactor, KernelReport};
pub use likelihood::{LikelihoodTerms, NoiseModel};
pub use particles::{DistributionSnapshot, DistributionState, ParticleDistribution, UpdateReport};
pub use prior::{Bounds, NamedPrior, ParameterPrior, Prior};
pub use summary::{CredibleInterval, ParameterSummary};
