#![deny(missing_docs)]

//! Core traits and data types for the OBE sequential design engine.
//!
//! The engine is assembled from two injected capabilities: a
//! [`ModelFunction`] that maps parameters and settings to predicted
//! observables, and a [`SettingSelector`] that turns per-candidate utilities
//! into the next setting. Everything else (particle cloud, scoring, update
//! loop) lives in `obe-smc` and `obe-design` and only talks to the outside
//! world through these traits.

use std::fmt::Debug;

pub mod errors;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, ObeError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{CandidateSetting, Measurement, Prediction};

/// Describes a user supplied experimental model.
///
/// Implementations must be pure: the same `(parameters, setting)` pair
/// always yields the same prediction. Measurement noise is described
/// through [`Prediction::noise`] or the engine's noise model, never injected
/// inside the function.
pub trait ModelFunction: Send + Sync {
    /// Short identifier recorded in manifests and logs.
    fn name(&self) -> &str {
        "model"
    }

    /// Number of unknown parameters (D).
    fn parameter_dim(&self) -> usize;

    /// Number of experimental control axes (M).
    fn setting_dim(&self) -> usize;

    /// Number of observable channels (K).
    fn observable_dim(&self) -> usize {
        1
    }

    /// Model constants held fixed during inference.
    fn constants(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Evaluates the model for a single parameter vector and setting.
    fn predict(&self, parameters: &[f64], setting: &[f64]) -> Result<Prediction, ObeError>;

    /// Evaluates the model over the cross product of particles and settings.
    ///
    /// The result is indexed `[particle][setting]`. Models with a vectorized
    /// implementation should override this; the default loops over
    /// [`ModelFunction::predict`].
    fn predict_batch(
        &self,
        particles: &[Vec<f64>],
        settings: &[CandidateSetting],
    ) -> Result<Vec<Vec<Prediction>>, ObeError> {
        particles
            .iter()
            .map(|parameters| {
                settings
                    .iter()
                    .map(|setting| self.predict(parameters, setting.values()))
                    .collect()
            })
            .collect()
    }
}

/// Policy turning per-candidate utilities into a chosen candidate index.
pub trait SettingSelector: Debug + Send + Sync {
    /// Short identifier recorded in manifests and logs.
    fn name(&self) -> &str;

    /// Picks a candidate index in `0..utilities.len()`.
    ///
    /// Must never fail for a non-empty slice of finite utilities, including
    /// the case where every utility is identical.
    fn select(&self, utilities: &[f64], rng: &mut RngHandle) -> Result<usize, ObeError>;
}
