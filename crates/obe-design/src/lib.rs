#![deny(missing_docs)]

//! Sequential Bayesian experimental design on top of the `obe-smc` cloud.
//!
//! Each cycle the [`DesignEngine`] scores every candidate setting by its
//! expected information gain, hands the utilities to a selector, absorbs
//! the resulting measurement and reports the updated estimate. [`run`]
//! drives that loop against a [`Simulator`] and writes metrics, checkpoints
//! and a manifest when an output directory is configured.

/// Candidate settings and grid construction.
pub mod candidates;
/// Checkpoint payloads and retention.
pub mod checkpoint;
/// YAML configuration for a design campaign.
pub mod config;
/// Per-cycle, per-stage seed derivation.
pub mod determinism;
/// The design engine.
pub mod engine;
/// Batched model evaluation with shape and finiteness checks.
pub mod evaluator;
/// Run manifests and provenance hashing.
pub mod manifest;
/// Per-cycle diagnostics and CSV export.
pub mod metrics;
/// Built-in demo model functions.
pub mod models;
/// Simulated campaigns, checkpointed and resumable.
pub mod run;
/// Built-in setting selectors.
pub mod selector;
/// Expected information gain scoring.
pub mod utility;

pub use candidates::{Axis, CandidateLayout, CandidateSet};
pub use checkpoint::{CheckpointPayload, CHECKPOINT_SCHEMA};
pub use config::{
    CheckpointConfig, DesignConfig, OutputConfig, SeedPolicy, SelectionPolicy, SelectorConfig,
};
pub use determinism::{stage_rng, stage_seed, Stage};
pub use engine::{CycleReport, DesignEngine};
pub use evaluator::{ModelEvaluator, PredictionMatrix};
pub use manifest::RunManifest;
pub use metrics::{CycleRecord, CycleRecorder};
pub use models::{FnModel, Identity, Linear, Lorentzian, ModelKind};
pub use run::{resume, run, ModelSimulator, RunSummary, Simulator};
pub use selector::{Greedy, Pickiness, Softmax};
