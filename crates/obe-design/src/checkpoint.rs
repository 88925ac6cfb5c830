use std::fs;
use std::path::{Path, PathBuf};

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::SchemaVersion;
use obe_smc::DistributionSnapshot;
use serde::{Deserialize, Serialize};

use crate::candidates::CandidateSet;
use crate::config::DesignConfig;

/// Schema written by this version of the engine.
pub const CHECKPOINT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Everything needed to resume a design campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    /// Schema of this payload.
    pub schema: SchemaVersion,
    /// Number of completed cycles.
    pub cycle: usize,
    /// Number of resets performed so far.
    #[serde(default)]
    pub resets: usize,
    /// Configuration snapshot associated with the run.
    pub config: DesignConfig,
    /// Name reported by the model the cloud was built for.
    pub model_name: String,
    /// Candidate settings.
    pub candidates: CandidateSet,
    /// Optional per-candidate costs.
    #[serde(default)]
    pub costs: Option<Vec<f64>>,
    /// Particle cloud.
    pub distribution: DistributionSnapshot,
}

impl CheckpointPayload {
    /// Restores the payload from disk.
    pub fn load(path: &Path) -> Result<Self, ObeError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        let payload: Self = serde_json::from_str(&contents).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        if !CHECKPOINT_SCHEMA.is_compatible_with(&payload.schema) {
            return Err(ObeError::Serde(
                ErrorInfo::new("checkpoint-schema", "unsupported checkpoint schema")
                    .with_context("path", path.display())
                    .with_context(
                        "found",
                        format!(
                            "{}.{}.{}",
                            payload.schema.major, payload.schema.minor, payload.schema.patch
                        ),
                    ),
            ));
        }
        Ok(payload)
    }

    /// Writes the payload to disk.
    pub fn store(&self, path: &Path) -> Result<(), ObeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ObeError::Serde(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }
}

/// Checkpoint file for the state after `cycle` completed cycles.
pub fn checkpoint_path(root: &Path, cycle: usize) -> PathBuf {
    root.join(format!("ckpt_{cycle:05}.json"))
}

/// Deletes the oldest checkpoints until at most `max_to_keep` remain.
pub fn enforce_retention(paths: &mut Vec<PathBuf>, max_to_keep: usize) -> Result<(), ObeError> {
    while paths.len() > max_to_keep {
        let path = paths.remove(0);
        fs::remove_file(&path).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("checkpoint-remove", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
    }
    Ok(())
}
