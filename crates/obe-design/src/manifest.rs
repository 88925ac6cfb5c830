use std::collections::BTreeMap;
use std::fs;
use std::iter::FromIterator;
use std::path::{Path, PathBuf};

use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{RunProvenance, SchemaVersion};
use obe_smc::ParameterSummary;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::config::DesignConfig;

/// Schema written by this version of the engine.
pub const MANIFEST_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Structured manifest describing a completed design campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema of this manifest.
    pub schema: SchemaVersion,
    /// Configuration used for the run.
    pub config: DesignConfig,
    /// Hashes, seed, model name and timestamp.
    pub provenance: RunProvenance,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Cycles completed when the manifest was written.
    pub cycles_completed: usize,
    /// Number of resample events over the run.
    pub resamples: usize,
    /// Posterior summary at the end of the run.
    pub final_estimate: ParameterSummary,
    /// Metrics file produced during the run (relative to run directory).
    pub metrics_file: Option<PathBuf>,
    /// Checkpoint files retained at the end of the run, oldest first.
    pub checkpoints: Vec<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), ObeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ObeError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ObeError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            ObeError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }
}

/// Provenance for a run of `model_name` under `config`.
pub fn provenance(config: &DesignConfig, model_name: &str) -> Result<RunProvenance, ObeError> {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    Ok(RunProvenance {
        config_hash: stable_hash_string(config)?,
        model_name: model_name.to_string(),
        seed: config.seed_policy.master_seed,
        created_at: chrono::Utc::now().to_rfc3339(),
        tool_versions,
    })
}

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, ObeError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}

/// JSON bytes with object keys in sorted order.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ObeError> {
    let value = serde_json::to_value(value)
        .map_err(|err| ObeError::Serde(ErrorInfo::new("json-encode", err.to_string())))?;
    serde_json::to_vec(&canonicalize(value))
        .map_err(|err| ObeError::Serde(ErrorInfo::new("json-write", err.to_string())))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, val)| (key, canonicalize(val)))
                .collect();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
