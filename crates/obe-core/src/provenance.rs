//! Provenance and schema descriptors shared across OBE artifacts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version tag stored in checkpoints and manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when old payloads can no longer be read.
    pub major: u32,
    /// Bumped when fields are added.
    pub minor: u32,
    /// Bumped for fixes that leave the layout alone.
    pub patch: u32,
}

impl SchemaVersion {
    /// `major.minor.patch`.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `true` if a payload written with `other` can be read by `self`.
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major && self.minor >= other.minor
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Provenance information attached to checkpoints and run manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// SHA-256 of the canonical JSON configuration used for the run.
    pub config_hash: String,
    /// Name reported by the model capability.
    pub model_name: String,
    /// Master seed of the run.
    pub seed: u64,
    /// RFC 3339 timestamp recording when the artifact was generated.
    pub created_at: String,
    /// Crate name to version for everything that produced the artefact.
    pub tool_versions: BTreeMap<String, String>,
}
