//! Structured error types shared across OBE crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`ObeError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Kebab-case code such as `evidence-underflow`.
    pub code: String,
    /// What went wrong, in prose.
    pub message: String,
    /// Contextual key value pairs (dimensions, indices, values).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Suggested fix, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with `code` and `message` and no context.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records a key/value pair, e.g. the offending particle index.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Attaches a suggested fix.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the design engine.
///
/// Families follow the failure taxonomy of the inference loop:
/// configuration problems are fatal at construction, model evaluation
/// failures are fatal for the current cycle, and numerical degeneracy is
/// recoverable by the caller (reset or skip the measurement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum ObeError {
    /// Bad prior, dimension mismatch, invalid particle count or policy.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// The external model function failed or returned malformed output.
    #[error("model evaluation error: {0}")]
    ModelEvaluation(ErrorInfo),
    /// Every particle weight collapsed under the reported measurement.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(ErrorInfo),
    /// Serialization, schema and filesystem errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl ObeError {
    /// Shorthand for a [`ObeError::Configuration`] error.
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        ObeError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`ObeError::ModelEvaluation`] error.
    pub fn model(code: impl Into<String>, message: impl Into<String>) -> Self {
        ObeError::ModelEvaluation(ErrorInfo::new(code, message))
    }

    /// Structured payload shared by every variant.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ObeError::Configuration(info)
            | ObeError::ModelEvaluation(info)
            | ObeError::NumericalDegeneracy(info)
            | ObeError::Serde(info) => info,
        }
    }

    /// Returns `true` when the caller may continue with the same instance.
    ///
    /// Model failures and degeneracy leave the particle state untouched, so
    /// the run can carry on after the caller decides how to react.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ObeError::ModelEvaluation(_) | ObeError::NumericalDegeneracy(_)
        )
    }
}
