use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::CandidateSetting;
use serde::{Deserialize, Serialize};

/// Values taken by one setting axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Axis {
    /// Explicit values.
    Values(Vec<f64>),
    /// `count` evenly spaced values from `start` to `stop` inclusive.
    Linspace {
        /// First value.
        start: f64,
        /// Last value.
        stop: f64,
        /// Number of values.
        count: usize,
    },
}

impl Axis {
    /// Expands the axis into its values.
    pub fn values(&self) -> Vec<f64> {
        match self {
            Axis::Values(values) => values.clone(),
            Axis::Linspace { start, stop, count } => linspace(*start, *stop, *count),
        }
    }
}

/// Serializable description of a candidate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CandidateLayout {
    /// Full Cartesian product of per-axis values.
    Grid {
        /// One entry per setting axis.
        axes: Vec<Axis>,
    },
    /// Explicit settings.
    List {
        /// One entry per candidate.
        settings: Vec<Vec<f64>>,
    },
}

impl CandidateLayout {
    /// Builds the candidate set.
    pub fn build(&self) -> Result<CandidateSet, ObeError> {
        match self {
            CandidateLayout::Grid { axes } => {
                CandidateSet::grid(axes.iter().map(Axis::values).collect())
            }
            CandidateLayout::List { settings } => CandidateSet::from_settings(
                settings.iter().cloned().map(CandidateSetting::new).collect(),
            ),
        }
    }
}

/// Finite batch of T candidate settings, each with M control values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CandidateSetting>", into = "Vec<CandidateSetting>")]
pub struct CandidateSet {
    settings: Vec<CandidateSetting>,
}

impl CandidateSet {
    /// Cartesian grid over `axes`, last axis varying fastest.
    pub fn grid(axes: Vec<Vec<f64>>) -> Result<Self, ObeError> {
        if axes.is_empty() {
            return Err(ObeError::configuration(
                "candidates-empty",
                "candidate grid needs at least one axis",
            ));
        }
        if let Some(axis) = axes.iter().position(Vec::is_empty) {
            return Err(ObeError::Configuration(
                ErrorInfo::new("candidates-empty", "candidate axis has no values")
                    .with_context("axis", axis),
            ));
        }
        let mut settings = vec![Vec::with_capacity(axes.len())];
        for axis in &axes {
            settings = settings
                .into_iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |&value| {
                        let mut next = prefix.clone();
                        next.push(value);
                        next
                    })
                })
                .collect();
        }
        Self::from_settings(settings.into_iter().map(CandidateSetting::new).collect())
    }

    /// Uses the given settings in order.
    pub fn from_settings(settings: Vec<CandidateSetting>) -> Result<Self, ObeError> {
        let first = settings.first().ok_or_else(|| {
            ObeError::configuration("candidates-empty", "candidate set has no settings")
        })?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(ObeError::configuration(
                "setting-dimension",
                "candidate settings need at least one axis",
            ));
        }
        for (index, setting) in settings.iter().enumerate() {
            if setting.len() != dimension {
                return Err(ObeError::Configuration(
                    ErrorInfo::new("setting-dimension", "candidate settings differ in length")
                        .with_context("candidate", index)
                        .with_context("expected", dimension)
                        .with_context("actual", setting.len()),
                ));
            }
            if setting.values().iter().any(|v| !v.is_finite()) {
                return Err(ObeError::Configuration(
                    ErrorInfo::new("setting-non-finite", "candidate setting is not finite")
                        .with_context("candidate", index),
                ));
            }
        }
        Ok(Self { settings })
    }

    /// Number of candidates (T).
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Always `false` for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Control values per candidate (M).
    pub fn dimension(&self) -> usize {
        self.settings.first().map_or(0, CandidateSetting::len)
    }

    /// Candidates in order.
    pub fn settings(&self) -> &[CandidateSetting] {
        &self.settings
    }

    /// Candidate at `index`.
    pub fn get(&self, index: usize) -> Option<&CandidateSetting> {
        self.settings.get(index)
    }
}

impl TryFrom<Vec<CandidateSetting>> for CandidateSet {
    type Error = ObeError;

    fn try_from(settings: Vec<CandidateSetting>) -> Result<Self, Self::Error> {
        CandidateSet::from_settings(settings)
    }
}

impl From<CandidateSet> for Vec<CandidateSetting> {
    fn from(set: CandidateSet) -> Self {
        set.settings
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i + 1 == count { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_varies_last_axis_fastest() {
        let set = CandidateSet::grid(vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]]).unwrap();
        assert_eq!(set.len(), 6);
        assert_eq!(set.dimension(), 2);
        assert_eq!(set.settings()[0].values(), &[0.0, 10.0]);
        assert_eq!(set.settings()[1].values(), &[0.0, 20.0]);
        assert_eq!(set.settings()[3].values(), &[1.0, 10.0]);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let values = linspace(0.0, 1.0, 101);
        assert_eq!(values.len(), 101);
        assert_eq!(values[0], 0.0);
        assert_eq!(values[100], 1.0);
        assert!((values[50] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_and_ragged_sets_are_rejected() {
        assert!(CandidateSet::from_settings(Vec::new()).is_err());
        assert!(CandidateSet::grid(vec![vec![1.0], Vec::new()]).is_err());
        let ragged = vec![
            CandidateSetting::new(vec![1.0]),
            CandidateSetting::new(vec![1.0, 2.0]),
        ];
        assert_eq!(
            CandidateSet::from_settings(ragged).unwrap_err().info().code,
            "setting-dimension"
        );
    }
}
