use obe_core::errors::{ErrorInfo, ObeError};
use obe_core::{RngHandle, SettingSelector};

/// Picks the highest utility; ties go to the lowest index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Greedy;

/// Draws a candidate with probability proportional to `exp(U / temperature)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Softmax {
    temperature: f64,
}

/// Draws a candidate with probability proportional to `U ^ exponent`.
///
/// Large exponents concentrate on the best settings while still spreading
/// measurements over near-optimal ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pickiness {
    exponent: f64,
}

impl Softmax {
    /// Creates the policy; `temperature == 0` behaves like [`Greedy`].
    pub fn new(temperature: f64) -> Result<Self, ObeError> {
        check_parameter("temperature", temperature)?;
        Ok(Self { temperature })
    }

    /// Configured temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

impl Pickiness {
    /// Creates the policy.
    pub fn new(exponent: f64) -> Result<Self, ObeError> {
        check_parameter("exponent", exponent)?;
        Ok(Self { exponent })
    }

    /// Configured exponent.
    pub fn exponent(&self) -> f64 {
        self.exponent
    }
}

impl SettingSelector for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn select(&self, utilities: &[f64], _rng: &mut RngHandle) -> Result<usize, ObeError> {
        check_utilities(utilities)?;
        Ok(arg_max(utilities))
    }
}

impl SettingSelector for Softmax {
    fn name(&self) -> &str {
        "softmax"
    }

    fn select(&self, utilities: &[f64], rng: &mut RngHandle) -> Result<usize, ObeError> {
        check_utilities(utilities)?;
        if self.temperature == 0.0 {
            return Ok(arg_max(utilities));
        }
        let peak = utilities[arg_max(utilities)];
        let odds: Vec<f64> = utilities
            .iter()
            .map(|u| ((u - peak) / self.temperature).exp())
            .collect();
        Ok(draw_index(&odds, rng))
    }
}

impl SettingSelector for Pickiness {
    fn name(&self) -> &str {
        "pickiness"
    }

    fn select(&self, utilities: &[f64], rng: &mut RngHandle) -> Result<usize, ObeError> {
        check_utilities(utilities)?;
        let peak = utilities[arg_max(utilities)];
        if peak <= 0.0 {
            let uniform = vec![1.0; utilities.len()];
            return Ok(draw_index(&uniform, rng));
        }
        // scaled by the peak so large exponents cannot overflow
        let odds: Vec<f64> = utilities
            .iter()
            .map(|u| (u.max(0.0) / peak).powf(self.exponent))
            .collect();
        Ok(draw_index(&odds, rng))
    }
}

fn check_parameter(name: &str, value: f64) -> Result<(), ObeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ObeError::Configuration(
            ErrorInfo::new("selection-policy", "policy parameter must be finite and >= 0")
                .with_context(name, value),
        ))
    }
}

fn check_utilities(utilities: &[f64]) -> Result<(), ObeError> {
    if utilities.is_empty() {
        return Err(ObeError::configuration(
            "candidates-empty",
            "cannot select from an empty candidate set",
        ));
    }
    if let Some(index) = utilities.iter().position(|u| !u.is_finite()) {
        return Err(ObeError::NumericalDegeneracy(
            ErrorInfo::new("utility-non-finite", "utility is not finite")
                .with_context("candidate", index),
        ));
    }
    Ok(())
}

fn arg_max(utilities: &[f64]) -> usize {
    let mut best = 0;
    for (index, &u) in utilities.iter().enumerate().skip(1) {
        if u > utilities[best] {
            best = index;
        }
    }
    best
}

/// Categorical draw over non-negative odds with a positive sum.
fn draw_index(odds: &[f64], rng: &mut RngHandle) -> usize {
    let total: f64 = odds.iter().sum();
    let target = rng.unit() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (index, &odds) in odds.iter().enumerate() {
        if odds > 0.0 {
            cumulative += odds;
            last_positive = index;
            if target < cumulative {
                return index;
            }
        }
    }
    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_index_skips_zero_odds() {
        let mut rng = RngHandle::from_seed(1);
        for _ in 0..200 {
            assert_eq!(draw_index(&[0.0, 3.0, 0.0], &mut rng), 1);
        }
    }

    #[test]
    fn arg_max_prefers_first_tie() {
        assert_eq!(arg_max(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(arg_max(&[0.0, 0.0]), 0);
    }
}
