use obe_core::{derive_substream_seed, RngHandle};

/// Random stream consumers within one design cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Drawing the particle cloud from the prior.
    Initialize,
    /// Particle subsampling for utility scoring.
    Utility,
    /// Stochastic setting selection.
    Select,
    /// Resampling after degeneracy.
    Resample,
    /// Liu-West jitter.
    Diversify,
    /// Simulated measurement noise.
    Simulate,
}

impl Stage {
    fn slot(self) -> u64 {
        match self {
            Stage::Initialize => 0,
            Stage::Utility => 1,
            Stage::Select => 2,
            Stage::Resample => 3,
            Stage::Diversify => 4,
            Stage::Simulate => 5,
        }
    }
}

/// Derives the deterministic seed for `stage` of round `round`.
///
/// `round` is the cycle index for every stage except [`Stage::Initialize`],
/// where it counts resets.
pub fn stage_seed(master_seed: u64, round: usize, stage: Stage) -> u64 {
    let intermediate = derive_substream_seed(master_seed, stage.slot());
    derive_substream_seed(intermediate, round as u64)
}

/// Fresh RNG handle for `stage` of round `round`.
pub fn stage_rng(master_seed: u64, round: usize, stage: Stage) -> RngHandle {
    RngHandle::from_seed(stage_seed(master_seed, round, stage))
}
