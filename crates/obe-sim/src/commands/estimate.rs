use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use obe_design::CheckpointPayload;
use obe_smc::ParticleDistribution;
use serde::Serialize;

use super::print_json;

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Checkpoint to summarise.
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// Probability mass of the reported credible intervals.
    #[arg(long)]
    pub mass: Option<f64>,
}

#[derive(Debug, Serialize)]
struct EstimateReport {
    cycle: usize,
    model: String,
    #[serde(flatten)]
    summary: obe_smc::ParameterSummary,
}

pub fn run(args: &EstimateArgs) -> Result<(), Box<dyn Error>> {
    let payload = CheckpointPayload::load(&args.checkpoint)?;
    let mut smc = payload.config.smc.clone();
    if let Some(mass) = args.mass {
        smc.credible_mass = mass;
    }
    let distribution = ParticleDistribution::from_snapshot(payload.distribution, &smc)?;
    print_json(&EstimateReport {
        cycle: payload.cycle,
        model: payload.model_name,
        summary: distribution.summary(),
    })
}
