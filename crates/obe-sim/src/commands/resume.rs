use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use obe_design::{run as run_design, CheckpointPayload, DesignEngine};

use super::print_json;
use crate::scenario::Scenario;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Checkpoint written by `obe-sim run`.
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// Scenario supplying the model and simulated truth.
    #[arg(long)]
    pub scenario: PathBuf,
    /// Redirect artefacts of the resumed run.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Extend the campaign to this many cycles in total.
    #[arg(long)]
    pub cycles: Option<usize>,
}

pub fn run(args: &ResumeArgs) -> Result<(), Box<dyn Error>> {
    let scenario = Scenario::load(&args.scenario)?;
    let mut payload = CheckpointPayload::load(&args.checkpoint)?;
    if let Some(out) = &args.out {
        payload.config.output.run_directory = Some(out.clone());
    }
    if let Some(cycles) = args.cycles {
        payload.config.cycles = cycles;
    }
    let mut engine = DesignEngine::resume(payload, scenario.model.build())?;
    let summary = run_design(&mut engine, &scenario.simulator()?)?;
    print_json(&summary.final_estimate)
}
