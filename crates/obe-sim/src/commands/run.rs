use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use obe_design::run as run_design;
use tracing::info;

use super::{print_json, write_json};
use crate::scenario::Scenario;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML scenario describing the prior, candidates, model and truth.
    #[arg(long)]
    pub scenario: PathBuf,
    /// Output directory for metrics, checkpoints and the manifest.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Override the number of cycles.
    #[arg(long)]
    pub cycles: Option<usize>,
    /// Override the master seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let scenario =
        Scenario::load(&args.scenario)?.with_overrides(args.out.as_ref(), args.cycles, args.seed);
    let mut engine = scenario.engine()?;
    let simulator = scenario.simulator()?;
    info!(
        scenario = %args.scenario.display(),
        model = engine.model().name(),
        candidates = engine.settings().len(),
        cycles = scenario.design.cycles,
        "starting design run"
    );

    let summary = run_design(&mut engine, &simulator)?;

    if let Some(dir) = &scenario.design.output.run_directory {
        // keep the resolved scenario next to the artefacts for `resume`
        std::fs::write(dir.join("scenario.yaml"), serde_yaml::to_string(&scenario)?)?;
        write_json(&dir.join("summary.json"), &summary.final_estimate)?;
    }
    print_json(&summary.final_estimate)
}
