use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use obe_design::{CheckpointPayload, DesignEngine};

use crate::scenario::Scenario;

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Scenario supplying the prior, candidates and model.
    #[arg(long)]
    pub scenario: PathBuf,
    /// Score against a checkpointed posterior instead of the prior.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Number of candidates to list.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

pub fn run(args: &SettingsArgs) -> Result<(), Box<dyn Error>> {
    let scenario = Scenario::load(&args.scenario)?;
    let engine = match &args.checkpoint {
        Some(path) => DesignEngine::resume(CheckpointPayload::load(path)?, scenario.model.build())?,
        None => scenario.engine()?,
    };
    let utilities = engine.utilities()?;
    let next = engine.select_index()?;

    let mut ranked: Vec<usize> = (0..utilities.len()).collect();
    ranked.sort_by(|&a, &b| utilities[b].total_cmp(&utilities[a]).then(a.cmp(&b)));

    println!("rank,index,setting,utility,selected");
    for (rank, &index) in ranked.iter().take(args.top).enumerate() {
        let setting = engine.settings()[index]
            .values()
            .iter()
            .map(|v| format!("{v:.6}"))
            .collect::<Vec<_>>()
            .join(";");
        println!(
            "{},{},{},{:.6},{}",
            rank,
            index,
            setting,
            utilities[index],
            index == next
        );
    }
    Ok(())
}
