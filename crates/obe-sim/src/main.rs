use std::error::Error;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{
    estimate::{self, EstimateArgs},
    resume::{self, ResumeArgs},
    run::{self, RunArgs},
    settings::{self, SettingsArgs},
};

mod commands;
mod scenario;

#[derive(Parser, Debug)]
#[command(name = "obe-sim", version, about = "Simulated sequential experiment design")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit per-cycle debug events.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated design campaign described by a scenario file.
    Run(RunArgs),
    /// Continue a campaign from a checkpoint.
    Resume(ResumeArgs),
    /// Print the parameter estimate stored in a checkpoint.
    Estimate(EstimateArgs),
    /// Rank candidate settings by expected information gain.
    Settings(SettingsArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Resume(args) => resume::run(&args),
        Command::Estimate(args) => estimate::run(&args),
        Command::Settings(args) => settings::run(&args),
    }
}

fn setup_logging(verbose: bool) -> Result<(), Box<dyn Error>> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
