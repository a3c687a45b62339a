mod cli;
mod error;
mod files;
mod phases;
mod stats;

use clap::Parser;
use cli::{Cli, Command};
use error::PipelineError;
use geoprep_core::settings::Settings;
use geoprep_core::stop_grid::StopGrid;
use geoprep_store::{stops, Store};

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Command::P1Load => {
            phases::p1::run(&settings)?;
        }
        Command::P2Enrich { dry_run } => {
            let store = phases::p1::run(&settings)?;
            let stop_grid = load_stop_grid(&store)?;
            phases::p2::run(&settings, &store, &stop_grid, dry_run).await?;
        }
        Command::P3Transit { refresh } => {
            phases::p3::run_with(&settings, refresh)?;
        }
        Command::P4Graph { refresh } => {
            phases::p4::run_with(&settings, refresh)?;
        }
        Command::All => {
            let store = phases::p1::run(&settings)?;
            let stop_grid = load_stop_grid(&store)?;
            phases::p2::run(&settings, &store, &stop_grid, false).await?;
            phases::p3::run(&settings)?;
            phases::p4::run(&settings)?;
        }
        Command::Stats => {
            let store = phases::p1::run(&settings)?;
            stats::run(&store)?;
        }
    }
    Ok(())
}

fn load_stop_grid(store: &Store) -> Result<StopGrid, PipelineError> {
    let all_stops = stops::load_all(store)?;
    Ok(StopGrid::build(all_stops))
}
