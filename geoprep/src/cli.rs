use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "geoprep", version, about = "Offline geomatic data-preparation pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// P1: load the registry and stops catalog into the analytical store.
    P1Load,
    /// P2: stream offers, resolve company identity, write the four P2 artifacts.
    P2Enrich {
        /// Run identity resolution and finalization without writing output files.
        #[arg(long)]
        dry_run: bool,
    },
    /// P3: fetch the referenced GTFS datasets and rescore transport accessibility.
    P3Transit {
        /// Wipe the GTFS working tree before fetching, forcing a re-download.
        #[arg(long)]
        refresh: bool,
    },
    /// P4: build and serialize the routable transit graph.
    P4Graph {
        /// Wipe the GTFS working tree before fetching, forcing a re-download.
        #[arg(long)]
        refresh: bool,
    },
    /// Run P1 through P4 in order.
    All,
    /// Print row counts for the analytical store's tables, then exit.
    Stats,
}
