//! P4: graph builder (C12). Reuses P3's dataset resolution (re-downloading
//! is a no-op if the working tree is already populated) and serializes the
//! routable transit graph.

use crate::error::PipelineError;
use crate::files::{read_json, write_json};
use geoprep_core::domain::StopRefEntry;
use geoprep_core::settings::Settings;
use geoprep_gtfs::{dataset, fetch, graph};
use std::collections::HashMap;
use std::path::PathBuf;

pub fn run(settings: &Settings) -> Result<(), PipelineError> {
    run_with(settings, false)
}

/// `refresh` wipes the GTFS working tree before fetching, per spec §4.9's
/// `clearBaseDir()` — used by the `p4-graph --refresh` CLI flag.
pub fn run_with(settings: &Settings, refresh: bool) -> Result<(), PipelineError> {
    let stops_ref: HashMap<String, StopRefEntry> = read_json(&settings.path_output_transport_stops)?;
    let datasets = dataset::distinct_datasets(&stops_ref);

    let base_dir = PathBuf::from(&settings.path_cache_gtfs);
    if refresh {
        fetch::clear_base_dir(&base_dir)?;
    }
    let extracted = fetch::fetch_all(&base_dir, &datasets, &fetch::SkipResolver);

    let dataset_dirs: Vec<&std::path::Path> = extracted.iter().map(|(_, dir)| dir.as_path()).collect();

    let transit_graph = graph::build_graph(&dataset_dirs);
    write_json(&settings.path_output_graph, &transit_graph)?;
    log::info!(
        "p4-graph complete: {} node(s), {} edge list(s)",
        transit_graph.nodes.len(),
        transit_graph.adjacency.len()
    );
    Ok(())
}
