//! P1: load the registry and stops catalog into the analytical store (C1-C3).

use crate::error::PipelineError;
use geoprep_core::settings::Settings;
use geoprep_store::{registry, stops, Store};

pub fn run(settings: &Settings) -> Result<Store, PipelineError> {
    let store = Store::initialize(
        &settings.db_path,
        settings.db_pool_size,
        &settings.db_memory_limit,
        settings.db_preserve_insertion_order,
        true,
    )?;
    registry::ensure_loaded(&store, &settings.path_source_sirene)?;
    stops::ensure_loaded(&store, &settings.path_source_stop_csv)?;
    log::info!("p1-load complete");
    Ok(store)
}
