//! P3: dataset aggregation, fetch, parse, and accessibility scoring
//! (C8-C11). Rewrites the P2 FeatureCollection and StopLink artifacts in
//! place with transport scores and modes.

use crate::error::PipelineError;
use crate::files::{read_json, write_json};
use geoprep_core::domain::{StopLink, StopRefEntry};
use geoprep_core::settings::Settings;
use geoprep_gtfs::cache::GtfsCache;
use geoprep_gtfs::dataset::DatasetRef;
use geoprep_gtfs::parse::ParsedGtfs;
use geoprep_gtfs::{dataset, fetch, parse, score};
use std::collections::HashMap;
use std::path::PathBuf;

pub fn run(settings: &Settings) -> Result<(), PipelineError> {
    run_with(settings, false)
}

/// `refresh` wipes the GTFS working tree before fetching, per spec §4.9's
/// `clearBaseDir()` — used by the `p3-transit --refresh` CLI flag to force a
/// re-download instead of reusing a cached extraction.
pub fn run_with(settings: &Settings, refresh: bool) -> Result<(), PipelineError> {
    let stops_ref: HashMap<String, StopRefEntry> = read_json(&settings.path_output_transport_stops)?;
    let mut stop_links: HashMap<String, StopLink> = read_json(&settings.path_output_stops_by_siret)?;
    let mut feature_collection: serde_json::Value = read_json(&settings.path_output_companies_geojson)?;

    let datasets = dataset::distinct_datasets(&stops_ref);
    log::info!("{} distinct GTFS dataset(s) referenced", datasets.len());

    let base_dir = PathBuf::from(&settings.path_cache_gtfs);
    if refresh {
        fetch::clear_base_dir(&base_dir)?;
    }
    let extracted = fetch::fetch_all(&base_dir, &datasets, &fetch::SkipResolver);

    let mut cache = GtfsCache::new();
    for (dataset_ref, dir) in &extracted {
        let dataset_id = dataset_ref
            .dataset_id
            .clone()
            .unwrap_or_else(|| dataset_ref.resource_datagouv_id.clone());
        match parse::parse_feed(dir) {
            Ok(parsed) => {
                log_unmatched_target_stops(&dataset_id, dataset_ref, &stops_ref, &parsed);
                cache.insert_dataset(&dataset_id, &parsed);
            }
            Err(e) => log::error!("skipping dataset {dataset_id}: {e}"),
        }
    }

    let mut location_updates: HashMap<String, (f64, Vec<String>)> = HashMap::with_capacity(stop_links.len());
    for (storage_id, stop_link) in stop_links.iter_mut() {
        let (score, modes) = score::score_stop_link(stop_link, &stops_ref, &cache);
        location_updates.insert(storage_id.clone(), (score, modes));
    }

    apply_location_updates(&mut feature_collection, &location_updates);

    write_json(&settings.path_output_companies_geojson, &feature_collection)?;
    write_json(&settings.path_output_stops_by_siret, &stop_links)?;
    log::info!("p3-transit complete: {} location(s) scored", location_updates.len());
    Ok(())
}

/// Our own stop catalog's ids are usually this feed's raw GTFS stop ids
/// verbatim; for the ones that aren't (renamed/re-coded upstream), run the
/// fuzzy id/name matcher and log what it finds, per spec §4.10's "Mapping
/// mode". Purely diagnostic — `score_stop_link` still defaults unmatched
/// stops to `["Bus"]`, this only helps an operator see why.
fn log_unmatched_target_stops(
    dataset_id: &str,
    dataset_ref: &DatasetRef,
    stops_ref: &HashMap<String, StopRefEntry>,
    parsed: &ParsedGtfs,
) {
    let targets: Vec<(String, String)> = stops_ref
        .iter()
        .filter(|(_, s)| s.resource_datagouv_id.as_deref() == Some(dataset_ref.resource_datagouv_id.as_str()))
        .filter(|(id, _)| !parsed.stops.contains_key(id.as_str()))
        .map(|(id, s)| (id.clone(), s.name.clone()))
        .collect();
    if targets.is_empty() {
        return;
    }
    let matched = parse::match_target_stops(parsed, &targets);
    log::info!(
        "dataset {dataset_id}: {} target stop(s) had no exact id match, {} resolved via fuzzy lookup",
        targets.len(),
        matched.len(),
    );
}

fn apply_location_updates(
    feature_collection: &mut serde_json::Value,
    location_updates: &HashMap<String, (f64, Vec<String>)>,
) {
    let Some(features) = feature_collection.get_mut("features").and_then(|f| f.as_array_mut()) else {
        return;
    };
    for feature in features {
        let storage_id = feature.get("id").and_then(|v| v.as_str()).map(str::to_string);
        let Some(storage_id) = storage_id else { continue };
        let Some((transport_score, transport_modes)) = location_updates.get(&storage_id) else { continue };
        if let Some(properties) = feature.get_mut("properties") {
            properties["transport_score"] = serde_json::json!(transport_score);
            properties["transport_modes"] = serde_json::json!(transport_modes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_score_and_modes_onto_matching_feature() {
        let mut fc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"id": "loc-1", "properties": {"transport_score": 0.0, "transport_modes": []}},
                {"id": "loc-2", "properties": {"transport_score": 0.0, "transport_modes": []}},
            ],
        });
        let mut updates = HashMap::new();
        updates.insert("loc-1".to_string(), (3.2, vec!["Bus".to_string()]));

        apply_location_updates(&mut fc, &updates);

        assert_eq!(fc["features"][0]["properties"]["transport_score"], 3.2);
        assert_eq!(fc["features"][1]["properties"]["transport_score"], 0.0);
    }
}
