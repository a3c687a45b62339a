//! Accessibility scorer (C11). Joins per-stop modes with per-location stop
//! links and computes a distance-decayed transport score.

use crate::cache::GtfsCache;
use geoprep_core::domain::{mode, StopLink, StopRefEntry};
use std::collections::{HashMap, HashSet};

const DECAY_RADIUS_KM: f64 = 1.7;

fn base_score(modes: &HashSet<String>) -> f64 {
    let has_any = |names: &[&str]| names.iter().any(|n| modes.contains(*n));
    if has_any(&[mode::TRAIN, "Métro", "Metro", "RER"]) {
        5.0
    } else if has_any(&[mode::TRAM, "Tramway"]) {
        3.0
    } else if has_any(&[mode::BUS]) {
        1.5
    } else {
        0.0
    }
}

/// Enriches `stop_link`'s stations in place with `modes`/`lines`, and
/// returns `(transport_score, transport_modes)` for the owning location,
/// per spec §4.11. Stops with no matching GTFS cache entry default to
/// `["Bus"]`.
pub fn score_stop_link(
    stop_link: &mut StopLink,
    stops_ref: &HashMap<String, StopRefEntry>,
    cache: &GtfsCache,
) -> (f64, Vec<String>) {
    let mut best_score = 0.0_f64;
    let mut all_modes: HashSet<String> = HashSet::new();

    for station in &mut stop_link.stations {
        let dataset_id = stops_ref.get(&station.id).and_then(|s| s.dataset_id.clone());
        let modes = dataset_id
            .as_deref()
            .map(|d| cache.modes_for(d, &station.id))
            .unwrap_or_else(|| HashSet::from([mode::BUS.to_string()]));
        let lines = dataset_id
            .as_deref()
            .map(|d| cache.lines_for(d, &station.id))
            .unwrap_or_default();

        let distance_km = station.distance_m / 1000.0;
        let decay = (1.0 - distance_km / DECAY_RADIUS_KM).max(0.0);
        best_score = best_score.max(base_score(&modes) * decay);

        all_modes.extend(modes.iter().cloned());
        station.modes = modes.into_iter().collect();
        station.lines = lines;
    }

    let mut transport_modes: Vec<String> = all_modes.into_iter().collect();
    transport_modes.sort();
    (round2(best_score), transport_modes)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoprep_core::domain::StopLinkStation;

    #[test]
    fn train_within_range_scores_higher_than_bus() {
        let train = HashSet::from(["Train".to_string()]);
        let bus = HashSet::from(["Bus".to_string()]);
        assert!(base_score(&train) > base_score(&bus));
    }

    #[test]
    fn decay_reaches_zero_past_threshold() {
        let mut stop_link = StopLink {
            radius: 2000.0,
            stations: vec![StopLinkStation {
                id: "far".to_string(),
                distance_m: 2000.0,
                modes: vec![],
                lines: vec![],
            }],
        };
        let mut stops_ref = HashMap::new();
        stops_ref.insert(
            "far".to_string(),
            StopRefEntry {
                name: "Far stop".to_string(),
                lat: 0.0,
                lon: 0.0,
                dataset_source_name: None,
                dataset_id: Some("ds1".to_string()),
                resource_id: None,
                dataset_datagouv_id: None,
                resource_datagouv_id: None,
            },
        );
        let mut cache = GtfsCache::new();
        let mut parsed = crate::parse::ParsedGtfs::default();
        parsed.stop_modes.insert("far".to_string(), HashSet::from(["Train".to_string()]));
        cache.insert_dataset("ds1", &parsed);

        let (score, modes) = score_stop_link(&mut stop_link, &stops_ref, &cache);
        assert_eq!(score, 0.0);
        assert_eq!(modes, vec!["Train".to_string()]);
    }
}
