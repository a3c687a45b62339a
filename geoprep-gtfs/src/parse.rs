//! GTFS parser (C10). Reads the four files a GTFS feed needs for stop-mode
//! derivation and graph building, in the order the spec requires, and
//! propagates accessibility modes across parent/child station links.

use crate::error::GtfsError;
use geoprep_core::domain::mode;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct StopRow {
    stop_id: String,
    #[serde(default)]
    stop_name: Option<String>,
    #[serde(default)]
    parent_station: Option<String>,
    #[serde(default)]
    stop_lat: Option<f64>,
    #[serde(default)]
    stop_lon: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RouteRow {
    route_id: String,
    route_type: i32,
    #[serde(default)]
    route_short_name: Option<String>,
    #[serde(default)]
    route_long_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TripRow {
    trip_id: String,
    route_id: String,
    #[serde(default)]
    trip_headsign: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StopTimeRow {
    trip_id: String,
    stop_id: String,
    stop_sequence: i64,
}

/// One raw GTFS stop, before master-node consolidation (C12).
#[derive(Debug, Clone)]
pub struct GtfsStop {
    pub stop_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub parent_station: Option<String>,
}

/// One `stop_times.txt` row, enriched with its trip's route label, kept
/// sorted by `(trip_id, stop_sequence)` for C12's consecutive-pair walk.
#[derive(Debug, Clone)]
pub struct StopTimeEntry {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: i64,
}

/// Everything C11/C12 need out of a single GTFS feed directory.
#[derive(Debug, Clone, Default)]
pub struct ParsedGtfs {
    pub stops: HashMap<String, GtfsStop>,
    pub stop_modes: HashMap<String, HashSet<String>>,
    pub stop_lines: HashMap<String, HashSet<String>>,
    pub stop_times: Vec<StopTimeEntry>,
    pub route_type_by_trip: HashMap<String, i32>,
    pub route_label_by_trip: HashMap<String, String>,
    pub headsign_by_trip: HashMap<String, String>,
}

/// Maps a GTFS numeric `route_type` to the mode labels the rest of the
/// pipeline works with. Ranges are inclusive at both ends, per spec.md §9's
/// resolved open question.
pub fn route_mode_label(route_type: i32) -> &'static str {
    match route_type {
        1 | 400..=404 => mode::METRO,
        0 | 900..=906 => mode::TRAM,
        2 | 100..=199 => mode::TRAIN,
        3 => mode::BUS,
        4 | 1000 => mode::FERRY,
        5 | 7 | 1400 => mode::FUNICULAIRE,
        _ => mode::BUS,
    }
}

fn read_csv<T: for<'de> Deserialize<'de>>(
    dir: &Path,
    file_name: &str,
) -> Result<Vec<T>, GtfsError> {
    let path = dir.join(file_name);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(&path)
        .map_err(|e| GtfsError::Csv {
            file: path.display().to_string(),
            source: e,
        })?;
    reader
        .deserialize::<T>()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|e| GtfsError::Csv {
            file: path.display().to_string(),
            source: e,
        })
}

/// Parses one GTFS feed directory into a `ParsedGtfs`.
pub fn parse_feed(dir: &Path) -> Result<ParsedGtfs, GtfsError> {
    let stop_rows: Vec<StopRow> = read_csv(dir, "stops.txt")?;
    let route_rows: Vec<RouteRow> = read_csv(dir, "routes.txt")?;
    let trip_rows: Vec<TripRow> = read_csv(dir, "trips.txt")?;
    let stop_time_rows: Vec<StopTimeRow> = read_csv(dir, "stop_times.txt")?;

    let mut stops = HashMap::with_capacity(stop_rows.len());
    for row in stop_rows {
        stops.insert(
            row.stop_id,
            GtfsStop {
                stop_name: row.stop_name.unwrap_or_default(),
                lat: row.stop_lat,
                lon: row.stop_lon,
                parent_station: row.parent_station.filter(|p| !p.is_empty()),
            },
        );
    }

    let route_label: HashMap<String, String> = route_rows
        .iter()
        .map(|r| {
            let label = r
                .route_short_name
                .clone()
                .filter(|s| !s.is_empty())
                .or_else(|| r.route_long_name.clone())
                .unwrap_or_default();
            (r.route_id.clone(), label)
        })
        .collect();
    let route_mode: HashMap<String, &'static str> = route_rows
        .iter()
        .map(|r| (r.route_id.clone(), route_mode_label(r.route_type)))
        .collect();
    let route_type: HashMap<String, i32> =
        route_rows.iter().map(|r| (r.route_id.clone(), r.route_type)).collect();

    let mut route_type_by_trip = HashMap::with_capacity(trip_rows.len());
    let mut route_label_by_trip = HashMap::with_capacity(trip_rows.len());
    let mut route_mode_by_trip: HashMap<String, &'static str> = HashMap::with_capacity(trip_rows.len());
    let mut headsign_by_trip = HashMap::with_capacity(trip_rows.len());
    for trip in &trip_rows {
        if let Some(&rt) = route_type.get(&trip.route_id) {
            route_type_by_trip.insert(trip.trip_id.clone(), rt);
        }
        if let Some(label) = route_label.get(&trip.route_id) {
            route_label_by_trip.insert(trip.trip_id.clone(), label.clone());
        }
        if let Some(&m) = route_mode.get(&trip.route_id) {
            route_mode_by_trip.insert(trip.trip_id.clone(), m);
        }
        if let Some(headsign) = &trip.trip_headsign {
            headsign_by_trip.insert(trip.trip_id.clone(), headsign.clone());
        }
    }

    let mut stop_modes: HashMap<String, HashSet<String>> = HashMap::new();
    let mut stop_lines: HashMap<String, HashSet<String>> = HashMap::new();
    let mut stop_times = Vec::with_capacity(stop_time_rows.len());
    for row in stop_time_rows {
        if let Some(&gtfs_mode) = route_mode_by_trip.get(&row.trip_id) {
            stop_modes
                .entry(row.stop_id.clone())
                .or_default()
                .insert(gtfs_mode.to_string());
        }
        if let Some(label) = route_label_by_trip.get(&row.trip_id) {
            if !label.is_empty() {
                stop_lines.entry(row.stop_id.clone()).or_default().insert(label.clone());
            }
        }
        stop_times.push(StopTimeEntry {
            trip_id: row.trip_id,
            stop_id: row.stop_id,
            stop_sequence: row.stop_sequence,
        });
    }
    stop_times.sort_by(|a, b| (a.trip_id.as_str(), a.stop_sequence).cmp(&(b.trip_id.as_str(), b.stop_sequence)));

    propagate_parent_child(&stops, &mut stop_modes, &mut stop_lines);

    Ok(ParsedGtfs {
        stops,
        stop_modes,
        stop_lines,
        stop_times,
        route_type_by_trip,
        route_label_by_trip,
        headsign_by_trip,
    })
}

/// Merges modes/lines from each child stop into its parent, then back down
/// to every sibling, so a station's accessibility reflects the union of its
/// platforms, per spec §4.10.
fn propagate_parent_child(
    stops: &HashMap<String, GtfsStop>,
    stop_modes: &mut HashMap<String, HashSet<String>>,
    stop_lines: &mut HashMap<String, HashSet<String>>,
) {
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
    for (id, stop) in stops {
        if let Some(parent) = &stop.parent_station {
            children_of.entry(parent.clone()).or_default().push(id.clone());
        }
    }

    for (parent, children) in &children_of {
        let mut union_modes = stop_modes.get(parent).cloned().unwrap_or_default();
        let mut union_lines = stop_lines.get(parent).cloned().unwrap_or_default();
        for child in children {
            if let Some(m) = stop_modes.get(child) {
                union_modes.extend(m.iter().cloned());
            }
            if let Some(l) = stop_lines.get(child) {
                union_lines.extend(l.iter().cloned());
            }
        }
        if !union_modes.is_empty() {
            stop_modes.insert(parent.clone(), union_modes.clone());
        }
        if !union_lines.is_empty() {
            stop_lines.insert(parent.clone(), union_lines.clone());
        }
        for child in children {
            if !union_modes.is_empty() {
                stop_modes.entry(child.clone()).or_default().extend(union_modes.iter().cloned());
            }
            if !union_lines.is_empty() {
                stop_lines.entry(child.clone()).or_default().extend(union_lines.iter().cloned());
            }
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Matches configured target stop ids against this feed's raw GTFS stop
/// ids, by substring (either direction) or normalized-name containment for
/// names longer than 3 characters. Only the first match per target id is
/// logged, per spec §4.10.
pub fn match_target_stops(
    parsed: &ParsedGtfs,
    targets: &[(String, String)],
) -> HashMap<String, HashSet<String>> {
    let mut result: HashMap<String, HashSet<String>> = HashMap::new();
    let mut logged: HashSet<&str> = HashSet::new();

    for (target_id, target_name) in targets {
        let normalized_target = normalize_name(target_name);
        for (gtfs_id, stop) in &parsed.stops {
            let substring_match = gtfs_id.contains(target_id.as_str()) || target_id.contains(gtfs_id.as_str());
            let name_match = normalized_target.len() > 3
                && normalize_name(&stop.stop_name).contains(&normalized_target);
            if substring_match || name_match {
                result.entry(target_id.clone()).or_default().insert(gtfs_id.clone());
                if logged.insert(target_id.as_str()) {
                    log::debug!("target stop {target_id} first matched GTFS stop {gtfs_id}");
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_type_ranges_are_inclusive() {
        assert_eq!(route_mode_label(1), mode::METRO);
        assert_eq!(route_mode_label(400), mode::METRO);
        assert_eq!(route_mode_label(404), mode::METRO);
        assert_eq!(route_mode_label(0), mode::TRAM);
        assert_eq!(route_mode_label(900), mode::TRAM);
        assert_eq!(route_mode_label(906), mode::TRAM);
        assert_eq!(route_mode_label(2), mode::TRAIN);
        assert_eq!(route_mode_label(100), mode::TRAIN);
        assert_eq!(route_mode_label(199), mode::TRAIN);
        assert_eq!(route_mode_label(3), mode::BUS);
        assert_eq!(route_mode_label(4), mode::FERRY);
        assert_eq!(route_mode_label(1000), mode::FERRY);
        assert_eq!(route_mode_label(5), mode::FUNICULAIRE);
        assert_eq!(route_mode_label(7), mode::FUNICULAIRE);
        assert_eq!(route_mode_label(1400), mode::FUNICULAIRE);
        assert_eq!(route_mode_label(42), mode::BUS);
    }

    #[test]
    fn propagation_unions_parent_and_children() {
        let mut stops = HashMap::new();
        stops.insert(
            "platform-1".to_string(),
            GtfsStop { stop_name: "Platform 1".to_string(), lat: None, lon: None, parent_station: Some("station-a".to_string()) },
        );
        stops.insert(
            "platform-2".to_string(),
            GtfsStop { stop_name: "Platform 2".to_string(), lat: None, lon: None, parent_station: Some("station-a".to_string()) },
        );
        stops.insert(
            "station-a".to_string(),
            GtfsStop { stop_name: "Station A".to_string(), lat: None, lon: None, parent_station: None },
        );

        let mut stop_modes = HashMap::new();
        stop_modes.insert("platform-1".to_string(), HashSet::from(["Bus".to_string()]));
        stop_modes.insert("platform-2".to_string(), HashSet::from(["Métro".to_string()]));
        let mut stop_lines = HashMap::new();

        propagate_parent_child(&stops, &mut stop_modes, &mut stop_lines);

        let station_modes = &stop_modes["station-a"];
        assert!(station_modes.contains("Bus"));
        assert!(station_modes.contains("Métro"));
        assert!(stop_modes["platform-1"].contains("Métro"));
        assert!(stop_modes["platform-2"].contains("Bus"));
    }
}
