//! Spatial stop index (C6): an in-memory grid keyed by 0.01-degree cells,
//! queried by radius. Built once after P1 from the stops the analytical
//! store knows about; owned by the pipeline orchestrator for the duration of
//! P2.

use crate::domain::Stop;
use crate::geo_utils::haversine_m;
use std::collections::HashMap;

const CELL_SIZE_DEG: f64 = 0.01;
const DEG_PER_METER: f64 = 1.0 / 111_000.0;

#[derive(Debug, Clone)]
pub struct NearbyStop {
    pub stop: Stop,
    pub distance_m: f64,
}

pub struct StopGrid {
    cells: HashMap<(i64, i64), Vec<Stop>>,
}

fn cell_of(lat: f64, lon: f64) -> (i64, i64) {
    (
        (lat / CELL_SIZE_DEG).floor() as i64,
        (lon / CELL_SIZE_DEG).floor() as i64,
    )
}

impl StopGrid {
    /// Indexes every stop whose `location_type` is a stop point (0), a
    /// station (1), or unset — entrances/exits and higher codes are excluded
    /// from the nearest-stop search, per spec §4.6.
    pub fn build(stops: impl IntoIterator<Item = Stop>) -> Self {
        let mut cells: HashMap<(i64, i64), Vec<Stop>> = HashMap::new();
        for stop in stops {
            match stop.location_type {
                Some(0) | Some(1) | None => {
                    cells.entry(cell_of(stop.lat, stop.lon)).or_default().push(stop);
                }
                _ => {}
            }
        }
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops within `radius_m` of `(lat, lon)`, sorted by ascending distance.
    pub fn find_nearby(&self, lat: f64, lon: f64, radius_m: f64) -> Vec<NearbyStop> {
        let range = ((radius_m / 111_000.0) / CELL_SIZE_DEG).ceil() as i64;
        let (center_row, center_col) = cell_of(lat, lon);
        let max_delta_deg = (radius_m + 50.0) * DEG_PER_METER;

        let mut found = Vec::new();
        for drow in -range..=range {
            for dcol in -range..=range {
                let Some(cell) = self.cells.get(&(center_row + drow, center_col + dcol)) else {
                    continue;
                };
                for stop in cell {
                    if (stop.lat - lat).abs() > max_delta_deg || (stop.lon - lon).abs() > max_delta_deg {
                        continue;
                    }
                    let distance_m = haversine_m(lat, lon, stop.lat, stop.lon);
                    if distance_m <= radius_m {
                        found.push(NearbyStop {
                            stop: stop.clone(),
                            distance_m,
                        });
                    }
                }
            }
        }
        found.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, lat: f64, lon: f64, location_type: Option<i32>) -> Stop {
        Stop {
            stop_id: id.to_string(),
            stop_name: id.to_string(),
            lat,
            lon,
            location_type,
            dataset_id: None,
            resource_id: None,
            dataset_datagouv_id: None,
            resource_datagouv_id: None,
            dataset_custom_title: None,
        }
    }

    #[test]
    fn finds_nearby_stops_sorted_by_distance() {
        let stops = vec![
            stop("far", 48.87, 2.37, Some(0)),
            stop("near", 48.8567, 2.3523, Some(0)),
            stop("entrance", 48.8566, 2.3522, Some(2)),
        ];
        let grid = StopGrid::build(stops);
        let results = grid.find_nearby(48.8566, 2.3522, 2000.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stop.stop_id, "near");
    }

    #[test]
    fn excludes_entrances_and_higher_location_types() {
        let stops = vec![stop("entrance", 48.8566, 2.3522, Some(2))];
        let grid = StopGrid::build(stops);
        assert!(grid.is_empty());
    }

    #[test]
    fn distances_are_nondecreasing_in_result_order() {
        let stops = vec![
            stop("a", 48.8566, 2.3522, Some(0)),
            stop("b", 48.8570, 2.3530, Some(1)),
            stop("c", 48.8580, 2.3550, None),
        ];
        let grid = StopGrid::build(stops);
        let results = grid.find_nearby(48.8566, 2.3522, 2000.0);
        for pair in results.windows(2) {
            assert!(pair[0].distance_m <= pair[1].distance_m);
        }
    }
}
