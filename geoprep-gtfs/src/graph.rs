//! Graph builder (C12). Consolidates raw GTFS stops into master nodes,
//! emits timed transit edges from `stop_times`, and a final walking-transfer
//! pass across every dataset's master nodes.

use crate::parse::{parse_feed, route_mode_label};
use geoprep_core::domain::{mode, GraphNode, TransitEdge, TransitGraph};
use geoprep_core::geo_utils::{haversine_m, NearestIndex};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUS_ROUTE_TYPE: i32 = 3;
const BUS_SPEED_KMH: f64 = 20.0;
const RAIL_SPEED_KMH: f64 = 55.0;
const DWELL_PENALTY_S: u64 = 25;
const WALK_TRANSFER_RADIUS_KM: f64 = 0.2;
const WALK_SPEED_DIVISOR: f64 = 1.25;
const WALK_PENALTY_S: u64 = 120;

/// Builds the full routable graph from every dataset directory, in order.
/// A dataset that fails to parse is logged and skipped; edges already built
/// from earlier datasets are kept. Master-node ids are the raw
/// `parent_station`/stop id, unqualified — per the testable property that
/// a node's id equals a raw stop id or the `parent_station` some child
/// carries, two feeds that share a national stop/station id are merged
/// into the same master node, exactly as that property requires.
pub fn build_graph(dataset_dirs: &[&Path]) -> TransitGraph {
    let mut graph = TransitGraph::default();
    let mut edge_keys: HashSet<(String, String, String)> = HashSet::new();

    for dir in dataset_dirs.iter() {
        let parsed = match parse_feed(dir) {
            Ok(p) => p,
            Err(e) => {
                log::error!("skipping GTFS directory {} ({e})", dir.display());
                continue;
            }
        };

        let raw_to_master = consolidate_stops(&parsed.stops, &mut graph);
        emit_transit_edges(&parsed, &raw_to_master, &mut graph, &mut edge_keys);
    }

    emit_walking_transfers(&mut graph);
    graph
}

fn consolidate_stops(
    stops: &HashMap<String, crate::parse::GtfsStop>,
    graph: &mut TransitGraph,
) -> HashMap<String, String> {
    let mut raw_to_master = HashMap::with_capacity(stops.len());
    for (stop_id, stop) in stops {
        let master_id = stop.parent_station.clone().unwrap_or_else(|| stop_id.clone());
        raw_to_master.insert(stop_id.clone(), master_id.clone());
        graph.nodes.entry(master_id.clone()).or_insert_with(|| GraphNode {
            id: master_id,
            name: stop.stop_name.clone(),
            lat: stop.lat.unwrap_or(0.0),
            lon: stop.lon.unwrap_or(0.0),
        });
    }
    raw_to_master
}

fn emit_transit_edges(
    parsed: &crate::parse::ParsedGtfs,
    raw_to_master: &HashMap<String, String>,
    graph: &mut TransitGraph,
    edge_keys: &mut HashSet<(String, String, String)>,
) {
    for pair in parsed.stop_times.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.trip_id != b.trip_id {
            continue;
        }
        let (Some(src), Some(dst)) = (raw_to_master.get(&a.stop_id), raw_to_master.get(&b.stop_id)) else {
            continue;
        };
        if src == dst {
            continue;
        }

        let line = parsed
            .route_label_by_trip
            .get(&a.trip_id)
            .cloned()
            .unwrap_or_default();
        if !edge_keys.insert((src.clone(), dst.clone(), line.clone())) {
            continue;
        }

        let src_node = &graph.nodes[src];
        let dst_node = &graph.nodes[dst];
        let distance_m = haversine_m(src_node.lat, src_node.lon, dst_node.lat, dst_node.lon);
        let route_type = parsed.route_type_by_trip.get(&a.trip_id).copied().unwrap_or(BUS_ROUTE_TYPE);
        let speed_kmh = if route_type == BUS_ROUTE_TYPE { BUS_SPEED_KMH } else { RAIL_SPEED_KMH };
        let weight = (distance_m / 1000.0 / (speed_kmh / 3600.0)).round() as u64 + DWELL_PENALTY_S;
        let headsign = parsed.headsign_by_trip.get(&a.trip_id).cloned().unwrap_or_default();

        graph.adjacency.entry(src.clone()).or_default().push(TransitEdge {
            node: dst.clone(),
            weight,
            kind: route_mode_label(route_type).to_string(),
            line,
            headsign,
        });
    }
}

fn emit_walking_transfers(graph: &mut TransitGraph) {
    let master_ids: Vec<String> = graph.nodes.keys().cloned().collect();
    if master_ids.is_empty() {
        return;
    }
    let points: Vec<(f64, f64)> = master_ids
        .iter()
        .map(|id| {
            let n = &graph.nodes[id];
            (n.lon, n.lat)
        })
        .collect();
    let index = NearestIndex::build(&points);

    for (i, id) in master_ids.iter().enumerate() {
        let node = &graph.nodes[id];
        let neighbors = index.around(node.lon, node.lat, master_ids.len(), WALK_TRANSFER_RADIUS_KM);
        for j in neighbors {
            if j == i {
                continue;
            }
            let other_id = &master_ids[j];
            let other = &graph.nodes[other_id];
            let distance_m = haversine_m(node.lat, node.lon, other.lat, other.lon);
            let weight = (distance_m / WALK_SPEED_DIVISOR).round() as u64 + WALK_PENALTY_S;
            graph.adjacency.entry(id.clone()).or_default().push(TransitEdge {
                node: other_id.clone(),
                weight,
                kind: mode::WALK.to_string(),
                line: "Correspondance".to_string(),
                headsign: "Marche".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{GtfsStop, ParsedGtfs, StopTimeEntry};

    #[test]
    fn consolidates_platforms_under_parent_station() {
        let mut stops = HashMap::new();
        stops.insert(
            "p1".to_string(),
            GtfsStop { stop_name: "Platform 1".to_string(), lat: Some(1.0), lon: Some(2.0), parent_station: Some("station".to_string()) },
        );
        stops.insert(
            "p2".to_string(),
            GtfsStop { stop_name: "Platform 2".to_string(), lat: Some(1.1), lon: Some(2.1), parent_station: Some("station".to_string()) },
        );
        let mut graph = TransitGraph::default();
        let raw_to_master = consolidate_stops(&stops, &mut graph);
        assert_eq!(raw_to_master["p1"], raw_to_master["p2"]);
        assert_eq!(raw_to_master["p1"], "station");
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn stops_sharing_a_parent_station_across_feeds_merge_into_one_node() {
        let mut stops_a = HashMap::new();
        stops_a.insert(
            "a1".to_string(),
            GtfsStop { stop_name: "Platform A".to_string(), lat: Some(1.0), lon: Some(2.0), parent_station: Some("gare-nationale".to_string()) },
        );
        let mut stops_b = HashMap::new();
        stops_b.insert(
            "b1".to_string(),
            GtfsStop { stop_name: "Platform B".to_string(), lat: Some(1.0), lon: Some(2.0), parent_station: Some("gare-nationale".to_string()) },
        );

        let mut graph = TransitGraph::default();
        consolidate_stops(&stops_a, &mut graph);
        consolidate_stops(&stops_b, &mut graph);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.nodes.contains_key("gare-nationale"));
    }

    #[test]
    fn dedups_edges_sharing_src_dst_line() {
        let mut parsed = ParsedGtfs::default();
        parsed.stop_times = vec![
            StopTimeEntry { trip_id: "t1".to_string(), stop_id: "a".to_string(), stop_sequence: 1 },
            StopTimeEntry { trip_id: "t1".to_string(), stop_id: "b".to_string(), stop_sequence: 2 },
            StopTimeEntry { trip_id: "t2".to_string(), stop_id: "a".to_string(), stop_sequence: 1 },
            StopTimeEntry { trip_id: "t2".to_string(), stop_id: "b".to_string(), stop_sequence: 2 },
        ];
        parsed.route_label_by_trip.insert("t1".to_string(), "Ligne 1".to_string());
        parsed.route_label_by_trip.insert("t2".to_string(), "Ligne 1".to_string());

        let mut graph = TransitGraph::default();
        graph.nodes.insert("a".to_string(), GraphNode { id: "a".to_string(), name: "A".to_string(), lat: 0.0, lon: 0.0 });
        graph.nodes.insert("b".to_string(), GraphNode { id: "b".to_string(), name: "B".to_string(), lat: 0.01, lon: 0.01 });
        let mut raw_to_master = HashMap::new();
        raw_to_master.insert("a".to_string(), "a".to_string());
        raw_to_master.insert("b".to_string(), "b".to_string());
        let mut edge_keys = HashSet::new();

        emit_transit_edges(&parsed, &raw_to_master, &mut graph, &mut edge_keys);
        assert_eq!(graph.adjacency["a"].len(), 1);
    }
}
