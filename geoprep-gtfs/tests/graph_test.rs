//! End-to-end coverage of the GTFS parser and graph builder against real
//! GTFS-shaped CSV fixtures written to a temp directory, covering a timed
//! three-stop metro trip (transit edge weights) and a cross-dataset walking
//! transfer (C12).

use geoprep_gtfs::graph::build_graph;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

fn write_feed(dir: &std::path::Path, stops: &str, routes: &str, trips: &str, stop_times: &str) {
    for (name, content) in [
        ("stops.txt", stops),
        ("routes.txt", routes),
        ("trips.txt", trips),
        ("stop_times.txt", stop_times),
    ] {
        let mut f = fs::File::create(dir.join(name)).expect("create gtfs fixture file");
        f.write_all(content.as_bytes()).expect("write gtfs fixture file");
    }
}

#[test]
fn three_stop_metro_trip_produces_expected_edge_weights() {
    let tmp = TempDir::new().expect("tempdir");
    write_feed(
        tmp.path(),
        "stop_id,stop_name,stop_lat,stop_lon,parent_station\n\
         s1,Alpha,48.8,2.3,\n\
         s2,Bravo,48.80714461053591,2.3,\n\
         s3,Charlie,48.81786152633977,2.3,\n",
        "route_id,route_type,route_short_name\n\
         r1,1,M4\n",
        "trip_id,route_id,trip_headsign\n\
         t1,r1,Porte de Clignancourt\n",
        "trip_id,stop_id,stop_sequence\n\
         t1,s1,1\n\
         t1,s2,2\n\
         t1,s3,3\n",
    );

    let dataset_dirs = vec![tmp.path()];
    let graph = build_graph(&dataset_dirs);

    assert_eq!(graph.nodes.len(), 3);
    let ab = &graph.adjacency["s1"];
    assert_eq!(ab.len(), 1);
    assert_eq!(ab[0].node, "s2");
    assert_eq!(ab[0].weight, 77);
    assert_eq!(ab[0].line, "M4");
    assert_eq!(ab[0].kind, "Métro");
    assert_eq!(ab[0].headsign, "Porte de Clignancourt");

    let bc = &graph.adjacency["s2"];
    assert_eq!(bc.len(), 1);
    assert_eq!(bc[0].node, "s3");
    assert_eq!(bc[0].weight, 103);
}

#[test]
fn no_edge_is_emitted_between_non_consecutive_stops_on_a_trip() {
    let tmp = TempDir::new().expect("tempdir");
    write_feed(
        tmp.path(),
        "stop_id,stop_name,stop_lat,stop_lon,parent_station\n\
         s1,Alpha,48.8,2.3,\n\
         s2,Bravo,48.81,2.3,\n\
         s3,Charlie,48.82,2.3,\n",
        "route_id,route_type,route_short_name\n\
         r1,1,M4\n",
        "trip_id,route_id,trip_headsign\n\
         t1,r1,\n",
        "trip_id,stop_id,stop_sequence\n\
         t1,s1,1\n\
         t1,s2,2\n\
         t1,s3,3\n",
    );
    let dataset_dirs = vec![tmp.path()];
    let graph = build_graph(&dataset_dirs);

    assert!(graph.adjacency["s1"].iter().all(|e| e.node != "s3"));
}

#[test]
fn walking_transfer_is_emitted_between_close_stops_across_datasets() {
    let tmp_a = TempDir::new().expect("tempdir a");
    let tmp_b = TempDir::new().expect("tempdir b");

    write_feed(
        tmp_a.path(),
        "stop_id,stop_name,stop_lat,stop_lon,parent_station\n\
         x1,Gare A,48.9,2.4,\n",
        "route_id,route_type,route_short_name\nr1,3,B1\n",
        "trip_id,route_id,trip_headsign\nt1,r1,\n",
        "trip_id,stop_id,stop_sequence\nt1,x1,1\n",
    );
    write_feed(
        tmp_b.path(),
        "stop_id,stop_name,stop_lat,stop_lon,parent_station\n\
         y1,Gare B,48.90134898240888,2.4,\n",
        "route_id,route_type,route_short_name\nr1,3,B2\n",
        "trip_id,route_id,trip_headsign\nt1,r1,\n",
        "trip_id,stop_id,stop_sequence\nt1,y1,1\n",
    );

    let dataset_dirs = vec![tmp_a.path(), tmp_b.path()];
    let graph = build_graph(&dataset_dirs);

    let walk = graph.adjacency["x1"]
        .iter()
        .find(|e| e.node == "y1")
        .expect("a walking transfer edge should link the two close stations");
    assert_eq!(walk.weight, 240);
    assert_eq!(walk.kind, "WALK");
    assert_eq!(walk.line, "Correspondance");
    assert_eq!(walk.headsign, "Marche");

    let back = graph.adjacency["y1"]
        .iter()
        .find(|e| e.node == "x1")
        .expect("walking transfers are bidirectional");
    assert_eq!(back.weight, 240);
}
