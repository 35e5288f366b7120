//! End-to-end tests of the greedy matcher over CSV inputs.
//!
//! A short eastbound track is written next to a single straight road, read back through the
//! record types, matched and written out again. The output is then checked for the properties
//! the `roadtrack score` command relies on.
use std::fs;

use assert_approx_eq::assert_approx_eq;
use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use roadtrack::records::{EdgeRecord, MatchRecord, ObservationRecord};
use roadtrack::{GreedyMatcher, TrackerConfig};

const EDGES_CSV: &str = "edge_id,latitude,longitude
1,40.0,-75.0
1,40.0,-74.99
2,40.01,-75.0
2,40.02,-75.0
";

fn eastbound_track() -> Vec<ObservationRecord> {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    (0..6)
        .map(|i| ObservationRecord {
            time: t0 + Duration::seconds(10 * i),
            latitude: 40.00002,
            longitude: -74.999 + 0.001 * i as f64,
        })
        .collect()
}

#[test]
fn track_along_a_road_stays_on_it() {
    let dir = tempdir().unwrap();
    let observations_path = dir.path().join("observations.csv");
    let edges_path = dir.path().join("edges.csv");
    let output_path = dir.path().join("matches.csv");
    ObservationRecord::to_csv(&eastbound_track(), &observations_path).unwrap();
    fs::write(&edges_path, EDGES_CSV).unwrap();

    let observation_records = ObservationRecord::from_csv(&observations_path).unwrap();
    let plane = ObservationRecord::plane_for(&observation_records).unwrap();
    let observations = ObservationRecord::to_observations(&observation_records, &plane).unwrap();
    let edges = EdgeRecord::from_csv(&edges_path).unwrap();
    let graph = EdgeRecord::build_graph(&edges, &plane).unwrap();
    assert_eq!(graph.len(), 2);

    let config = TrackerConfig::default();
    let matcher = GreedyMatcher::new(&graph, &config).unwrap();
    let matches = matcher.run(observations).unwrap();
    let records: Vec<MatchRecord> = matches.iter().map(|m| m.to_record(&plane).unwrap()).collect();
    MatchRecord::to_csv(&records, &output_path).unwrap();

    let written = MatchRecord::from_csv(&output_path).unwrap();
    assert_eq!(written.len(), 6);
    for (i, record) in written.iter().enumerate() {
        assert_eq!(record.observation_index, i as u64);
        assert_eq!(record.edge_id, Some(1));
        // matched locations sit on the road, about two meters south of the fixes
        assert_approx_eq!(record.latitude, 40.0, 1e-6);
        assert_approx_eq!(record.longitude, observation_records[i].longitude, 1e-6);
        assert_approx_eq!(
            record.log_likelihood,
            record.transition_log_likelihood + record.motion_log_likelihood,
            1e-9
        );
    }
    let along: Vec<f64> = written
        .iter()
        .map(|r| r.distance_along_edge.unwrap())
        .collect();
    assert!(along.windows(2).all(|w| w[0] < w[1]));
    for record in &written[1..] {
        assert_approx_eq!(record.transition_log_likelihood, 0.95_f64.ln(), 1e-9);
    }

    let last = &matches.last().unwrap().state;
    assert_eq!(last.depth(), 5);
    assert_eq!(last.observation_indices(), vec![0, 1, 2, 3, 4, 5]);
    assert!(last.edge_history().iter().all(|e| e.map(|id| id.0) == Some(1)));
}

#[test]
fn tight_search_radius_leaves_the_track_off_road() {
    let dir = tempdir().unwrap();
    let edges_path = dir.path().join("edges.csv");
    fs::write(&edges_path, EDGES_CSV).unwrap();

    // 200 m north of the road
    let track: Vec<ObservationRecord> = eastbound_track()
        .into_iter()
        .map(|r| ObservationRecord {
            latitude: r.latitude + 0.0018,
            ..r
        })
        .collect();
    let plane = ObservationRecord::plane_for(&track).unwrap();
    let observations = ObservationRecord::to_observations(&track, &plane).unwrap();
    let edges = EdgeRecord::from_csv(&edges_path).unwrap();
    let graph = EdgeRecord::build_graph(&edges, &plane).unwrap();
    let config = TrackerConfig {
        search_radius: 50.0,
        ..Default::default()
    };
    let matches = GreedyMatcher::new(&graph, &config).unwrap().run(observations).unwrap();
    assert!(matches.iter().all(|m| !m.state.is_on_road()));
    for (m, r) in matches.iter().zip(&track) {
        let record = m.to_record(&plane).unwrap();
        assert_eq!(record.edge_id, None);
        assert_eq!(record.distance_along_edge, None);
        assert_approx_eq!(record.latitude, r.latitude, 1e-6);
        assert_approx_eq!(record.longitude, r.longitude, 1e-6);
    }
}

#[test]
fn invalid_configuration_is_rejected() {
    let graph = roadtrack::InferredGraph::default();
    let config = TrackerConfig {
        search_radius: -1.0,
        ..Default::default()
    };
    assert!(GreedyMatcher::new(&graph, &config).is_err());
}
