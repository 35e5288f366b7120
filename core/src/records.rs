//! CSV records for observations, road edges and scored matches.
//!
//! Observations are read from a CSV with an RFC 3339 `time` column and WGS84 `latitude` /
//! `longitude` columns in degrees. Edges are read from a CSV of vertices, one row per vertex,
//! with the vertices of an edge appearing in order under the same `edge_id`. The tracker
//! writes one [`MatchRecord`] per observation.
use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::earth::LocalTangentPlane;
use crate::error::{Result, TrackingError};
use crate::graph::{EdgeId, InferredEdge, InferredGraph};
use crate::observation::Observation;

fn read_csv<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        records.push(record);
    }
    Ok(records)
}

fn write_csv<T: Serialize, P: AsRef<Path>>(records: &[T], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// One raw positional fix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Time of validity, RFC 3339.
    pub time: DateTime<Utc>,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}
impl ObservationRecord {
    /// Reads observation records from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        read_csv(path)
    }
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<()> {
        write_csv(records, path)
    }
    /// Local plane anchored at the first record.
    pub fn plane_for(records: &[Self]) -> Result<LocalTangentPlane> {
        let first = records
            .first()
            .ok_or_else(|| TrackingError::invalid("no observations to anchor a local plane"))?;
        Ok(LocalTangentPlane::new(first.latitude, first.longitude, 0.0))
    }
    /// Convert records to observations on `plane`, indexed by position.
    ///
    /// # Errors
    /// `InvalidArgument` if the records are not in non-decreasing time order.
    pub fn to_observations(
        records: &[Self],
        plane: &LocalTangentPlane,
    ) -> Result<Vec<Observation>> {
        if let Some(w) = records.windows(2).find(|w| w[1].time < w[0].time) {
            return Err(TrackingError::invalid(format!(
                "observation at {} precedes the one before it at {}",
                w[1].time, w[0].time
            )));
        }
        Ok(records
            .iter()
            .enumerate()
            .map(|(i, r)| Observation::new(i as u64, r.time, r.latitude, r.longitude, plane))
            .collect())
    }
}

/// One vertex of an edge polyline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub edge_id: u64,
    pub latitude: f64,
    pub longitude: f64,
}
impl EdgeRecord {
    /// Reads edge vertex records from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        read_csv(path)
    }
    /// Assemble the edges on `plane`, keeping the order in which edges first appear.
    pub fn build_graph(records: &[Self], plane: &LocalTangentPlane) -> Result<InferredGraph> {
        let mut order: Vec<u64> = Vec::new();
        let mut vertices: HashMap<u64, Vec<Vector2<f64>>> = HashMap::new();
        for r in records {
            let entry = vertices.entry(r.edge_id).or_insert_with(|| {
                order.push(r.edge_id);
                Vec::new()
            });
            let point = plane.project(r.latitude, r.longitude);
            // repeated fixes of the same vertex
            if entry.last() != Some(&point) {
                entry.push(point);
            }
        }
        let mut edges = Vec::with_capacity(order.len());
        for id in order {
            let geometry = vertices.remove(&id).unwrap_or_default();
            edges.push(InferredEdge::new(EdgeId(id), geometry)?);
        }
        InferredGraph::new(edges)
    }
}

/// The best-scoring hypothesis for one observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub time: DateTime<Utc>,
    pub observation_index: u64,
    /// Matched edge, empty when off-road.
    pub edge_id: Option<u64>,
    /// Distance along the matched edge in meters, empty when off-road.
    pub distance_along_edge: Option<f64>,
    /// Mean location of the matched state in degrees
    pub latitude: f64,
    pub longitude: f64,
    pub transition_log_likelihood: f64,
    pub motion_log_likelihood: f64,
    pub log_likelihood: f64,
}
impl MatchRecord {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        read_csv(path)
    }
    /// Writes match records to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<()> {
        write_csv(records, path)
    }
}
