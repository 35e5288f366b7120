//! Road graph types consumed by the vehicle state.
//!
//! The road network itself is built elsewhere; this module only carries what the state and
//! likelihood code need to know about an edge: its planar polyline geometry, its length,
//! its start point and a way to snap an arbitrary ground coordinate onto it. Off-road
//! motion is represented by the absence of an edge (`None`) or by [`PathEdge::empty`].
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// Identifier of a directed road edge.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeId(pub u64);
impl Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A directed road edge with a planar polyline geometry (meters, East-North).
///
/// Positions along the edge are arc lengths measured from the first vertex along the
/// polyline.
#[derive(Clone, Debug)]
pub struct InferredEdge {
    id: EdgeId,
    geometry: Vec<Vector2<f64>>,
    /// Arc length from the first vertex to each vertex.
    vertex_distances: Vec<f64>,
}
impl PartialEq for InferredEdge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for InferredEdge {}
impl Display for InferredEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InferredEdge({}, length: {:.2}, start: [{:.2}, {:.2}])",
            self.id,
            self.length(),
            self.geometry[0][0],
            self.geometry[0][1]
        )
    }
}

/// One straight piece of an edge polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeSegment {
    /// First vertex of the segment.
    pub start: Vector2<f64>,
    /// Unit direction from the first to the second vertex.
    pub direction: Vector2<f64>,
    /// Arc length of `start` along the edge.
    pub distance_to_start: f64,
    pub length: f64,
}
impl EdgeSegment {
    /// Point at arc length `distance` along the edge, extrapolated past the segment ends.
    pub fn point_at(&self, distance: f64) -> Vector2<f64> {
        self.start + self.direction * (distance - self.distance_to_start)
    }
}

impl InferredEdge {
    /// Create an edge from at least two vertices.
    ///
    /// # Errors
    /// `InvalidArgument` for fewer than two vertices, non-finite coordinates or two consecutive
    /// vertices at the same location.
    pub fn new(id: EdgeId, geometry: Vec<Vector2<f64>>) -> Result<InferredEdge> {
        if geometry.len() < 2 {
            return Err(TrackingError::invalid(format!(
                "edge {id} needs at least two vertices, got {}",
                geometry.len()
            )));
        }
        let mut vertex_distances = Vec::with_capacity(geometry.len());
        vertex_distances.push(0.0);
        let mut total = 0.0;
        for (i, w) in geometry.windows(2).enumerate() {
            let step = (w[1] - w[0]).norm();
            if step <= 0.0 || !step.is_finite() {
                return Err(TrackingError::invalid(format!(
                    "edge {id} has a degenerate segment between vertices {i} and {}",
                    i + 1
                )));
            }
            total += step;
            vertex_distances.push(total);
        }
        Ok(InferredEdge {
            id,
            geometry,
            vertex_distances,
        })
    }
    pub fn id(&self) -> EdgeId {
        self.id
    }
    pub fn geometry(&self) -> &[Vector2<f64>] {
        &self.geometry
    }
    /// Length of the polyline in meters.
    pub fn length(&self) -> f64 {
        self.vertex_distances[self.vertex_distances.len() - 1]
    }
    pub fn start_point(&self) -> Vector2<f64> {
        self.geometry[0]
    }
    pub fn end_point(&self) -> Vector2<f64> {
        self.geometry[self.geometry.len() - 1]
    }
    pub fn segment_count(&self) -> usize {
        self.geometry.len() - 1
    }
    /// The `index`-th segment; indices past the end are clamped to the last segment.
    pub fn segment(&self, index: usize) -> EdgeSegment {
        let k = index.min(self.segment_count() - 1);
        let start = self.geometry[k];
        let length = self.vertex_distances[k + 1] - self.vertex_distances[k];
        EdgeSegment {
            start,
            direction: (self.geometry[k + 1] - start) / length,
            distance_to_start: self.vertex_distances[k],
            length,
        }
    }
    /// Segment containing arc length `distance`.
    ///
    /// A vertex belongs to the segment it starts. Distances before the start fall on the
    /// first segment, distances past the end on the last.
    pub fn segment_at(&self, distance: f64) -> EdgeSegment {
        let k = self.vertex_distances[1..self.vertex_distances.len() - 1]
            .partition_point(|&d| d <= distance);
        self.segment(k)
    }
    /// Point at arc length `distance`, clamped to the edge.
    pub fn point_at(&self, distance: f64) -> Vector2<f64> {
        let clamped = distance.clamp(0.0, self.length());
        self.segment_at(clamped).point_at(clamped)
    }
    /// Closest point on the geometry to `coordinate` and its arc length along the edge.
    pub fn snap(&self, coordinate: &Vector2<f64>) -> (Vector2<f64>, f64) {
        let mut best = (self.geometry[0], 0.0);
        let mut best_distance = f64::INFINITY;
        for k in 0..self.segment_count() {
            let segment = self.segment(k);
            let t = (coordinate - segment.start)
                .dot(&segment.direction)
                .clamp(0.0, segment.length);
            let candidate = segment.start + segment.direction * t;
            let distance = (candidate - coordinate).norm();
            if distance < best_distance {
                best_distance = distance;
                best = (candidate, segment.distance_to_start + t);
            }
        }
        best
    }
    /// Closest point on the edge geometry to `coordinate`.
    pub fn point_on_edge(&self, coordinate: &Vector2<f64>) -> Vector2<f64> {
        self.snap(coordinate).0
    }
    /// Arc length from the start of the edge to the snap of `coordinate`.
    pub fn distance_along(&self, coordinate: &Vector2<f64>) -> f64 {
        self.snap(coordinate).1
    }
    /// Euclidean distance from `coordinate` to the edge geometry.
    pub fn distance_to(&self, coordinate: &Vector2<f64>) -> f64 {
        (self.point_on_edge(coordinate) - coordinate).norm()
    }
}

/// An edge as it appears on a path, together with the path distance at which it starts.
///
/// The empty path edge (no underlying edge, zero distance) stands for off-road motion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathEdge {
    edge: Option<Arc<InferredEdge>>,
    distance_to_start_of_edge: f64,
}
impl PathEdge {
    pub fn new(edge: Arc<InferredEdge>, distance_to_start_of_edge: f64) -> PathEdge {
        PathEdge {
            edge: Some(edge),
            distance_to_start_of_edge,
        }
    }
    /// The off-road sentinel.
    pub const fn empty() -> PathEdge {
        PathEdge {
            edge: None,
            distance_to_start_of_edge: 0.0,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.edge.is_none()
    }
    pub fn edge(&self) -> Option<&InferredEdge> {
        self.edge.as_deref()
    }
    pub fn inferred_edge(&self) -> Option<&Arc<InferredEdge>> {
        self.edge.as_ref()
    }
    pub fn distance_to_start_of_edge(&self) -> f64 {
        self.distance_to_start_of_edge
    }
}
impl Display for PathEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.edge {
            Some(edge) => write!(
                f,
                "PathEdge({}, dist: {:.2})",
                edge.id(),
                self.distance_to_start_of_edge
            ),
            None => write!(f, "PathEdge(empty)"),
        }
    }
}

/// Ordered sequence of edges travelled since the last off-road excursion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InferredPath {
    edges: Vec<PathEdge>,
}

/// Shared off-road path handed out for off-road states.
pub(crate) static EMPTY_PATH: InferredPath = InferredPath::empty();

impl InferredPath {
    /// The off-road sentinel path.
    pub const fn empty() -> InferredPath {
        InferredPath { edges: Vec::new() }
    }
    /// A path consisting of a single edge starting at path distance zero.
    pub fn from_edge(edge: Arc<InferredEdge>) -> InferredPath {
        InferredPath {
            edges: vec![PathEdge::new(edge, 0.0)],
        }
    }
    /// Build a path from on-road path edges.
    pub fn new(edges: Vec<PathEdge>) -> Result<InferredPath> {
        if edges.is_empty() {
            return Err(TrackingError::invalid(
                "an on-road path needs at least one edge; use InferredPath::empty() for off-road",
            ));
        }
        if edges.iter().any(PathEdge::is_empty) {
            return Err(TrackingError::invalid(
                "an on-road path cannot contain the off-road edge",
            ));
        }
        Ok(InferredPath { edges })
    }
    /// Extend the path with `edge`, starting where the current last edge ends.
    pub fn extended(&self, edge: Arc<InferredEdge>) -> InferredPath {
        let start = self
            .edges
            .last()
            .and_then(|pe| pe.edge().map(|e| pe.distance_to_start_of_edge() + e.length()))
            .unwrap_or(0.0);
        let mut edges = self.edges.clone();
        edges.push(PathEdge::new(edge, start));
        InferredPath { edges }
    }
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
    pub fn edges(&self) -> &[PathEdge] {
        &self.edges
    }
    pub fn last_edge(&self) -> Option<&PathEdge> {
        self.edges.last()
    }
    /// True when the last edge of the path is `edge`.
    pub fn ends_with(&self, edge: &InferredEdge) -> bool {
        self.last_edge().and_then(PathEdge::edge) == Some(edge)
    }
    /// Total length of the edges on the path.
    pub fn total_distance(&self) -> f64 {
        self.edges.iter().filter_map(PathEdge::edge).map(InferredEdge::length).sum()
    }
}

/// Collection of edges with identifier and proximity lookup.
#[derive(Clone, Debug, Default)]
pub struct InferredGraph {
    edges: Vec<Arc<InferredEdge>>,
    index: HashMap<EdgeId, usize>,
}
impl InferredGraph {
    pub fn new(edges: Vec<InferredEdge>) -> Result<InferredGraph> {
        let mut index = HashMap::with_capacity(edges.len());
        for (i, edge) in edges.iter().enumerate() {
            if index.insert(edge.id(), i).is_some() {
                return Err(TrackingError::invalid(format!(
                    "duplicate edge identifier {}",
                    edge.id()
                )));
            }
        }
        Ok(InferredGraph {
            edges: edges.into_iter().map(Arc::new).collect(),
            index,
        })
    }
    pub fn len(&self) -> usize {
        self.edges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
    pub fn edges(&self) -> &[Arc<InferredEdge>] {
        &self.edges
    }
    pub fn edge(&self, id: EdgeId) -> Option<&Arc<InferredEdge>> {
        self.index.get(&id).map(|&i| &self.edges[i])
    }
    /// Edges within `radius` meters of `point`, closest first.
    pub fn nearby_edges(&self, point: &Vector2<f64>, radius: f64) -> Vec<Arc<InferredEdge>> {
        let mut found: Vec<(f64, &Arc<InferredEdge>)> = self
            .edges
            .iter()
            .map(|e| (e.distance_to(point), e))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, e)| Arc::clone(e)).collect()
    }
}
