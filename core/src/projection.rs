//! Projection between the road frame `[s, v]` and the ground frame `[x, vx, y, vy]`.
//!
//! An edge is linearised on the polyline segment that contains the road position. With that
//! segment's unit direction $u$, its first vertex $o = (x_0, y_0)$ at arc length $c$ along the
//! edge, and a path offset $d$ (the distance along the path at which the edge begins) the
//! affine map is
//!
//! $$
//! g = M r + b, \quad
//! M = \begin{bmatrix} u_x & 0 \\\\ 0 & u_x \\\\ u_y & 0 \\\\ 0 & u_y \end{bmatrix}, \quad
//! b = \begin{bmatrix} x_0 - u_x (d + c) \\\\ 0 \\\\ y_0 - u_y (d + c) \\\\ 0 \end{bmatrix}
//! $$
//!
//! so that $s = d + c$ lands on the segment's first vertex and any $s$ on the segment lands on
//! the polyline. For a two-vertex edge $c = 0$ and the map is the same for every position.
//! Because $M^T M = I_2$ the adjoint $M^T (g - b)$ inverts the forward map.
use std::fmt::{self, Display};

use nalgebra::{Matrix2, Matrix4, SMatrix, Vector2, Vector4};

use crate::belief::{GroundBelief, RoadBelief};
use crate::error::{Result, TrackingError};
use crate::graph::{EdgeSegment, InferredEdge, PathEdge};

/// Affine road-to-ground map `(M, b)` for one edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionPair {
    matrix: SMatrix<f64, 4, 2>,
    offset: Vector4<f64>,
}
impl Display for ProjectionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionPair")
            .field("direction", &[self.matrix[(0, 0)], self.matrix[(2, 0)]])
            .field("offset", &self.offset.as_slice())
            .finish()
    }
}
impl ProjectionPair {
    /// Pair for an edge positioned on a path, linearised where the road position `position`
    /// (in path coordinates) falls.
    ///
    /// # Errors
    /// `OffRoadProjection` for the empty path edge.
    pub fn for_path_edge(path_edge: &PathEdge, position: f64) -> Result<ProjectionPair> {
        let edge = path_edge.edge().ok_or(TrackingError::OffRoadProjection)?;
        let distance_to_start = path_edge.distance_to_start_of_edge();
        let segment = edge.segment_at(position - distance_to_start);
        Ok(ProjectionPair::for_segment(&segment, distance_to_start))
    }
    /// Pair for an edge with the path offset fixed at zero, linearised at `position`.
    pub fn for_edge(edge: &InferredEdge, position: f64) -> ProjectionPair {
        ProjectionPair::for_segment(&edge.segment_at(position), 0.0)
    }
    /// Pair for one segment of an edge that starts `distance_to_start` meters along a path.
    pub fn for_segment(segment: &EdgeSegment, distance_to_start: f64) -> ProjectionPair {
        let u = segment.direction;
        let o = segment.start;
        let c = distance_to_start + segment.distance_to_start;
        #[rustfmt::skip]
        let matrix = SMatrix::<f64, 4, 2>::new(
            u[0], 0.0,
            0.0,  u[0],
            u[1], 0.0,
            0.0,  u[1],
        );
        let offset = Vector4::new(o[0] - u[0] * c, 0.0, o[1] - u[1] * c, 0.0);
        ProjectionPair { matrix, offset }
    }
    /// The 4×2 matrix `M`.
    pub fn matrix(&self) -> &SMatrix<f64, 4, 2> {
        &self.matrix
    }
    /// The offset `b`.
    pub fn offset(&self) -> &Vector4<f64> {
        &self.offset
    }
    pub fn road_to_ground_mean(&self, road: &Vector2<f64>) -> Vector4<f64> {
        self.matrix * road + self.offset
    }
    pub fn ground_to_road_mean(&self, ground: &Vector4<f64>) -> Vector2<f64> {
        self.matrix.transpose() * (ground - self.offset)
    }
    pub fn road_to_ground_covariance(&self, covariance: &Matrix2<f64>) -> Matrix4<f64> {
        self.matrix * covariance * self.matrix.transpose()
    }
    pub fn ground_to_road_covariance(&self, covariance: &Matrix4<f64>) -> Matrix2<f64> {
        self.matrix.transpose() * covariance * self.matrix
    }
    pub fn road_to_ground(&self, belief: &RoadBelief) -> GroundBelief {
        GroundBelief::new(
            self.road_to_ground_mean(belief.mean()),
            self.road_to_ground_covariance(belief.covariance()),
        )
    }
    pub fn ground_to_road(&self, belief: &GroundBelief) -> RoadBelief {
        RoadBelief::new(
            self.ground_to_road_mean(belief.mean()),
            self.ground_to_road_covariance(belief.covariance()),
        )
    }
}
