//! Gaussian beliefs over the vehicle's kinematic state.
//!
//! Two coordinate frames are in play:
//!
//! - ground: $x = [x, v_x, y, v_y]$, free planar motion in the local East-North plane;
//! - road: $x = [s, v]$, where $s$ is the signed distance along the current edge measured
//!   from the edge's start point and $v$ is the scalar speed along the edge.
//!
//! [`VehicleBelief`] ties the frame to the edge state: an off-road belief is always a
//! [`GroundBelief`] and carries no edge, an on-road belief is always a [`RoadBelief`] and
//! carries the edge and the path that led onto it. Callers match on the variant instead of
//! inspecting dimensionality.
use std::fmt::{self, Display};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector, SMatrix, SVector};

use crate::error::{Result, TrackingError};
use crate::graph::{EMPTY_PATH, InferredEdge, InferredPath};
use crate::linalg::gaussian_log_density;

/// Dimension of the ground state `[x, vx, y, vy]`.
pub const GROUND_STATE_DIM: usize = 4;
/// Dimension of the road state `[s, v]`.
pub const ROAD_STATE_DIM: usize = 2;

/// Multivariate normal distribution with a statically sized state.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianBelief<const D: usize> {
    mean: SVector<f64, D>,
    covariance: SMatrix<f64, D, D>,
}

/// Belief over `[x, vx, y, vy]`.
pub type GroundBelief = GaussianBelief<GROUND_STATE_DIM>;
/// Belief over `[s, v]`.
pub type RoadBelief = GaussianBelief<ROAD_STATE_DIM>;

impl<const D: usize> GaussianBelief<D> {
    pub fn new(mean: SVector<f64, D>, covariance: SMatrix<f64, D, D>) -> Self {
        GaussianBelief { mean, covariance }
    }
    pub fn mean(&self) -> &SVector<f64, D> {
        &self.mean
    }
    pub fn covariance(&self) -> &SMatrix<f64, D, D> {
        &self.covariance
    }
    pub fn set_mean(&mut self, mean: SVector<f64, D>) {
        self.mean = mean;
    }
    pub fn mean_mut(&mut self) -> &mut SVector<f64, D> {
        &mut self.mean
    }
    pub fn set_covariance(&mut self, covariance: SMatrix<f64, D, D>) {
        self.covariance = covariance;
    }
    pub fn dimensionality(&self) -> usize {
        D
    }
    /// Log-density of the belief at `x`.
    pub fn log_density(&self, x: &SVector<f64, D>) -> Result<f64> {
        let residual = DVector::from_column_slice((x - self.mean).as_slice());
        let covariance = DMatrix::from_column_slice(D, D, self.covariance.as_slice());
        gaussian_log_density(&residual, &covariance)
    }
}
impl<const D: usize> Display for GaussianBelief<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N(mean: {:?}, var: {:?})",
            self.mean.as_slice(),
            self.covariance.diagonal().as_slice()
        )
    }
}

/// A belief in either frame, not yet attached to an edge.
#[derive(Clone, Debug, PartialEq)]
pub enum Belief {
    Ground(GroundBelief),
    Road(RoadBelief),
}
impl Belief {
    pub fn dimensionality(&self) -> usize {
        match self {
            Belief::Ground(_) => GROUND_STATE_DIM,
            Belief::Road(_) => ROAD_STATE_DIM,
        }
    }
}
impl From<GroundBelief> for Belief {
    fn from(belief: GroundBelief) -> Self {
        Belief::Ground(belief)
    }
}
impl From<RoadBelief> for Belief {
    fn from(belief: RoadBelief) -> Self {
        Belief::Road(belief)
    }
}
impl From<VehicleBelief> for Belief {
    fn from(belief: VehicleBelief) -> Self {
        match belief {
            VehicleBelief::OffRoad(ground) => Belief::Ground(ground),
            VehicleBelief::OnRoad { belief, .. } => Belief::Road(belief),
        }
    }
}

/// Mutable access to the Gaussian inside a [`VehicleBelief`], leaving its edge and path alone.
#[derive(Debug)]
pub enum BeliefMut<'a> {
    Ground(&'a mut GroundBelief),
    Road(&'a mut RoadBelief),
}

/// The belief of a vehicle state, tagged with the frame it is expressed in.
#[derive(Clone, Debug, PartialEq)]
pub enum VehicleBelief {
    /// Free motion in the ground plane; no edge, empty path.
    OffRoad(GroundBelief),
    /// Motion along `edge`, reached through `path`.
    OnRoad {
        belief: RoadBelief,
        edge: Arc<InferredEdge>,
        path: Arc<InferredPath>,
    },
}
impl VehicleBelief {
    pub fn off_road(belief: GroundBelief) -> VehicleBelief {
        VehicleBelief::OffRoad(belief)
    }
    /// On-road belief. The path must end with `edge`.
    pub fn on_road(
        belief: RoadBelief,
        edge: Arc<InferredEdge>,
        path: Arc<InferredPath>,
    ) -> Result<VehicleBelief> {
        if !path.ends_with(&edge) {
            return Err(TrackingError::invalid(format!(
                "path of {} edges does not end with {}",
                path.edges().len(),
                edge.id()
            )));
        }
        Ok(VehicleBelief::OnRoad { belief, edge, path })
    }
    pub fn is_on_road(&self) -> bool {
        matches!(self, VehicleBelief::OnRoad { .. })
    }
    pub fn dimensionality(&self) -> usize {
        match self {
            VehicleBelief::OffRoad(_) => GROUND_STATE_DIM,
            VehicleBelief::OnRoad { .. } => ROAD_STATE_DIM,
        }
    }
    /// Current edge, `None` when off-road.
    pub fn edge(&self) -> Option<&Arc<InferredEdge>> {
        match self {
            VehicleBelief::OffRoad(_) => None,
            VehicleBelief::OnRoad { edge, .. } => Some(edge),
        }
    }
    /// Path since the last off-road excursion; the empty path when off-road.
    pub fn path(&self) -> &InferredPath {
        match self {
            VehicleBelief::OffRoad(_) => &EMPTY_PATH,
            VehicleBelief::OnRoad { path, .. } => path,
        }
    }
    pub fn ground(&self) -> Option<&GroundBelief> {
        match self {
            VehicleBelief::OffRoad(b) => Some(b),
            VehicleBelief::OnRoad { .. } => None,
        }
    }
    pub fn road(&self) -> Option<&RoadBelief> {
        match self {
            VehicleBelief::OffRoad(_) => None,
            VehicleBelief::OnRoad { belief, .. } => Some(belief),
        }
    }
    pub fn gaussian_mut(&mut self) -> BeliefMut<'_> {
        match self {
            VehicleBelief::OffRoad(ground) => BeliefMut::Ground(ground),
            VehicleBelief::OnRoad { belief, .. } => BeliefMut::Road(belief),
        }
    }
    /// Mean vector as a slice, `[x, vx, y, vy]` or `[s, v]`.
    pub fn mean_slice(&self) -> &[f64] {
        match self {
            VehicleBelief::OffRoad(b) => b.mean().as_slice(),
            VehicleBelief::OnRoad { belief, .. } => belief.mean().as_slice(),
        }
    }
}
impl Display for VehicleBelief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleBelief::OffRoad(b) => write!(f, "OffRoad {b}"),
            VehicleBelief::OnRoad { belief, edge, .. } => {
                write!(f, "OnRoad({}) {belief}", edge.id())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeId;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::{Matrix2, Vector2, Vector4};

    fn edge(id: u64) -> Arc<InferredEdge> {
        Arc::new(
            InferredEdge::new(EdgeId(id), vec![Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)])
                .unwrap(),
        )
    }

    #[test]
    fn road_log_density_at_mean() {
        let b = RoadBelief::new(Vector2::new(5.0, 1.0), Matrix2::new(4.0, 0.0, 0.0, 1.0));
        let ld = b.log_density(&Vector2::new(5.0, 1.0)).unwrap();
        // -ln(2π) - 0.5 ln(4)
        assert_approx_eq!(ld, -(2.0 * std::f64::consts::PI).ln() - 2.0_f64.ln(), 1e-12);
        assert!(b.log_density(&Vector2::new(9.0, 1.0)).unwrap() < ld);
    }

    #[test]
    fn variant_accessors() {
        let g = GroundBelief::new(Vector4::new(1.0, 0.0, 2.0, 0.0), nalgebra::Matrix4::identity());
        let off = VehicleBelief::off_road(g.clone());
        assert_eq!(off.dimensionality(), 4);
        assert!(off.edge().is_none());
        assert!(off.path().is_empty());
        assert_eq!(off.ground(), Some(&g));
        assert!(off.road().is_none());
        assert_eq!(off.mean_slice(), &[1.0, 0.0, 2.0, 0.0]);

        let e = edge(1);
        let r = RoadBelief::new(Vector2::new(3.0, 0.0), Matrix2::identity());
        let path = Arc::new(InferredPath::from_edge(Arc::clone(&e)));
        let on = VehicleBelief::on_road(r, Arc::clone(&e), path).unwrap();
        assert_eq!(on.dimensionality(), 2);
        assert_eq!(on.edge().map(|e| e.id()), Some(EdgeId(1)));
        assert!(on.path().ends_with(&e));
        assert!(on.is_on_road());
        assert!(matches!(Belief::from(on), Belief::Road(_)));
    }

    #[test]
    fn gaussian_mut_keeps_edge() {
        let e = edge(4);
        let r = RoadBelief::new(Vector2::new(3.0, 0.0), Matrix2::identity());
        let path = Arc::new(InferredPath::from_edge(Arc::clone(&e)));
        let mut on = VehicleBelief::on_road(r, e, path).unwrap();
        match on.gaussian_mut() {
            BeliefMut::Road(b) => b.mean_mut()[0] = 8.0,
            BeliefMut::Ground(_) => panic!("expected a road belief"),
        }
        assert_eq!(on.mean_slice(), &[8.0, 0.0]);
        assert_eq!(on.edge().map(|e| e.id()), Some(EdgeId(4)));
        let road = Belief::from(RoadBelief::new(Vector2::zeros(), Matrix2::identity()));
        assert_eq!(road.dimensionality(), 2);
    }

    #[test]
    fn on_road_requires_path_ending_in_edge() {
        let r = RoadBelief::new(Vector2::new(3.0, 0.0), Matrix2::identity());
        let path = Arc::new(InferredPath::from_edge(edge(1)));
        assert!(VehicleBelief::on_road(r.clone(), edge(2), path).is_err());
        assert!(VehicleBelief::on_road(r, edge(2), Arc::new(InferredPath::empty())).is_err());
    }
}
