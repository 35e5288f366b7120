//! Vehicle belief state.
//!
//! A [`VehicleState`] is one hypothesis about where a vehicle is after a given observation:
//! a Gaussian belief tagged with its edge state, the observation that produced it, the
//! shared motion filter and edge-transition model used to score it and a link to the state
//! it was derived from. States are immutable once built. A track starts with a root built by
//! [`VehicleState::new`] and grows by [`VehicleState::transition`], which never touches the
//! parent it links to.
//!
//! Sharing is explicit: [`VehicleState::shallow_copy`] aliases every component, while
//! [`VehicleState::belief_mut`] detaches the belief before handing out mutable access.
use std::borrow::Cow;
use std::fmt::{self, Display};
use std::sync::Arc;

use log::debug;
use nalgebra::{Vector2, Vector4};

use crate::belief::{Belief, BeliefMut, GroundBelief, VehicleBelief};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackingError};
use crate::graph::{InferredEdge, InferredPath, PathEdge};
use crate::motion::{MotionFilter, StandardRoadTrackingFilter};
use crate::observation::Observation;
use crate::projection::ProjectionPair;
use crate::transition::EdgeTransitionModel;

/// A belief about the vehicle's kinematic state after one observation.
pub struct VehicleState {
    motion_filter: Arc<dyn MotionFilter>,
    transition_model: Arc<EdgeTransitionModel>,
    belief: Arc<VehicleBelief>,
    observation: Arc<Observation>,
    parent: Option<Arc<VehicleState>>,
    distance_from_previous_state: f64,
}

impl fmt::Debug for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VehicleState")
            .field("observation", &self.observation.index())
            .field("belief", &self.belief)
            .field("distance_from_previous_state", &self.distance_from_previous_state)
            .field("parent", &self.parent.as_ref().map(|p| p.observation.index()))
            .finish()
    }
}
impl Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VehicleState(obs: {}, {}, dist_prev: {:.2})",
            self.observation.index(),
            self.belief,
            self.distance_from_previous_state
        )
    }
}

impl VehicleState {
    /// Root state of a track.
    ///
    /// Off-road (`edge == None`) the belief is the motion filter's ground prior centred on
    /// the projected observation with zero velocity. On-road it is the road prior positioned
    /// at the arc length along the edge of the observation snapped onto the edge, and
    /// the path holds only `edge`.
    pub fn new(
        observation: Arc<Observation>,
        edge: Option<Arc<InferredEdge>>,
        motion_filter: Arc<dyn MotionFilter>,
        transition_model: Arc<EdgeTransitionModel>,
    ) -> VehicleState {
        let point = observation.projected_point();
        let belief = match edge {
            None => {
                let mut ground = motion_filter.initial_ground_belief();
                ground.set_mean(Vector4::new(point[0], 0.0, point[1], 0.0));
                VehicleBelief::OffRoad(ground)
            }
            Some(edge) => {
                let mut road = motion_filter.initial_road_belief();
                road.set_mean(Vector2::new(edge.distance_along(&point), 0.0));
                let path = Arc::new(InferredPath::from_edge(Arc::clone(&edge)));
                VehicleBelief::OnRoad {
                    belief: road,
                    edge,
                    path,
                }
            }
        };
        debug!("root state for observation {}: {belief}", observation.index());
        VehicleState {
            motion_filter,
            transition_model,
            belief: Arc::new(belief),
            observation,
            parent: None,
            distance_from_previous_state: 0.0,
        }
    }

    /// Root state with the standard filter and transition model built from `config`.
    pub fn from_config(
        observation: Arc<Observation>,
        edge: Option<Arc<InferredEdge>>,
        config: &TrackerConfig,
    ) -> Result<VehicleState> {
        config.validate()?;
        let motion_filter: Arc<dyn MotionFilter> =
            Arc::new(StandardRoadTrackingFilter::new(config.filter.clone())?);
        let transition_model = Arc::new(EdgeTransitionModel::new(&config.transitions)?);
        Ok(VehicleState::new(
            observation,
            edge,
            motion_filter,
            transition_model,
        ))
    }

    /// A second handle on the same state; every component is shared.
    pub fn shallow_copy(&self) -> VehicleState {
        VehicleState {
            motion_filter: Arc::clone(&self.motion_filter),
            transition_model: Arc::clone(&self.transition_model),
            belief: Arc::clone(&self.belief),
            observation: Arc::clone(&self.observation),
            parent: self.parent.clone(),
            distance_from_previous_state: self.distance_from_previous_state,
        }
    }

    /// State following `parent` after moving onto `path_edge`.
    ///
    /// The road position of a 2-D belief is given in path coordinates and is rebased to the
    /// start of the edge by subtracting `path_edge.distance_to_start_of_edge()`.
    ///
    /// # Errors
    /// - `DimensionMismatch` when a ground belief comes with an edge or a road belief with
    ///   the off-road edge;
    /// - `InvalidArgument` when an on-road path does not end with the edge or an off-road
    ///   state is given a non-empty path.
    pub fn transition(
        observation: Arc<Observation>,
        motion_filter: Arc<dyn MotionFilter>,
        belief: impl Into<Belief>,
        transition_model: Arc<EdgeTransitionModel>,
        path_edge: &PathEdge,
        path: Arc<InferredPath>,
        parent: Arc<VehicleState>,
    ) -> Result<VehicleState> {
        let distance = path_edge.distance_to_start_of_edge();
        let belief = match (belief.into(), path_edge.inferred_edge()) {
            (Belief::Ground(ground), None) => {
                if !path.is_empty() {
                    return Err(TrackingError::invalid(format!(
                        "off-road state given a path of {} edges",
                        path.edges().len()
                    )));
                }
                VehicleBelief::OffRoad(ground)
            }
            (Belief::Road(mut road), Some(edge)) => {
                road.mean_mut()[0] -= distance;
                VehicleBelief::on_road(road, Arc::clone(edge), path)?
            }
            (Belief::Ground(_), Some(_)) => {
                return Err(TrackingError::DimensionMismatch {
                    expected: 2,
                    found: 4,
                });
            }
            (Belief::Road(_), None) => {
                return Err(TrackingError::DimensionMismatch {
                    expected: 4,
                    found: 2,
                });
            }
        };
        debug!(
            "transition {} -> {}: {belief}, rebased by {distance:.2}",
            parent.observation.index(),
            observation.index()
        );
        Ok(VehicleState {
            motion_filter,
            transition_model,
            belief: Arc::new(belief),
            observation,
            parent: Some(parent),
            distance_from_previous_state: distance,
        })
    }

    pub fn belief(&self) -> &VehicleBelief {
        &self.belief
    }
    /// Mutable access to the Gaussian, copying it first if it is shared.
    pub fn belief_mut(&mut self) -> BeliefMut<'_> {
        Arc::make_mut(&mut self.belief).gaussian_mut()
    }
    /// An owned copy of the belief that shares nothing with this state.
    pub fn detached_belief(&self) -> VehicleBelief {
        VehicleBelief::clone(&self.belief)
    }
    /// Current edge, `None` when off-road.
    pub fn edge(&self) -> Option<&Arc<InferredEdge>> {
        self.belief.edge()
    }
    pub fn path(&self) -> &InferredPath {
        self.belief.path()
    }
    /// The current edge as it sits on the path, or the empty path edge when off-road.
    pub fn current_path_edge(&self) -> PathEdge {
        self.path().last_edge().cloned().unwrap_or_default()
    }
    pub fn is_on_road(&self) -> bool {
        self.belief.is_on_road()
    }
    pub fn parent(&self) -> Option<&Arc<VehicleState>> {
        self.parent.as_ref()
    }
    pub fn distance_from_previous_state(&self) -> f64 {
        self.distance_from_previous_state
    }
    pub fn observation(&self) -> &Arc<Observation> {
        &self.observation
    }
    pub fn motion_filter(&self) -> &Arc<dyn MotionFilter> {
        &self.motion_filter
    }
    pub fn transition_model(&self) -> &Arc<EdgeTransitionModel> {
        &self.transition_model
    }

    /// Position along the edge, clamped to the edge's length.
    fn truncated_road_mean(&self, edge: &InferredEdge, mean: &Vector2<f64>) -> Vector2<f64> {
        let mut truncated = *mean;
        if truncated[0] > edge.length() {
            debug!(
                "observation {}: position {:.2} past the end of {} ({:.2}), truncating",
                self.observation.index(),
                truncated[0],
                edge.id(),
                edge.length()
            );
            truncated[0] = edge.length();
        }
        truncated
    }

    /// Mean `(x, y)` location in the ground frame.
    pub fn mean_location_in_ground(&self) -> Result<Vector2<f64>> {
        match self.belief.as_ref() {
            VehicleBelief::OffRoad(ground) => Ok(Vector2::new(ground.mean()[0], ground.mean()[2])),
            VehicleBelief::OnRoad { belief, edge, .. } => {
                let truncated = self.truncated_road_mean(edge, belief.mean());
                let pair = ProjectionPair::for_edge(edge, truncated[0]);
                let g = pair.road_to_ground_mean(&truncated);
                Ok(Vector2::new(g[0], g[2]))
            }
        }
    }

    /// The belief expressed in the ground frame.
    ///
    /// Off-road beliefs are borrowed unchanged. On-road beliefs are projected on the edge
    /// segment holding the truncated position, which is also the mean.
    pub fn ground_only_belief(&self) -> Result<Cow<'_, GroundBelief>> {
        match self.belief.as_ref() {
            VehicleBelief::OffRoad(ground) => Ok(Cow::Borrowed(ground)),
            VehicleBelief::OnRoad { belief, edge, .. } => {
                let truncated = self.truncated_road_mean(edge, belief.mean());
                let pair = ProjectionPair::for_edge(edge, truncated[0]);
                let mean = pair.road_to_ground_mean(&truncated);
                let covariance = pair.road_to_ground_covariance(belief.covariance());
                Ok(Cow::Owned(GroundBelief::new(mean, covariance)))
            }
        }
    }
}

impl Drop for VehicleState {
    // unlink the parent chain one node at a time
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(parent) = next {
            match Arc::try_unwrap(parent) {
                Ok(mut state) => next = state.parent.take(),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::RoadBelief;
    use crate::earth::LocalTangentPlane;
    use crate::graph::EdgeId;
    use assert_approx_eq::assert_approx_eq;
    use chrono::{TimeZone, Utc};
    use nalgebra::Matrix2;

    fn obs(index: u64, x: f64, y: f64) -> Arc<Observation> {
        let plane = LocalTangentPlane::new(40.0, -75.0, 0.0);
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, index as u32).unwrap();
        Arc::new(Observation::from_projected(index, t, Vector2::new(x, y), &plane))
    }

    fn east_edge() -> Arc<InferredEdge> {
        Arc::new(
            InferredEdge::new(EdgeId(1), vec![Vector2::new(0.0, 0.0), Vector2::new(100.0, 0.0)])
                .unwrap(),
        )
    }

    fn collaborators() -> (Arc<dyn MotionFilter>, Arc<EdgeTransitionModel>) {
        (
            Arc::new(StandardRoadTrackingFilter::default()),
            Arc::new(EdgeTransitionModel::default()),
        )
    }

    #[test]
    fn root_off_road() {
        let (filter, model) = collaborators();
        let state = VehicleState::new(obs(0, 12.0, -7.0), None, filter, model);
        assert!(state.edge().is_none());
        assert!(state.path().is_empty());
        assert!(state.parent().is_none());
        assert_eq!(state.belief().mean_slice(), &[12.0, 0.0, -7.0, 0.0]);
        assert_eq!(state.distance_from_previous_state(), 0.0);
        assert!(state.current_path_edge().is_empty());
    }

    #[test]
    fn root_on_road_snaps_to_edge() {
        let (filter, model) = collaborators();
        let edge = east_edge();
        let state = VehicleState::new(obs(0, 30.0, 5.0), Some(Arc::clone(&edge)), filter, model);
        assert_eq!(state.edge().map(|e| e.id()), Some(EdgeId(1)));
        assert_eq!(state.path().edges().len(), 1);
        assert!(state.path().ends_with(&edge));
        assert_approx_eq!(state.belief().mean_slice()[0], 30.0, 1e-9);
        assert_approx_eq!(state.belief().mean_slice()[1], 0.0);
        assert_eq!(state.belief().dimensionality(), 2);
    }

    #[test]
    fn from_config_uses_configured_filter() {
        let config = TrackerConfig::default();
        let state = VehicleState::from_config(obs(0, 1.0, 2.0), None, &config).unwrap();
        let ground = state.belief().ground().unwrap();
        assert_approx_eq!(ground.covariance()[(0, 0)], config.filter.initial_position_variance);

        let mut bad = TrackerConfig::default();
        bad.filter.ground_variance = 0.0;
        assert!(VehicleState::from_config(obs(0, 1.0, 2.0), None, &bad).is_err());
    }

    #[test]
    fn shallow_copy_shares_and_belief_mut_detaches() {
        let (filter, model) = collaborators();
        let root = VehicleState::new(obs(0, 30.0, 0.0), Some(east_edge()), filter, model);
        let mut copy = root.shallow_copy();
        assert!(Arc::ptr_eq(&root.belief, &copy.belief));
        assert!(Arc::ptr_eq(root.observation(), copy.observation()));

        match copy.belief_mut() {
            BeliefMut::Road(road) => road.mean_mut()[0] = 55.0,
            BeliefMut::Ground(_) => panic!("expected a road belief"),
        }
        assert!(!Arc::ptr_eq(&root.belief, &copy.belief));
        assert_approx_eq!(root.belief().mean_slice()[0], 30.0, 1e-9);
        assert_approx_eq!(copy.belief().mean_slice()[0], 55.0);

        let mut detached = root.detached_belief();
        if let BeliefMut::Road(road) = detached.gaussian_mut() {
            road.mean_mut()[0] = 1.0;
        }
        assert_approx_eq!(root.belief().mean_slice()[0], 30.0, 1e-9);
    }

    #[test]
    fn transition_rebases_once() {
        let (filter, model) = collaborators();
        let first = east_edge();
        let second = Arc::new(
            InferredEdge::new(EdgeId(2), vec![Vector2::new(100.0, 0.0), Vector2::new(100.0, 80.0)])
                .unwrap(),
        );
        let root = Arc::new(VehicleState::new(
            obs(0, 50.0, 0.0),
            Some(Arc::clone(&first)),
            Arc::clone(&filter),
            Arc::clone(&model),
        ));
        let path = Arc::new(root.path().extended(Arc::clone(&second)));
        let path_edge = path.last_edge().cloned().unwrap();
        assert_approx_eq!(path_edge.distance_to_start_of_edge(), 100.0);
        let belief = RoadBelief::new(Vector2::new(130.0, 2.0), Matrix2::identity());
        let next = VehicleState::transition(
            obs(1, 100.0, 30.0),
            filter,
            belief,
            model,
            &path_edge,
            path,
            Arc::clone(&root),
        )
        .unwrap();
        assert_approx_eq!(next.belief().mean_slice()[0], 30.0, 1e-12);
        assert_approx_eq!(next.belief().mean_slice()[1], 2.0);
        assert_approx_eq!(next.distance_from_previous_state(), 100.0);
        assert_eq!(next.edge().map(|e| e.id()), Some(EdgeId(2)));
        assert!(Arc::ptr_eq(next.parent().unwrap(), &root));
        // reading the state does not shift the mean again
        let _ = next.mean_location_in_ground().unwrap();
        assert_approx_eq!(next.belief().mean_slice()[0], 30.0, 1e-12);
        // the parent is untouched
        assert_approx_eq!(root.belief().mean_slice()[0], 50.0, 1e-9);
    }

    #[test]
    fn transition_with_zero_offset_is_noop() {
        let (filter, model) = collaborators();
        let edge = east_edge();
        let root = Arc::new(VehicleState::new(
            obs(0, 50.0, 0.0),
            Some(Arc::clone(&edge)),
            Arc::clone(&filter),
            Arc::clone(&model),
        ));
        let path = Arc::new(InferredPath::from_edge(Arc::clone(&edge)));
        let belief = RoadBelief::new(Vector2::new(42.0, 1.0), Matrix2::identity());
        let next = VehicleState::transition(
            obs(1, 42.0, 0.0),
            filter,
            belief,
            model,
            &PathEdge::new(edge, 0.0),
            path,
            root,
        )
        .unwrap();
        assert_eq!(next.belief().mean_slice(), &[42.0, 1.0]);
    }

    #[test]
    fn transition_rejects_mismatched_beliefs() {
        let (filter, model) = collaborators();
        let edge = east_edge();
        let root = Arc::new(VehicleState::new(
            obs(0, 0.0, 0.0),
            None,
            Arc::clone(&filter),
            Arc::clone(&model),
        ));
        let ground = filter.initial_ground_belief();
        let road = filter.initial_road_belief();
        let on_path = Arc::new(InferredPath::from_edge(Arc::clone(&edge)));

        let err = VehicleState::transition(
            obs(1, 0.0, 0.0),
            Arc::clone(&filter),
            ground.clone(),
            Arc::clone(&model),
            &PathEdge::new(Arc::clone(&edge), 0.0),
            Arc::clone(&on_path),
            Arc::clone(&root),
        );
        assert!(matches!(
            err,
            Err(TrackingError::DimensionMismatch {
                expected: 2,
                found: 4
            })
        ));

        let err = VehicleState::transition(
            obs(1, 0.0, 0.0),
            Arc::clone(&filter),
            road.clone(),
            Arc::clone(&model),
            &PathEdge::empty(),
            Arc::new(InferredPath::empty()),
            Arc::clone(&root),
        );
        assert!(matches!(
            err,
            Err(TrackingError::DimensionMismatch {
                expected: 4,
                found: 2
            })
        ));

        let other = Arc::new(
            InferredEdge::new(EdgeId(5), vec![Vector2::new(0.0, 0.0), Vector2::new(0.0, 10.0)])
                .unwrap(),
        );
        let err = VehicleState::transition(
            obs(1, 0.0, 0.0),
            Arc::clone(&filter),
            road,
            Arc::clone(&model),
            &PathEdge::new(other, 0.0),
            on_path.clone(),
            Arc::clone(&root),
        );
        assert!(matches!(err, Err(TrackingError::InvalidArgument(_))));

        let err = VehicleState::transition(
            obs(1, 0.0, 0.0),
            filter,
            ground,
            model,
            &PathEdge::empty(),
            on_path,
            root,
        );
        assert!(matches!(err, Err(TrackingError::InvalidArgument(_))));
    }

    #[test]
    fn ground_views_truncate_without_mutating() {
        let (filter, model) = collaborators();
        let edge = east_edge();
        let mut state = VehicleState::new(obs(0, 50.0, 0.0), Some(edge), filter, model);
        if let BeliefMut::Road(road) = state.belief_mut() {
            road.set_mean(Vector2::new(130.0, 3.0));
            road.set_covariance(Matrix2::new(4.0, 0.0, 0.0, 1.0));
        }
        let location = state.mean_location_in_ground().unwrap();
        assert_approx_eq!(location[0], 100.0, 1e-9);
        assert_approx_eq!(location[1], 0.0, 1e-9);
        let ground = state.ground_only_belief().unwrap();
        assert_approx_eq!(ground.mean()[0], 100.0, 1e-9);
        assert_approx_eq!(ground.mean()[1], 3.0, 1e-9);
        assert_approx_eq!(ground.covariance()[(0, 0)], 4.0, 1e-12);
        assert_approx_eq!(ground.covariance()[(2, 2)], 0.0, 1e-12);
        assert_eq!(state.belief().mean_slice(), &[130.0, 3.0]);
    }

    fn l_shaped_edge() -> Arc<InferredEdge> {
        Arc::new(
            InferredEdge::new(
                EdgeId(2),
                vec![
                    Vector2::new(0.0, 0.0),
                    Vector2::new(100.0, 0.0),
                    Vector2::new(100.0, 50.0),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn root_at_the_bend_of_a_polyline() {
        let (filter, model) = collaborators();
        let edge = l_shaped_edge();
        let state = VehicleState::new(obs(0, 100.0, 0.0), Some(edge), filter, model);
        assert_approx_eq!(state.belief().mean_slice()[0], 100.0, 1e-9);
        let location = state.mean_location_in_ground().unwrap();
        assert!((location - Vector2::new(100.0, 0.0)).norm() < 1.0);
        let ground = state.ground_only_belief().unwrap();
        assert_approx_eq!(ground.mean()[0], location[0], 1e-12);
        assert_approx_eq!(ground.mean()[2], location[1], 1e-12);
    }

    #[test]
    fn ground_views_follow_the_polyline() {
        let (filter, model) = collaborators();
        let edge = l_shaped_edge();
        let mut state = VehicleState::new(obs(0, 20.0, 0.0), Some(edge), filter, model);
        for (s, x, y) in [(60.0, 60.0, 0.0), (120.0, 100.0, 20.0), (150.0, 100.0, 50.0)] {
            if let BeliefMut::Road(road) = state.belief_mut() {
                road.set_mean(Vector2::new(s, 2.0));
                road.set_covariance(Matrix2::new(4.0, 0.0, 0.0, 1.0));
            }
            let location = state.mean_location_in_ground().unwrap();
            assert_approx_eq!(location[0], x, 1e-9);
            assert_approx_eq!(location[1], y, 1e-9);
        }
        // past the end: truncated onto the last vertex, velocity along the last segment
        if let BeliefMut::Road(road) = state.belief_mut() {
            road.set_mean(Vector2::new(170.0, 2.0));
        }
        let location = state.mean_location_in_ground().unwrap();
        assert_approx_eq!(location[0], 100.0, 1e-9);
        assert_approx_eq!(location[1], 50.0, 1e-9);
        let ground = state.ground_only_belief().unwrap();
        assert_approx_eq!(ground.mean()[0], 100.0, 1e-9);
        assert_approx_eq!(ground.mean()[1], 0.0, 1e-12);
        assert_approx_eq!(ground.mean()[2], 50.0, 1e-9);
        assert_approx_eq!(ground.mean()[3], 2.0, 1e-12);
        assert_approx_eq!(ground.covariance()[(0, 0)], 0.0, 1e-12);
        assert_approx_eq!(ground.covariance()[(2, 2)], 4.0, 1e-12);
        assert_eq!(state.belief().mean_slice(), &[170.0, 2.0]);
    }

    #[test]
    fn off_road_ground_view_is_borrowed() {
        let (filter, model) = collaborators();
        let state = VehicleState::new(obs(0, 3.0, 4.0), None, filter, model);
        let view = state.ground_only_belief().unwrap();
        assert!(matches!(view, Cow::Borrowed(_)));
        let location = state.mean_location_in_ground().unwrap();
        assert_eq!(location, Vector2::new(3.0, 4.0));
    }

    #[test]
    fn states_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VehicleState>();
    }
}
