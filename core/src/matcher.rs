//! Greedy observation-to-edge matching.
//!
//! For every observation the matcher builds one off-road hypothesis and one on-road
//! hypothesis per edge within the search radius, scores each with its
//! [`VehicleStatePdf`] conditioned on the previous best state and keeps the winner, which
//! becomes the parent of the next observation's hypotheses. There is no resampling and no
//! Kalman recursion: hypotheses are placed at the observation (off-road) or at the
//! observation snapped onto the edge (on-road) with the prior covariance inflated by the
//! process noise accumulated since the previous observation.
use std::sync::Arc;

use log::{debug, info};
use nalgebra::{Vector2, Vector4};

use crate::belief::{Belief, GroundBelief, RoadBelief};
use crate::config::TrackerConfig;
use crate::earth::LocalTangentPlane;
use crate::error::{Result, TrackingError};
use crate::graph::{InferredEdge, InferredGraph, InferredPath, PathEdge};
use crate::motion::{MotionFilter, StandardRoadTrackingFilter};
use crate::observation::Observation;
use crate::pdf::{ConditionalParams, VehicleStatePdf};
use crate::records::MatchRecord;
use crate::state::VehicleState;
use crate::transition::EdgeTransitionModel;

/// A scored hypothesis.
#[derive(Debug)]
pub struct Candidate {
    pub state: Arc<VehicleState>,
    pub transition_log_likelihood: f64,
    pub motion_log_likelihood: f64,
}
impl Candidate {
    pub fn log_likelihood(&self) -> f64 {
        self.transition_log_likelihood + self.motion_log_likelihood
    }
    /// Output row for this hypothesis; the mean location is mapped back through `plane`.
    pub fn to_record(&self, plane: &LocalTangentPlane) -> Result<MatchRecord> {
        let observation = self.state.observation();
        let location = self.state.mean_location_in_ground()?;
        let (latitude, longitude) = plane.unproject(&location);
        Ok(MatchRecord {
            time: observation.timestamp(),
            observation_index: observation.index(),
            edge_id: self.state.edge().map(|e| e.id().0),
            distance_along_edge: self.state.belief().road().map(|r| r.mean()[0]),
            latitude,
            longitude,
            transition_log_likelihood: self.transition_log_likelihood,
            motion_log_likelihood: self.motion_log_likelihood,
            log_likelihood: self.log_likelihood(),
        })
    }
}

/// Greedy matcher over a fixed graph.
#[derive(Debug)]
pub struct GreedyMatcher<'g> {
    graph: &'g InferredGraph,
    search_radius: f64,
    filter: Arc<StandardRoadTrackingFilter>,
    transition_model: Arc<EdgeTransitionModel>,
}
impl<'g> GreedyMatcher<'g> {
    pub fn new(graph: &'g InferredGraph, config: &TrackerConfig) -> Result<GreedyMatcher<'g>> {
        config.validate()?;
        Ok(GreedyMatcher {
            graph,
            search_radius: config.search_radius,
            filter: Arc::new(StandardRoadTrackingFilter::new(config.filter.clone())?),
            transition_model: Arc::new(EdgeTransitionModel::new(&config.transitions)?),
        })
    }

    fn motion_filter(&self) -> Arc<dyn MotionFilter> {
        self.filter.clone()
    }

    fn score(&self, state: VehicleState, previous_edge: PathEdge) -> Result<Candidate> {
        let pdf = VehicleStatePdf::new(&state);
        let params = ConditionalParams {
            previous_edge,
            location: state.observation().projected_point(),
            distance_to_current_edge: 0.0,
        };
        let (transition, motion) = pdf.log_terms(&params)?;
        Ok(Candidate {
            state: Arc::new(state),
            transition_log_likelihood: transition,
            motion_log_likelihood: motion,
        })
    }

    fn roots(&self, observation: &Arc<Observation>) -> Vec<VehicleState> {
        let point = observation.projected_point();
        let mut states = vec![VehicleState::new(
            Arc::clone(observation),
            None,
            self.motion_filter(),
            Arc::clone(&self.transition_model),
        )];
        for edge in self.graph.nearby_edges(&point, self.search_radius) {
            states.push(VehicleState::new(
                Arc::clone(observation),
                Some(edge),
                self.motion_filter(),
                Arc::clone(&self.transition_model),
            ));
        }
        states
    }

    fn off_road_successor(
        &self,
        observation: &Arc<Observation>,
        parent: &Arc<VehicleState>,
        dt: f64,
    ) -> Result<VehicleState> {
        let point = observation.projected_point();
        let prior = self.filter.initial_ground_belief();
        let belief = GroundBelief::new(
            Vector4::new(point[0], 0.0, point[1], 0.0),
            prior.covariance() + self.filter.ground_process_covariance(dt),
        );
        VehicleState::transition(
            Arc::clone(observation),
            self.motion_filter(),
            Belief::Ground(belief),
            Arc::clone(&self.transition_model),
            &PathEdge::empty(),
            Arc::new(InferredPath::empty()),
            Arc::clone(parent),
        )
    }

    fn on_road_successor(
        &self,
        observation: &Arc<Observation>,
        parent: &Arc<VehicleState>,
        edge: Arc<InferredEdge>,
        dt: f64,
    ) -> Result<VehicleState> {
        let point = observation.projected_point();
        let along = edge.distance_along(&point);
        let path = if parent.path().ends_with(&edge) {
            parent.path().clone()
        } else if parent.is_on_road() {
            parent.path().extended(Arc::clone(&edge))
        } else {
            InferredPath::from_edge(Arc::clone(&edge))
        };
        let path_edge = path
            .last_edge()
            .cloned()
            .ok_or_else(|| TrackingError::invalid("on-road path without edges"))?;
        let prior = self.filter.initial_road_belief();
        // positions on a path are measured from the start of the path
        let belief = RoadBelief::new(
            Vector2::new(path_edge.distance_to_start_of_edge() + along, 0.0),
            prior.covariance() + self.filter.road_process_covariance(dt),
        );
        VehicleState::transition(
            Arc::clone(observation),
            self.motion_filter(),
            Belief::Road(belief),
            Arc::clone(&self.transition_model),
            &path_edge,
            Arc::new(path),
            Arc::clone(parent),
        )
    }

    /// Every hypothesis for `observation`, scored against `previous`.
    pub fn candidates(
        &self,
        observation: Arc<Observation>,
        previous: Option<&Arc<VehicleState>>,
    ) -> Result<Vec<Candidate>> {
        let Some(parent) = previous else {
            return self
                .roots(&observation)
                .into_iter()
                .map(|state| self.score(state, PathEdge::empty()))
                .collect();
        };
        let elapsed = observation.timestamp() - parent.observation().timestamp();
        let dt = (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0);
        let previous_edge = parent.current_path_edge();
        let point = observation.projected_point();

        let mut candidates = vec![self.score(
            self.off_road_successor(&observation, parent, dt)?,
            previous_edge.clone(),
        )?];
        for edge in self.graph.nearby_edges(&point, self.search_radius) {
            let state = self.on_road_successor(&observation, parent, edge, dt)?;
            candidates.push(self.score(state, previous_edge.clone())?);
        }
        Ok(candidates)
    }

    /// The best-scoring hypothesis for `observation`.
    pub fn step(
        &self,
        observation: Arc<Observation>,
        previous: Option<&Arc<VehicleState>>,
    ) -> Result<Candidate> {
        let index = observation.index();
        let candidates = self.candidates(observation, previous)?;
        let count = candidates.len();
        let best = candidates
            .into_iter()
            .max_by(|a, b| a.log_likelihood().total_cmp(&b.log_likelihood()))
            .ok_or_else(|| TrackingError::invalid("no hypotheses for observation"))?;
        debug!(
            "observation {index}: best of {count} is {} (ln L = {:.4})",
            best.state,
            best.log_likelihood()
        );
        Ok(best)
    }

    /// Match a whole track, chaining each winner into the next step.
    pub fn run(&self, observations: Vec<Observation>) -> Result<Vec<Candidate>> {
        let mut matches: Vec<Candidate> = Vec::with_capacity(observations.len());
        for observation in observations {
            let previous = matches.last().map(|c| &c.state);
            let best = self.step(Arc::new(observation), previous)?;
            matches.push(best);
        }
        let on_road = matches.iter().filter(|c| c.state.is_on_road()).count();
        info!(
            "matched {} observations, {on_road} on-road",
            matches.len()
        );
        Ok(matches)
    }
}
