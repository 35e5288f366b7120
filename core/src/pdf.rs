//! Likelihood of an observation under a candidate vehicle state.
//!
//! The log-likelihood of a state given the previous edge and an observed location is the
//! sum of two terms:
//!
//! $$
//! \ln p = \ln p_{\text{transition}}(e_{t-1} \to e_t) + \ln p_{\text{motion}}(z_t \mid x_t, e_t)
//! $$
//!
//! The first comes from the state's [`EdgeTransitionModel`](crate::transition::EdgeTransitionModel),
//! the second from its [`MotionFilter`](crate::motion::MotionFilter) evaluated on the
//! current edge placed at the given path distance (or the empty edge when off-road).
use std::fmt::{self, Display};
use std::sync::Arc;

use log::debug;
use nalgebra::Vector2;

use crate::error::{Result, TrackingError};
use crate::graph::PathEdge;
use crate::state::VehicleState;

/// A (log-)density over some domain.
pub trait ProbabilityFunction<T> {
    fn log_evaluate(&self, input: &T) -> Result<f64>;
    fn evaluate(&self, input: &T) -> Result<f64> {
        Ok(self.log_evaluate(input)?.exp())
    }
}

/// A distribution that can be evaluated and, in principle, sampled.
pub trait ComputableDistribution<T> {
    type Pdf: ProbabilityFunction<T>;
    fn probability_function(&self) -> Self::Pdf;
    fn sample(&self) -> Result<T>;
    fn sample_many(&self, count: usize) -> Result<Vec<T>>;
}

/// Inputs the likelihood of a state is conditioned on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionalParams {
    /// Edge the vehicle was on at the previous observation; empty when it was off-road.
    pub previous_edge: PathEdge,
    /// Observed ground location `(x, y)`.
    pub location: Vector2<f64>,
    /// Path distance at which the candidate's current edge starts.
    pub distance_to_current_edge: f64,
}
impl Display for ConditionalParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConditionalParams(prev: {}, loc: [{:.2}, {:.2}], dist: {:.2})",
            self.previous_edge, self.location[0], self.location[1], self.distance_to_current_edge
        )
    }
}

/// Density view of a [`VehicleState`].
#[derive(Debug)]
pub struct VehicleStatePdf {
    state: VehicleState,
}
impl VehicleStatePdf {
    pub fn new(state: &VehicleState) -> VehicleStatePdf {
        VehicleStatePdf {
            state: state.shallow_copy(),
        }
    }
    pub fn state(&self) -> &VehicleState {
        &self.state
    }
    /// The transition and motion terms separately, in that order.
    pub fn log_terms(&self, params: &ConditionalParams) -> Result<(f64, f64)> {
        let state = &self.state;
        let transition = state
            .transition_model()
            .log_evaluate(params.previous_edge.edge(), state.edge().map(|e| e.as_ref()));
        let effective_edge = match state.edge() {
            None => PathEdge::empty(),
            Some(edge) => PathEdge::new(Arc::clone(edge), params.distance_to_current_edge),
        };
        let motion =
            state
                .motion_filter()
                .log_likelihood(&params.location, state.belief(), &effective_edge)?;
        debug!(
            "observation {} under {}: transition {transition:.4}, motion {motion:.4}",
            state.observation().index(),
            effective_edge
        );
        Ok((transition, motion))
    }
    pub fn sample(&self) -> Result<ConditionalParams> {
        ComputableDistribution::sample(&self.state)
    }
    pub fn sample_many(&self, count: usize) -> Result<Vec<ConditionalParams>> {
        self.state.sample_many(count)
    }
}
impl ProbabilityFunction<ConditionalParams> for VehicleStatePdf {
    fn log_evaluate(&self, params: &ConditionalParams) -> Result<f64> {
        let (transition, motion) = self.log_terms(params)?;
        Ok(transition + motion)
    }
}

impl ComputableDistribution<ConditionalParams> for VehicleState {
    type Pdf = VehicleStatePdf;
    fn probability_function(&self) -> VehicleStatePdf {
        VehicleStatePdf::new(self)
    }
    fn sample(&self) -> Result<ConditionalParams> {
        Err(TrackingError::NotImplemented("sampling from a vehicle state distribution"))
    }
    fn sample_many(&self, _count: usize) -> Result<Vec<ConditionalParams>> {
        Err(TrackingError::NotImplemented("sampling from a vehicle state distribution"))
    }
}
