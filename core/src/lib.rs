//! Road-constrained vehicle state beliefs and observation likelihoods
//!
//! This crate provides the state representation at the heart of a map-matching tracker: a
//! probabilistic belief about a vehicle's kinematic state that is either free to move in the
//! ground plane or constrained to an edge of a road network, together with the machinery to
//! score a noisy positional observation against such a belief. It does not run a complete
//! particle filter; the predict/update recursion, graph construction, parameter learning and
//! resampling belong to the driver that uses these types. A small greedy scorer is shipped as
//! the `roadtrack` binary to exercise the pieces end to end.
//!
//! This crate is primarily built off of the following dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): static vectors and matrices for beliefs and projections.
//! - [`nav-types`](https://crates.io/crates/nav-types): WGS84/ECEF conversions for projecting raw observations.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): sampling of edge-transition regimes and priors.
//! - [`serde`](https://crates.io/crates/serde), [`csv`](https://crates.io/crates/csv) and [`chrono`](https://crates.io/crates/chrono): configuration and record I/O.
//!
//! ## Crate overview
//!
//! - [belief]: Gaussian beliefs in the ground and road frames and the tagged [`belief::VehicleBelief`].
//! - [config]: The [`config::TrackerConfig`] and its JSON/YAML/TOML I/O.
//! - [earth]: WGS84 constants and the local tangent plane used to project observations.
//! - [error]: The [`error::TrackingError`] type.
//! - [graph]: Edges, path edges, paths and a simple edge collection.
//! - [lineage]: Traversal of a state's parent chain.
//! - [linalg]: Robust Cholesky and Gaussian log-densities.
//! - [matcher]: A greedy observation-to-edge matcher built on the state and its likelihood.
//! - [motion]: The [`motion::MotionFilter`] trait and the standard road tracking filter.
//! - [observation]: Positional observations.
//! - [pdf]: The likelihood of an observation under a state.
//! - [projection]: The road/ground coordinate projector.
//! - [records]: CSV records for observations, edges and matches.
//! - [state]: The [`state::VehicleState`] itself.
//! - [transition]: The edge-transition prior.
//!
//! ## Coordinate and state definitions
//!
//! All planar quantities live in a local East-North plane in meters. A ground state is
//!
//! $$
//! x_g = [x, v_x, y, v_y]
//! $$
//!
//! and a road state is
//!
//! $$
//! x_r = [s, v]
//! $$
//!
//! where $s$ is the distance along the current edge from its start point and $v$ the speed
//! along the edge. Off-road states always carry a ground belief and no edge; on-road states
//! always carry a road belief, the edge and the path that led onto it.
pub mod belief;
pub mod config;
pub mod earth;
pub mod error;
pub mod graph;
pub mod lineage;
pub mod linalg;
pub mod matcher;
pub mod motion;
pub mod observation;
pub mod pdf;
pub mod projection;
pub mod records;
pub mod state;
pub mod transition;

pub use belief::{Belief, BeliefMut, GroundBelief, RoadBelief, VehicleBelief};
pub use config::TrackerConfig;
pub use error::{Result, TrackingError};
pub use graph::{EdgeId, InferredEdge, InferredGraph, InferredPath, PathEdge};
pub use matcher::{Candidate, GreedyMatcher};
pub use motion::{MotionFilter, MotionFilterConfig, StandardRoadTrackingFilter};
pub use observation::Observation;
pub use pdf::{ComputableDistribution, ConditionalParams, ProbabilityFunction, VehicleStatePdf};
pub use projection::ProjectionPair;
pub use state::VehicleState;
pub use transition::{EdgeTransitionModel, TransitionConfig, TransitionKind};

/// Wrap an angle to the range -180 to 180 degrees
///
/// This function is generic and can be used with any type that implements the necessary traits.
///
/// # Example
/// ```rust
/// use roadtrack::wrap_to_180;
/// assert_eq!(wrap_to_180(190.0), -170.0);
/// assert_eq!(wrap_to_180(-540.0), -180.0);
/// ```
pub fn wrap_to_180<T>(angle: T) -> T
where
    T: PartialOrd + Copy + std::ops::SubAssign + std::ops::AddAssign + From<f64>,
{
    let mut wrapped: T = angle;
    while wrapped > T::from(180.0) {
        wrapped -= T::from(360.0);
    }
    while wrapped < T::from(-180.0) {
        wrapped += T::from(360.0);
    }
    wrapped
}
