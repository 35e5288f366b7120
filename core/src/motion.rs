//! Motion filters: the density side of road-constrained tracking.
//!
//! A [`MotionFilter`] knows how to build prior beliefs in either frame and how to score a
//! planar location against a belief. The predict/update recursion of the underlying Kalman
//! filters lives outside this crate; what the vehicle state needs is the observation
//! likelihood
//!
//! $$
//! z \sim \mathcal{N}\left(H \mu_g,\ H \Sigma_g H^T + R\right), \quad
//! H = \begin{bmatrix} 1 & 0 & 0 & 0 \\\\ 0 & 0 & 1 & 0 \end{bmatrix}
//! $$
//!
//! where $(\mu_g, \Sigma_g)$ is the belief in the ground frame. Road beliefs are first
//! projected into the ground frame with the [`ProjectionPair`] of the edge they live on.
use std::fmt::{self, Debug, Display};

use log::trace;
use nalgebra::{DMatrix, DVector, Matrix2, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

use crate::belief::{GroundBelief, RoadBelief, VehicleBelief};
use crate::error::{Result, TrackingError};
use crate::graph::PathEdge;
use crate::linalg::gaussian_log_density;
use crate::projection::ProjectionPair;

/// Variances of the standard road tracking filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionFilterConfig {
    /// Variance of a positional observation along each ground axis (m²).
    pub ground_variance: f64,
    /// White-noise acceleration variance for free motion ((m/s²)²).
    pub off_road_acceleration_variance: f64,
    /// White-noise acceleration variance along an edge ((m/s²)²).
    pub on_road_acceleration_variance: f64,
    /// Prior position variance (m²).
    pub initial_position_variance: f64,
    /// Prior velocity variance ((m/s)²).
    pub initial_velocity_variance: f64,
}
impl Default for MotionFilterConfig {
    fn default() -> Self {
        MotionFilterConfig {
            ground_variance: 50.0 * 50.0 / 2.0,
            off_road_acceleration_variance: 0.9,
            on_road_acceleration_variance: 0.5,
            initial_position_variance: 50.0 * 50.0 / 2.0,
            initial_velocity_variance: 25.0,
        }
    }
}
impl MotionFilterConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("ground_variance", self.ground_variance),
            ("off_road_acceleration_variance", self.off_road_acceleration_variance),
            ("on_road_acceleration_variance", self.on_road_acceleration_variance),
            ("initial_position_variance", self.initial_position_variance),
            ("initial_velocity_variance", self.initial_velocity_variance),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackingError::Config(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Density and prior provider consumed by the vehicle state.
pub trait MotionFilter: Debug + Send + Sync {
    /// Prior over `[x, vx, y, vy]`; the caller sets the mean.
    fn initial_ground_belief(&self) -> GroundBelief;
    /// Prior over `[s, v]`; the caller sets the mean.
    fn initial_road_belief(&self) -> RoadBelief;
    /// Log-likelihood of observing `location` under a ground belief.
    fn ground_log_likelihood(
        &self,
        location: &Vector2<f64>,
        belief: &GroundBelief,
    ) -> Result<f64>;
    /// Log-likelihood of observing `location` under a road belief positioned by `path_edge`.
    fn road_log_likelihood(
        &self,
        location: &Vector2<f64>,
        belief: &RoadBelief,
        path_edge: &PathEdge,
    ) -> Result<f64> {
        let pair = self.projection_pair(path_edge, belief.mean()[0])?;
        self.ground_log_likelihood(location, &pair.road_to_ground(belief))
    }
    /// Projection for `path_edge`, linearised at the road position `position`.
    fn projection_pair(&self, path_edge: &PathEdge, position: f64) -> Result<ProjectionPair> {
        ProjectionPair::for_path_edge(path_edge, position)
    }
    /// Log-likelihood of `location` under either kind of belief.
    fn log_likelihood(
        &self,
        location: &Vector2<f64>,
        belief: &VehicleBelief,
        path_edge: &PathEdge,
    ) -> Result<f64> {
        match belief {
            VehicleBelief::OffRoad(ground) => self.ground_log_likelihood(location, ground),
            VehicleBelief::OnRoad { belief, .. } => {
                self.road_log_likelihood(location, belief, path_edge)
            }
        }
    }
}

/// Planar position fix `(x, y)` with isotropic noise.
#[derive(Clone, Debug, Default)]
pub struct PlanarPositionMeasurement {
    pub x: f64,
    pub y: f64,
    pub noise_variance: f64,
}
impl Display for PlanarPositionMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlanarPositionMeasurement(x: {}, y: {}, noise_var: {})",
            self.x, self.y, self.noise_variance
        )
    }
}
impl PlanarPositionMeasurement {
    pub fn new(location: &Vector2<f64>, noise_variance: f64) -> Self {
        PlanarPositionMeasurement {
            x: location[0],
            y: location[1],
            noise_variance,
        }
    }
    pub fn get_dimension(&self) -> usize {
        2
    }
    pub fn get_vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.x, self.y])
    }
    pub fn get_noise(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal_element(2, 2, self.noise_variance)
    }
    /// Selects `(x, y)` out of a ground state `[x, vx, y, vy]`.
    pub fn get_expected_measurement(&self, state: &DVector<f64>) -> DVector<f64> {
        DVector::from_vec(vec![state[0], state[2]])
    }
    /// `H Σ Hᵀ` for a ground covariance.
    pub fn get_expected_covariance(&self, covariance: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_row_slice(
            2,
            2,
            &[
                covariance[(0, 0)],
                covariance[(0, 2)],
                covariance[(2, 0)],
                covariance[(2, 2)],
            ],
        )
    }
}

/// Constant-velocity road/ground tracking filter with an isotropic position sensor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StandardRoadTrackingFilter {
    config: MotionFilterConfig,
}
impl Display for StandardRoadTrackingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardRoadTrackingFilter")
            .field("ground_variance", &self.config.ground_variance)
            .field("off_road_accel_var", &self.config.off_road_acceleration_variance)
            .field("on_road_accel_var", &self.config.on_road_acceleration_variance)
            .finish()
    }
}
impl StandardRoadTrackingFilter {
    pub fn new(config: MotionFilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(StandardRoadTrackingFilter { config })
    }
    pub fn config(&self) -> &MotionFilterConfig {
        &self.config
    }
    /// Discrete white-noise-acceleration covariance of `[p, v]` over `dt` seconds.
    fn kinematic_block(acceleration_variance: f64, dt: f64) -> Matrix2<f64> {
        let dt2 = dt * dt;
        acceleration_variance
            * Matrix2::new(dt2 * dt2 / 4.0, dt2 * dt / 2.0, dt2 * dt / 2.0, dt2)
    }
    /// Process noise accumulated by free motion over `dt` seconds.
    pub fn ground_process_covariance(&self, dt: f64) -> Matrix4<f64> {
        let block = Self::kinematic_block(self.config.off_road_acceleration_variance, dt);
        let mut q = Matrix4::zeros();
        q.fixed_view_mut::<2, 2>(0, 0).copy_from(&block);
        q.fixed_view_mut::<2, 2>(2, 2).copy_from(&block);
        q
    }
    /// Process noise accumulated by motion along an edge over `dt` seconds.
    pub fn road_process_covariance(&self, dt: f64) -> Matrix2<f64> {
        Self::kinematic_block(self.config.on_road_acceleration_variance, dt)
    }
}
impl MotionFilter for StandardRoadTrackingFilter {
    fn initial_ground_belief(&self) -> GroundBelief {
        let p = self.config.initial_position_variance;
        let v = self.config.initial_velocity_variance;
        GroundBelief::new(Vector4::zeros(), Matrix4::from_diagonal(&Vector4::new(p, v, p, v)))
    }
    fn initial_road_belief(&self) -> RoadBelief {
        let p = self.config.initial_position_variance;
        let v = self.config.initial_velocity_variance;
        RoadBelief::new(Vector2::zeros(), Matrix2::new(p, 0.0, 0.0, v))
    }
    fn ground_log_likelihood(
        &self,
        location: &Vector2<f64>,
        belief: &GroundBelief,
    ) -> Result<f64> {
        let measurement = PlanarPositionMeasurement::new(location, self.config.ground_variance);
        let state = DVector::from_column_slice(belief.mean().as_slice());
        let covariance = DMatrix::from_column_slice(4, 4, belief.covariance().as_slice());
        let residual = measurement.get_vector() - measurement.get_expected_measurement(&state);
        let innovation_covariance =
            measurement.get_expected_covariance(&covariance) + measurement.get_noise();
        let log_likelihood = gaussian_log_density(&residual, &innovation_covariance)?;
        trace!("{measurement}: residual {:?}, ln L = {log_likelihood}", residual.as_slice());
        Ok(log_likelihood)
    }
}
